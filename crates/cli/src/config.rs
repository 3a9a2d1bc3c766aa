// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tavern_session::model::DEFAULT_AVATAR_CDN;
use tavern_session::store;
use tavern_session::AvatarScheme;

use crate::command::check::CheckArgs;
use crate::command::ingest::IngestArgs;
use crate::command::login::LoginArgs;

/// Log output format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }
}

/// Headless host for the tavern multi-account session cache.
#[derive(Debug, Parser)]
#[command(name = "tavern", version, about)]
pub struct Config {
    /// Directory holding the persisted account store.
    #[arg(long, env = "TAVERN_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Backend base URL (login URL endpoint and push socket).
    #[arg(
        long,
        env = "TAVERN_BACKEND_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    pub backend_url: String,

    /// Identity provider API base URL, used to validate tokens.
    #[arg(
        long,
        env = "TAVERN_IDENTITY_API",
        default_value = "https://discord.com/api",
        global = true
    )]
    pub identity_api: String,

    /// CDN base for derived avatar URLs.
    #[arg(long, env = "TAVERN_AVATAR_CDN", default_value = DEFAULT_AVATAR_CDN, global = true)]
    pub avatar_cdn: String,

    /// Log format (text or json).
    #[arg(long, env = "TAVERN_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TAVERN_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List cached accounts.
    Accounts,
    /// Make an account the active session.
    Use {
        /// Access token or external id.
        account: String,
    },
    /// Sign out of the active account without forgetting it.
    SignOut,
    /// Forget an account entirely.
    Forget {
        /// Access token or external id.
        account: String,
    },
    /// Ingest a session event (JSON) from a file or stdin.
    Ingest(IngestArgs),
    /// Log in through the backend and wait for the session to arrive.
    Login(LoginArgs),
    /// Check whether an account's token is still accepted.
    Check(CheckArgs),
    /// Ingest every session event pushed by the backend until interrupted.
    Listen,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.log_format()?;
        for (flag, url) in [
            ("--backend-url", &self.backend_url),
            ("--identity-api", &self.identity_api),
            ("--avatar-cdn", &self.avatar_cdn),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{flag} must be an http(s) URL, got {url:?}");
            }
        }
        if let Command::Login(ref args) = self.command {
            if args.timeout == 0 {
                anyhow::bail!("--timeout must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn log_format(&self) -> anyhow::Result<LogFormat> {
        self.log_format.parse()
    }

    /// Resolved state directory (flag, then environment fallbacks).
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(store::state_dir)
    }

    /// Path of the JSON account store.
    pub fn store_path(&self) -> PathBuf {
        self.state_dir().join(store::STORE_FILE)
    }

    pub fn avatar_scheme(&self) -> AvatarScheme {
        AvatarScheme::new(self.avatar_cdn.as_str())
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    pub fn identity_api(&self) -> &str {
        self.identity_api.trim_end_matches('/')
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
