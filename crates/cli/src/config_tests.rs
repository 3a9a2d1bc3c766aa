// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use super::{Command, Config, LogFormat};

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
#[serial_test::serial]
fn defaults() -> anyhow::Result<()> {
    let config = parse(&["tavern", "accounts"]);
    config.validate()?;
    assert_eq!(config.backend_url(), "http://localhost:8080");
    assert_eq!(config.identity_api(), "https://discord.com/api");
    assert_eq!(config.log_format()?, LogFormat::Text);
    assert!(matches!(config.command, Command::Accounts));
    Ok(())
}

#[test]
fn global_flags_after_subcommand() -> anyhow::Result<()> {
    let config = parse(&["tavern", "use", "u1", "--state-dir", "/tmp/tv", "--log-format", "json"]);
    config.validate()?;
    assert_eq!(config.store_path(), PathBuf::from("/tmp/tv/store.json"));
    assert_eq!(config.log_format()?, LogFormat::Json);
    assert!(matches!(config.command, Command::Use { ref account } if account == "u1"));
    Ok(())
}

#[test]
fn trailing_slashes_are_trimmed() {
    let config = parse(&["tavern", "--backend-url", "http://b:1/", "--avatar-cdn", "https://c/", "listen"]);
    assert_eq!(config.backend_url(), "http://b:1");
    assert_eq!(
        config.avatar_scheme().url_for(&tavern_session::Profile::new("u1", "a").with_avatar("h")),
        Some("https://c/avatars/u1/h".to_owned())
    );
}

#[test]
fn login_and_ingest_args() {
    let config = parse(&["tavern", "login", "--timeout", "30", "--open"]);
    assert!(matches!(config.command, Command::Login(ref a) if a.timeout == 30 && a.open));
    let config = parse(&["tavern", "ingest", "--file", "e.json"]);
    assert!(
        matches!(config.command, Command::Ingest(ref a) if a.file == Some(PathBuf::from("e.json")))
    );
    let config = parse(&["tavern", "check"]);
    assert!(matches!(config.command, Command::Check(ref a) if a.account.is_none()));
}

#[yare::parameterized(
    bad_log_format = { &["tavern", "--log-format", "xml", "accounts"], "invalid log format" },
    bad_backend    = { &["tavern", "--backend-url", "localhost", "accounts"], "--backend-url" },
    bad_identity   = { &["tavern", "--identity-api", "ftp://x", "accounts"], "--identity-api" },
    zero_timeout   = { &["tavern", "login", "--timeout", "0"], "--timeout" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}

#[test]
fn missing_subcommand_is_rejected() {
    assert!(Config::try_parse_from(["tavern"]).is_err());
}

#[test]
#[serial_test::serial]
fn environment_fallbacks() -> anyhow::Result<()> {
    let vars = ["TAVERN_BACKEND_URL", "TAVERN_LOG_LEVEL"];
    let saved: Vec<Option<String>> = vars.iter().map(|v| std::env::var(v).ok()).collect();
    std::env::set_var("TAVERN_BACKEND_URL", "https://backend.example");
    std::env::set_var("TAVERN_LOG_LEVEL", "debug");

    let config = parse(&["tavern", "accounts"]);
    let result = config.validate();

    for (var, value) in vars.iter().zip(saved) {
        match value {
            Some(v) => std::env::set_var(var, v),
            None => std::env::remove_var(var),
        }
    }
    result?;
    assert_eq!(config.backend_url(), "https://backend.example");
    assert_eq!(config.log_level, "debug");
    Ok(())
}
