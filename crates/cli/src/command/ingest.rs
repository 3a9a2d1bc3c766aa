// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tavern ingest`: feed a session event into the cache by hand.
//!
//! Accepts either a bare session payload (`{access_token, refresh_token,
//! session}`, optionally string-encoded) or a full push frame
//! `{"event": "session", "payload": ...}`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tokio::io::AsyncReadExt;

use tavern_session::{CacheHandle, PushEvent, SessionEvent};

use super::accounts::settle;
use super::{ready, EXIT_FAILURE, EXIT_USAGE};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Read the event from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Decode a session event from JSON text.
pub fn parse_event(text: &str) -> anyhow::Result<SessionEvent> {
    let value: serde_json::Value = serde_json::from_str(text).context("input is not JSON")?;
    if value.get("event").is_some() {
        return match PushEvent::parse(text)? {
            Some(PushEvent::Session(event)) => Ok(event),
            Some(other) => anyhow::bail!("expected a session event, got {}", other.name()),
            None => anyhow::bail!("unknown push event"),
        };
    }
    Ok(SessionEvent::from_payload(&value)?)
}

pub async fn run(handle: &CacheHandle, args: &IngestArgs) -> i32 {
    let text = match read_input(args).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_USAGE;
        }
    };
    let event = match parse_event(&text) {
        Ok(event) => event,
        Err(e) => {
            eprintln!("error: invalid session event: {e:#}");
            return EXIT_USAGE;
        }
    };
    if !ready(handle).await {
        return EXIT_FAILURE;
    }

    let name = event.profile.display_name().to_owned();
    let id = event.profile.external_id.clone();
    match handle.ingest(event).await {
        Ok(ticket) => {
            let code = settle(ticket).await;
            println!("Signed in as {name} ({id}).");
            code
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

async fn read_input(args: &IngestArgs) -> anyhow::Result<String> {
    match &args.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await.context("reading stdin")?;
            Ok(text)
        }
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
