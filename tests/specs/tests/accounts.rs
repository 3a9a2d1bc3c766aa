// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end account management against a real state directory.

use std::time::Duration;

use tavern::test_support::FakeBackend;
use tavern_specs::{session_payload, Tavern};

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn first_run_creates_empty_store() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    let run = tavern.run(&["accounts"])?;
    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    assert!(run.stdout.contains("No accounts"));

    let stored = tavern.stored()?;
    assert_eq!(stored["token"], serde_json::json!([]));
    assert_eq!(stored["session"], serde_json::json!({}));
    Ok(())
}

#[test]
fn alice_then_bob() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    let alice = session_payload("u1", "alice-token", "Alice").to_string();
    let bob = session_payload("u2", "bob-token", "Bob").to_string();

    assert_eq!(tavern.run_with_stdin(&["ingest"], &alice)?.code, Some(0));
    assert_eq!(tavern.run_with_stdin(&["ingest"], &bob)?.code, Some(0));

    let listing = tavern.run(&["accounts"])?.stdout;
    assert!(listing.lines().any(|l| l.starts_with("  Alice")));
    assert!(listing.lines().any(|l| l.starts_with("* Bob")));

    let stored = tavern.stored()?;
    assert_eq!(stored["token"].as_array().map(Vec::len), Some(2));
    assert_eq!(stored["token"][1]["active"], true);
    assert_eq!(stored["session"]["alice-token"]["username"], "Alice");
    // Derived, never persisted.
    assert!(stored["session"]["bob-token"].get("avatar_url").is_none());
    Ok(())
}

#[test]
fn switch_sign_out_and_forget() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    for (id, token, name) in [("u1", "tok-a", "Alice"), ("u2", "tok-b", "Bob")] {
        let payload = session_payload(id, token, name).to_string();
        assert_eq!(tavern.run_with_stdin(&["ingest"], &payload)?.code, Some(0));
    }

    let run = tavern.run(&["use", "u1"])?;
    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    assert!(run.stdout.contains("Now using Alice"));

    assert_eq!(tavern.run(&["sign-out"])?.code, Some(0));
    let stored = tavern.stored()?;
    let active = stored["token"].as_array().map(|a| a.iter().any(|c| c["active"] == true));
    assert_eq!(active, Some(false));

    assert_eq!(tavern.run(&["forget", "tok-b"])?.code, Some(0));
    let stored = tavern.stored()?;
    assert_eq!(stored["token"].as_array().map(Vec::len), Some(1));
    assert!(stored["session"].get("tok-b").is_none());
    Ok(())
}

#[test]
fn relogin_rotates_token() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    let first = session_payload("u1", "old-token", "Alice").to_string();
    let second = session_payload("u1", "new-token", "Alice").to_string();
    tavern.run_with_stdin(&["ingest"], &first)?;
    tavern.run_with_stdin(&["ingest"], &second)?;

    let stored = tavern.stored()?;
    assert_eq!(stored["token"].as_array().map(Vec::len), Some(1));
    assert_eq!(stored["token"][0]["access_token"], "new-token");
    assert!(stored["session"].get("old-token").is_none());
    Ok(())
}

#[test]
fn error_exit_codes() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    assert_eq!(tavern.run(&["use", "ghost"])?.code, Some(1));
    assert_eq!(tavern.run_with_stdin(&["ingest"], "not json")?.code, Some(2));
    assert_eq!(tavern.run(&["--log-format", "xml", "accounts"])?.code, Some(2));
    Ok(())
}

#[test]
fn corrupt_store_is_unavailable() -> anyhow::Result<()> {
    let tavern = Tavern::new()?;
    std::fs::write(tavern.store_path(), "{ not json")?;
    let run = tavern.run(&["accounts"])?;
    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("STORAGE_UNAVAILABLE"), "stderr: {}", run.stderr);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn login_receives_pushed_session() -> anyhow::Result<()> {
    let fake = FakeBackend::start().await?;
    let tavern = Tavern::new()?.with_backend(&fake.url());
    let mut login = tavern.spawn(&["login", "--timeout", "10"])?;

    fake.wait_listeners(1).await?;
    let payload = session_payload("u7", "pushed-token", "Pushed").to_string();
    fake.push(serde_json::json!({ "event": "session", "payload": payload }).to_string());

    assert_eq!(login.wait_exit(TIMEOUT).await?, Some(0));
    let stored = tavern.stored()?;
    assert_eq!(stored["token"][0]["access_token"], "pushed-token");
    assert_eq!(stored["token"][0]["active"], true);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn check_uses_identity_api() -> anyhow::Result<()> {
    let fake = FakeBackend::start().await?;
    fake.accept_token("good-token");
    let tavern = Tavern::new()?.with_backend(&fake.url());
    tavern.run_with_stdin(&["ingest"], &session_payload("u1", "good-token", "A").to_string())?;
    tavern.run_with_stdin(&["ingest"], &session_payload("u2", "bad-token", "B").to_string())?;

    assert_eq!(tavern.run(&["check", "u1"])?.code, Some(0));
    assert_eq!(tavern.run(&["check"])?.code, Some(1));
    Ok(())
}
