// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary tests.
//!
//! Runs the real `tavern` binary as a subprocess against a private state
//! directory, so every test starts from an empty account store.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `tavern` binary.
pub fn tavern_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tavern")
}

/// Captured result of one `tavern` invocation.
#[derive(Debug)]
pub struct Run {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for Run {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// A state directory plus the settings every invocation shares.
pub struct Tavern {
    state_dir: tempfile::TempDir,
    backend_url: String,
    identity_api: String,
}

impl Tavern {
    pub fn new() -> anyhow::Result<Self> {
        let binary = tavern_binary();
        anyhow::ensure!(binary.exists(), "tavern binary not found at {}", binary.display());
        Ok(Self {
            state_dir: tempfile::tempdir()?,
            // Nothing listens here unless a test points it at a fake backend.
            backend_url: "http://127.0.0.1:9".to_owned(),
            identity_api: "http://127.0.0.1:9".to_owned(),
        })
    }

    /// Point backend and identity API calls at `url`.
    pub fn with_backend(mut self, url: &str) -> Self {
        self.backend_url = url.to_owned();
        self.identity_api = url.to_owned();
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.path().join("store.json")
    }

    /// Parsed contents of the JSON store.
    pub fn stored(&self) -> anyhow::Result<serde_json::Value> {
        let text = std::fs::read_to_string(self.store_path())?;
        Ok(serde_json::from_str(&text)?)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(tavern_binary());
        cmd.args(args)
            .env("TAVERN_STATE_DIR", self.state_dir.path())
            .env("TAVERN_BACKEND_URL", &self.backend_url)
            .env("TAVERN_IDENTITY_API", &self.identity_api)
            .env("TAVERN_LOG_LEVEL", "warn");
        cmd
    }

    /// Run to completion with empty stdin.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<Run> {
        let output = self.command(args).stdin(Stdio::null()).output()?;
        Ok(output.into())
    }

    /// Run to completion, feeding `input` on stdin.
    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> anyhow::Result<Run> {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        Ok(child.wait_with_output()?.into())
    }

    /// Start a long-running invocation (e.g. `login`); killed on drop.
    pub fn spawn(&self, args: &[&str]) -> anyhow::Result<TavernProcess> {
        let child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(TavernProcess { child })
    }
}

/// A running `tavern` process that is killed on drop.
pub struct TavernProcess {
    child: Child,
}

impl TavernProcess {
    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<Option<i32>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("tavern did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status.code());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for TavernProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// JSON for a bare session payload.
pub fn session_payload(external_id: &str, token: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "refresh_token": format!("refresh-{token}"),
        "session": { "id": external_id, "username": username, "avatar": "hash" },
    })
}
