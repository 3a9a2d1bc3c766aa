// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tavern login` and `tavern listen`: drive the external login flow over the
//! backend push channel.

use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast;

use tavern_session::{CacheHandle, PushEvent, Subscription};

use super::accounts::settle;
use super::{ready, EXIT_FAILURE};
use crate::backend::BackendClient;
use crate::config::Config;
use crate::push::PushChannel;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Seconds to wait for the session to arrive.
    #[arg(long, default_value = "120")]
    pub timeout: u64,

    /// Open the login URL in a browser.
    #[arg(long)]
    pub open: bool,
}

/// How a login attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    SignedIn { name: String, external_id: String },
    Disconnected(String),
    TimedOut,
}

pub async fn run(config: &Config, handle: &CacheHandle, args: &LoginArgs) -> i32 {
    // A session that cannot be cached is lost, so fail before the user signs in.
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    let backend = match BackendClient::new(config.backend_url(), config.identity_api()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_FAILURE;
        }
    };
    // Subscribe before asking for the URL so the session cannot slip past.
    let push = PushChannel::connect(backend.backend_url());
    let events = push.subscribe();

    let url = match backend.begin_external_login().await {
        Ok(url) => url,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_FAILURE;
        }
    };
    println!("Open this URL to log in:\n  {url}");
    if args.open {
        open_browser(&url);
    }

    match await_session(handle, events, Duration::from_secs(args.timeout)).await {
        Ok(LoginOutcome::SignedIn { name, external_id }) => {
            println!("Signed in as {name} ({external_id}).");
            0
        }
        Ok(LoginOutcome::Disconnected(reason)) => {
            eprintln!("error: login aborted: {reason}");
            EXIT_FAILURE
        }
        Ok(LoginOutcome::TimedOut) => {
            eprintln!("error: no session after {}s", args.timeout);
            EXIT_FAILURE
        }
        Err(code) => code,
    }
}

/// Wait for the first session event and ingest it.
///
/// `Err` carries the exit code when the cache itself failed.
pub async fn await_session(
    handle: &CacheHandle,
    mut events: broadcast::Receiver<PushEvent>,
    timeout: Duration,
) -> Result<LoginOutcome, i32> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => return Ok(LoginOutcome::TimedOut),
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                tracing::warn!(skipped = n, "login listener lagged");
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                return Ok(LoginOutcome::Disconnected("push channel closed".to_owned()));
            }
            Ok(Ok(event)) => event,
        };
        match event {
            PushEvent::Session(session) => {
                let name = session.profile.display_name().to_owned();
                let external_id = session.profile.external_id.clone();
                if !ready(handle).await {
                    return Err(EXIT_FAILURE);
                }
                let ticket = match handle.ingest(session).await {
                    Ok(ticket) => ticket,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return Err(EXIT_FAILURE);
                    }
                };
                if settle(ticket).await != 0 {
                    return Err(EXIT_FAILURE);
                }
                return Ok(LoginOutcome::SignedIn { name, external_id });
            }
            PushEvent::OpenLoginUrl(url) => println!("Open this URL to log in:\n  {url}"),
            PushEvent::LoginDisconnect(reason) => return Ok(LoginOutcome::Disconnected(reason)),
            other => tracing::debug!(event = other.name(), "ignoring push event during login"),
        }
    }
}

/// Keep the push subscription open, ingesting every session until Ctrl-C.
pub async fn listen(config: &Config, handle: &CacheHandle) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    let push = PushChannel::connect(config.backend_url());
    let subscription = Subscription::from_broadcast(handle.clone(), push.subscribe());
    let mut log_rx = push.subscribe();
    let mut snapshots = handle.watch();
    tracing::info!(backend = config.backend_url(), "listening for push events");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let active = snapshots.borrow_and_update().active.clone();
                match active {
                    Some(a) => println!("active: {} ({})", a.display_name(), a.profile.external_id),
                    None => println!("active: none"),
                }
            }
            event = log_rx.recv() => match event {
                Ok(PushEvent::Message(msg)) => {
                    tracing::info!(author = %msg.author, "message: {}", msg.content);
                }
                Ok(PushEvent::ConnectedUsers(users)) => {
                    tracing::info!(count = users.len(), "connected users updated");
                }
                Ok(PushEvent::OpenLoginUrl(url)) => println!("login URL: {url}"),
                Ok(PushEvent::LoginDisconnect(reason)) => {
                    tracing::info!(%reason, "login disconnected");
                }
                Ok(PushEvent::Session(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    subscription.close().await;
    push.close();
    0
}

fn open_browser(url: &str) {
    let cmd = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    match std::process::Command::new(cmd).arg(url).spawn() {
        Ok(_) => eprintln!("Opening {url}"),
        Err(e) => eprintln!("Failed to open browser: {e}"),
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
