// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push channel: one WebSocket connection to the backend, parsed frames fanned
//! out to every subscriber.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use tavern_session::PushEvent;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Backend push connection.
///
/// Reconnects with exponential backoff until dropped. Subscribers only see
/// events received after they subscribe.
pub struct PushChannel {
    tx: broadcast::Sender<PushEvent>,
    cancel: CancellationToken,
}

impl PushChannel {
    /// Connect to `{backend_url}/ws` and start forwarding events.
    pub fn connect(backend_url: &str) -> Self {
        let (tx, _) = broadcast::channel(256);
        let cancel = CancellationToken::new();
        let url = build_ws_url(backend_url);
        tokio::spawn(run(url, tx.clone(), cancel.clone()));
        Self { tx, cancel }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(url: String, tx: broadcast::Sender<PushEvent>, cancel: CancellationToken) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match tokio_tungstenite::connect_async(&url).await {
            Ok((ws_stream, _)) => {
                backoff = INITIAL_BACKOFF;
                tracing::debug!(%url, "push channel connected");
                let (_write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => dispatch(&tx, &text),
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::debug!(%url, "push channel closed");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::debug!(%url, err = %e, "push channel error");
                                break;
                            }
                            _ => {}
                        },
                    }
                }
            }
            Err(e) => {
                tracing::debug!(
                    %url,
                    err = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "push connect failed, retrying"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
    tracing::debug!("push channel stopped");
}

fn dispatch(tx: &broadcast::Sender<PushEvent>, text: &str) {
    match PushEvent::parse(text) {
        Ok(Some(event)) => {
            tracing::trace!(event = event.name(), "push event");
            // No subscribers is fine.
            let _ = tx.send(event);
        }
        Ok(None) => tracing::trace!("ignoring unknown push event"),
        Err(e) => tracing::warn!(err = %e, "malformed push frame"),
    }
}

/// Convert an http(s) base URL into the push socket URL.
pub fn build_ws_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };
    format!("{ws_base}/ws")
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
