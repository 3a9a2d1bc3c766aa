// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped subscription feeding push events into the cache.
//!
//! A [`Subscription`] owns a forwarding task. Dropping it (or calling
//! [`Subscription::close`]) stops delivery, so a torn-down consumer never
//! keeps mutating the cache.

use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::events::PushEvent;
use crate::handle::CacheHandle;
use crate::model::SessionEvent;

#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Forward every session event from `events` into `handle`.
    pub fn session_events<S>(handle: CacheHandle, events: S) -> Self
    where
        S: Stream<Item = SessionEvent> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward(handle, events, cancel.clone()));
        Self { cancel, task: Some(task) }
    }

    /// Forward the `session` events carried on a push broadcast.
    ///
    /// Delivery is bounded by the broadcast capacity (256 events on the
    /// host's push channel). A receiver that falls further behind loses the
    /// overflowed events; the lag is logged and delivery resumes with the
    /// oldest event still buffered.
    pub fn from_broadcast(handle: CacheHandle, rx: broadcast::Receiver<PushEvent>) -> Self {
        let events = BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(PushEvent::Session(event)) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "session subscription lagged");
                    None
                }
            }
        });
        Self::session_events(handle, events)
    }

    /// Whether events are still being delivered.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop delivery and wait for the forwarding task to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn forward<S>(handle: CacheHandle, events: S, cancel: CancellationToken)
where
    S: Stream<Item = SessionEvent> + Send + 'static,
{
    let mut events = std::pin::pin!(events);
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = events.next() => match next {
                Some(event) => event,
                None => break,
            },
        };
        if let Err(e) = handle.submit(event).await {
            tracing::warn!(err = %e, "session event dropped");
            if e.kind().is_fatal() {
                break;
            }
        }
    }
    tracing::debug!("session subscription ended");
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
