// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialized persistence: one writer task per store.
//!
//! Every write is queued and applied in submission order, so back-to-back
//! mutations never interleave their `set`/`save` calls.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::CacheError;
use crate::store::KvStore;

struct WriteJob {
    entries: Vec<(&'static str, Value)>,
    ack: oneshot::Sender<Result<(), CacheError>>,
}

/// Handle to the writer task for one store. Cloning shares the same queue.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue").field("closed", &self.tx.is_closed()).finish()
    }
}

impl WriteQueue {
    /// Spawn the writer task. It exits once every queue handle is dropped
    /// and the backlog is drained.
    pub fn spawn(store: Arc<dyn KvStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = apply(store.as_ref(), job.entries).await;
                if let Err(ref e) = result {
                    tracing::warn!(err = %e, "failed to persist session cache");
                }
                // The submitter may not care about the outcome.
                let _ = job.ack.send(result);
            }
            tracing::debug!("write queue drained");
        });
        Self { tx }
    }

    /// Queue whole-value replacements for `entries` followed by a save.
    pub fn submit(&self, entries: Vec<(&'static str, Value)>) -> PersistTicket {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(WriteJob { entries, ack }).is_err() {
            return PersistTicket::failed(CacheError::write_failed("write queue closed"));
        }
        PersistTicket::pending(rx)
    }

    /// Ticket that resolves once every write queued before it has finished.
    pub fn flush(&self) -> PersistTicket {
        self.submit(Vec::new())
    }
}

async fn apply(store: &dyn KvStore, entries: Vec<(&'static str, Value)>) -> Result<(), CacheError> {
    if entries.is_empty() {
        return Ok(());
    }
    for (key, value) in entries {
        store.set(key, value).await.map_err(|e| CacheError::write_failed(e.message()))?;
    }
    store.save().await.map_err(|e| CacheError::write_failed(e.message()))
}

/// Outcome of a queued persistence write.
///
/// Awaiting is optional: the in-memory change is already applied, and a
/// failed write is logged by the writer either way.
#[derive(Debug)]
#[must_use = "await the ticket to observe persistence failures, or drop it explicitly"]
pub struct PersistTicket {
    state: TicketState,
}

#[derive(Debug)]
enum TicketState {
    Done,
    Failed(CacheError),
    Pending(oneshot::Receiver<Result<(), CacheError>>),
}

impl PersistTicket {
    /// A ticket for a mutation that needed no write.
    pub fn done() -> Self {
        Self { state: TicketState::Done }
    }

    pub(crate) fn failed(err: CacheError) -> Self {
        Self { state: TicketState::Failed(err) }
    }

    fn pending(rx: oneshot::Receiver<Result<(), CacheError>>) -> Self {
        Self { state: TicketState::Pending(rx) }
    }

    /// Wait for the write to land.
    pub async fn wait(self) -> Result<(), CacheError> {
        match self.state {
            TicketState::Done => Ok(()),
            TicketState::Failed(err) => Err(err),
            TicketState::Pending(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(CacheError::write_failed("writer stopped before completing")),
            },
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
