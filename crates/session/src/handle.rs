// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-owner cache task and the cloneable handle UI consumers hold.
//!
//! The [`SessionCache`] lives inside one task. Consumers send commands over
//! a channel and read the latest [`CacheSnapshot`] from a watch channel.
//! The command channel exists before the store is loaded, so commands sent
//! during startup queue up and run, in order, once loading finishes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::cache::{CacheOptions, CacheSnapshot, CacheStatus, SessionCache};
use crate::error::CacheError;
use crate::model::{AccountView, SessionEvent};
use crate::store::KvStore;
use crate::writer::PersistTicket;

/// Depth of the command queue before senders wait.
const COMMAND_QUEUE_DEPTH: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, CacheError>>;

enum Command {
    Ingest { event: SessionEvent, reply: Option<Reply<PersistTicket>> },
    Activate { reference: String, reply: Reply<PersistTicket> },
    Deactivate { reply: Reply<PersistTicket> },
    Remove { reference: String, reply: Reply<PersistTicket> },
    Flush { reply: Reply<PersistTicket> },
}

impl Command {
    fn reject(self, err: CacheError) {
        match self {
            Self::Ingest { reply, .. } => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
            }
            Self::Activate { reply, .. }
            | Self::Deactivate { reply }
            | Self::Remove { reply, .. }
            | Self::Flush { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Handle to the running session cache. Clone freely.
#[derive(Clone)]
pub struct CacheHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<CacheSnapshot>,
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("status", &self.snapshot.borrow().status).finish()
    }
}

impl CacheHandle {
    /// Spawn the cache task. `open` resolves to the store; the cache loads
    /// from it and then serves commands until every handle is dropped.
    pub fn spawn<F>(open: F, options: CacheOptions) -> Self
    where
        F: Future<Output = Result<Arc<dyn KvStore>, CacheError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (snapshot_tx, snapshot) = watch::channel(CacheSnapshot::loading());
        tokio::spawn(run(open, options, rx, snapshot_tx));
        Self { tx, snapshot }
    }

    /// Spawn the cache task over an already opened store.
    pub fn spawn_with_store(store: Arc<dyn KvStore>, options: CacheOptions) -> Self {
        Self::spawn(async move { Ok(store) }, options)
    }

    /// Wait for loading to finish.
    pub async fn ready(&self) -> Result<(), CacheError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| s.status != CacheStatus::Loading)
            .await
            .map_err(|_| CacheError::closed())?;
        match &snapshot.status {
            CacheStatus::Unavailable { reason } => {
                Err(CacheError::storage_unavailable(reason.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Latest published read model.
    pub fn snapshot(&self) -> CacheSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn active_session(&self) -> Option<AccountView> {
        self.snapshot.borrow().active.clone()
    }

    pub fn accounts(&self) -> Vec<AccountView> {
        self.snapshot.borrow().accounts.clone()
    }

    /// Receiver that is notified whenever the read model changes.
    pub fn watch(&self) -> watch::Receiver<CacheSnapshot> {
        self.snapshot.clone()
    }

    /// Ingest a session event and wait for it to be applied in memory.
    pub async fn ingest(&self, event: SessionEvent) -> Result<PersistTicket, CacheError> {
        self.request(|reply| Command::Ingest { event, reply: Some(reply) }).await
    }

    /// Queue a session event without waiting for it to be applied.
    pub async fn submit(&self, event: SessionEvent) -> Result<(), CacheError> {
        self.tx
            .send(Command::Ingest { event, reply: None })
            .await
            .map_err(|_| CacheError::closed())
    }

    /// Activate an account by access token or external id.
    pub async fn activate(&self, reference: &str) -> Result<PersistTicket, CacheError> {
        let reference = reference.to_owned();
        self.request(|reply| Command::Activate { reference, reply }).await
    }

    pub async fn deactivate(&self) -> Result<PersistTicket, CacheError> {
        self.request(|reply| Command::Deactivate { reply }).await
    }

    /// Remove an account by access token or external id.
    pub async fn remove(&self, reference: &str) -> Result<PersistTicket, CacheError> {
        let reference = reference.to_owned();
        self.request(|reply| Command::Remove { reference, reply }).await
    }

    /// Wait until every write queued so far has landed.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.request(|reply| Command::Flush { reply }).await?.wait().await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| CacheError::closed())?;
        rx.await.map_err(|_| CacheError::closed())?
    }
}

async fn run<F>(
    open: F,
    options: CacheOptions,
    mut rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<CacheSnapshot>,
) where
    F: Future<Output = Result<Arc<dyn KvStore>, CacheError>> + Send + 'static,
{
    let loaded = match open.await {
        Ok(store) => SessionCache::initialize(store, options).await,
        Err(e) => Err(e),
    };
    let mut cache = match loaded {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!(err = %e, "session cache unavailable");
            snapshot_tx.send_replace(CacheSnapshot::unavailable(e.message()));
            while let Some(cmd) = rx.recv().await {
                cmd.reject(e.clone());
            }
            return;
        }
    };
    snapshot_tx.send_replace(cache.snapshot());

    while let Some(cmd) = rx.recv().await {
        let outcome = apply(&mut cache, cmd);
        let next = cache.snapshot();
        snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        // Reply only after publishing so callers observe their own change.
        if let Some((reply, result)) = outcome {
            let _ = reply.send(result);
        }
    }

    if let Err(e) = cache.flush().wait().await {
        tracing::warn!(err = %e, "final session cache flush failed");
    }
    tracing::debug!("session cache stopped");
}

type Outcome = Option<(Reply<PersistTicket>, Result<PersistTicket, CacheError>)>;

fn apply(cache: &mut SessionCache, cmd: Command) -> Outcome {
    match cmd {
        Command::Ingest { event, reply } => {
            let ticket = cache.ingest_session_event(event);
            match reply {
                Some(reply) => Some((reply, Ok(ticket))),
                // Fire-and-forget; the writer logs failed writes.
                None => {
                    drop(ticket);
                    None
                }
            }
        }
        Command::Activate { reference, reply } => {
            let result = match cache.resolve(&reference) {
                Some(token) => cache.activate(&token),
                None => Err(CacheError::unknown_account(&reference)),
            };
            Some((reply, result))
        }
        Command::Deactivate { reply } => Some((reply, Ok(cache.deactivate()))),
        Command::Remove { reference, reply } => {
            let result = match cache.resolve(&reference) {
                Some(token) => cache.remove(&token),
                None => Err(CacheError::unknown_account(&reference)),
            };
            Some((reply, result))
        }
        Command::Flush { reply } => Some((reply, Ok(cache.flush()))),
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
