// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process store with fault injection, used by tests and ephemeral hosts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::{KvStore, StoreFuture};
use crate::error::CacheError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    staged: Mutex<HashMap<String, Value>>,
    saved: Mutex<HashMap<String, Value>>,
    /// Every `set` in the order it was applied.
    history: Mutex<Vec<(String, Value)>>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with committed values.
    pub fn with_values(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        let values: HashMap<String, Value> = values.into_iter().collect();
        let store = Self::new();
        *store.staged.lock() = values.clone();
        *store.saved.lock() = values;
        store
    }

    /// Make every read fail, as if the backing store could not be opened.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Make every `set` and `save` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Sleep before applying each `set`, to widen race windows in tests.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// Last committed value for `key`.
    pub fn saved(&self, key: &str) -> Option<Value> {
        self.saved.lock().get(key).cloned()
    }

    pub fn history(&self) -> Vec<(String, Value)> {
        self.history.lock().clone()
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::Relaxed) {
                return Err(CacheError::storage_unavailable("memory store marked unavailable"));
            }
            Ok(self.staged.lock().get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let delay = *self.write_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(CacheError::write_failed(format!("injected failure writing {key}")));
            }
            self.history.lock().push((key.to_owned(), value.clone()));
            self.staged.lock().insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn save(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(CacheError::write_failed("injected failure saving"));
            }
            let staged = self.staged.lock().clone();
            *self.saved.lock() = staged;
            Ok(())
        })
    }
}
