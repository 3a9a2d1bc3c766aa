// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value persistence used by the session cache.
//!
//! The cache owns two keys: [`TOKEN_KEY`] (credential list) and
//! [`SESSION_KEY`] (access token to profile map). Writes replace whole values;
//! `save` commits staged values to durable storage.

pub mod file;
pub mod memory;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::error::CacheError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Storage key for the ordered credential list.
pub const TOKEN_KEY: &str = "token";

/// Storage key for the access-token-to-profile map.
pub const SESSION_KEY: &str = "session";

/// File name of the JSON store inside the state directory.
pub const STORE_FILE: &str = "store.json";

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Asynchronous key-value store.
///
/// Object-safe for use as `Arc<dyn KvStore>`.
pub trait KvStore: Send + Sync + 'static {
    /// Read a value. `Ok(None)` when the key has never been written.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<serde_json::Value>>;

    /// Stage a whole-value replacement for `key`.
    fn set<'a>(&'a self, key: &'a str, value: serde_json::Value) -> StoreFuture<'a, ()>;

    /// Commit staged values.
    fn save(&self) -> StoreFuture<'_, ()>;
}

/// Resolve the state directory for tavern data.
///
/// Checks `TAVERN_STATE_DIR`, then `$XDG_STATE_HOME/tavern`,
/// then `$HOME/.local/state/tavern`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TAVERN_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tavern");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tavern");
    }
    PathBuf::from(".tavern")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
