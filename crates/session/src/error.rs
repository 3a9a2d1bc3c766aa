// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error kinds for session cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    StorageUnavailable,
    CorruptState,
    UnknownAccount,
    PersistenceWriteFailed,
    Closed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::CorruptState => "CORRUPT_STATE",
            Self::UnknownAccount => "UNKNOWN_ACCOUNT",
            Self::PersistenceWriteFailed => "PERSISTENCE_WRITE_FAILED",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether the cache is still usable after an error of this kind.
    ///
    /// Only a store that cannot be opened (or a stopped cache task) leaves
    /// the consumer without accounts; everything else is a warning or a
    /// refused action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::Closed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the session cache, its store, and its write queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheError {
    kind: ErrorKind,
    message: String,
}

impl CacheError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageUnavailable, message)
    }

    pub fn corrupt_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptState, message)
    }

    pub fn unknown_account(access_token: &str) -> Self {
        let message = format!("no account for token {}", redact(access_token));
        Self::new(ErrorKind::UnknownAccount, message)
    }

    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PersistenceWriteFailed, message)
    }

    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed, "session cache task has stopped")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CacheError {}

/// Shorten an access token for logs and error messages.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    if prefix.len() < token.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
