// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file store: one object per file, saved with atomic writes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{KvStore, StoreFuture};
use crate::error::CacheError;

/// Store backed by a single JSON object on disk.
///
/// Values are staged in memory by `set` and written out by `save`. The file
/// is created on the first save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file opens as empty; an unreadable
    /// or malformed file is [`StorageUnavailable`](crate::error::ErrorKind::StorageUnavailable).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(CacheError::storage_unavailable(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(CacheError::storage_unavailable(format!(
                        "{} is not valid JSON: {e}",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(CacheError::storage_unavailable(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "opened store");
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move { Ok(self.values.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.values.lock().await.insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn save(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let json = {
                let values = self.values.lock().await;
                serde_json::to_string_pretty(&*values)
                    .map_err(|e| CacheError::write_failed(format!("serialize store: {e}")))?
            };
            write_atomic(&self.path, json.as_bytes())
                .await
                .map_err(|e| CacheError::write_failed(format!("{}: {e}", self.path.display())))
        })
    }
}

/// Write via a uniquely named temp file and rename over `path`.
///
/// The temp name carries PID and a counter so overlapping saves never share
/// a temp file.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
