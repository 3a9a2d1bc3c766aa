// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands. Each returns a process exit code.

pub mod accounts;
pub mod check;
pub mod ingest;
pub mod login;

use std::sync::Arc;

use tavern_session::{CacheHandle, CacheOptions, JsonFileStore, KvStore};

use crate::config::{Command, Config};

/// Exit code for a failed operation.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for bad usage or configuration.
pub const EXIT_USAGE: i32 = 2;

/// Dispatch the parsed subcommand.
pub async fn run(config: &Config) -> i32 {
    let handle = open_cache(config);
    let code = match &config.command {
        Command::Accounts => accounts::list(&handle).await,
        Command::Use { account } => accounts::activate(&handle, account).await,
        Command::SignOut => accounts::sign_out(&handle).await,
        Command::Forget { account } => accounts::forget(&handle, account).await,
        Command::Ingest(args) => ingest::run(&handle, args).await,
        Command::Login(args) => login::run(config, &handle, args).await,
        Command::Check(args) => check::run(config, &handle, args).await,
        Command::Listen => login::listen(config, &handle).await,
    };
    // Land any write still queued before the process exits.
    if let Err(e) = handle.flush().await {
        tracing::debug!(err = %e, "final flush skipped");
    }
    code
}

/// Spawn the cache over the JSON store in the configured state directory.
pub fn open_cache(config: &Config) -> CacheHandle {
    let path = config.store_path();
    let options = CacheOptions { avatar: config.avatar_scheme() };
    CacheHandle::spawn(
        async move {
            let store = JsonFileStore::open(path).await?;
            let store: Arc<dyn KvStore> = Arc::new(store);
            Ok(store)
        },
        options,
    )
}

/// Wait for the cache to load, printing the failure if it cannot.
async fn ready(handle: &CacheHandle) -> bool {
    match handle.ready().await {
        Ok(()) => true,
        Err(e) => {
            eprintln!("error: {e}");
            false
        }
    }
}
