// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tavern check`: ask the identity provider whether a cached token still works.

use clap::Args;

use tavern_session::{AccountView, CacheHandle};

use super::{ready, EXIT_FAILURE};
use crate::backend::BackendClient;
use crate::config::Config;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Access token or external id (defaults to the active account).
    pub account: Option<String>,
}

/// Pick the account to check.
pub fn select(accounts: Vec<AccountView>, reference: Option<&str>) -> Option<AccountView> {
    match reference {
        Some(r) => {
            accounts.into_iter().find(|a| a.access_token == r || a.profile.external_id == r)
        }
        None => accounts.into_iter().find(|a| a.active),
    }
}

pub async fn run(config: &Config, handle: &CacheHandle, args: &CheckArgs) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    let Some(account) = select(handle.accounts(), args.account.as_deref()) else {
        match &args.account {
            Some(r) => eprintln!("error: no account matches {r:?}"),
            None => eprintln!("error: no active account"),
        }
        return EXIT_FAILURE;
    };

    let backend = match BackendClient::new(config.backend_url(), config.identity_api()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_FAILURE;
        }
    };
    match backend.check_token_valid(&account.access_token).await {
        Ok(true) => {
            println!("{}: token valid", account.display_name());
            0
        }
        Ok(false) => {
            println!("{}: token rejected, run `tavern login` again", account.display_name());
            EXIT_FAILURE
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
