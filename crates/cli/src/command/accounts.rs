// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tavern accounts`, `use`, `sign-out`, `forget`: manage cached accounts.

use tavern_session::error::redact;
use tavern_session::{AccountView, CacheError, CacheHandle, ErrorKind, PersistTicket};

use super::{ready, EXIT_FAILURE};

/// Render the account table. The active account is marked with `*`.
pub fn format_table(accounts: &[AccountView]) -> String {
    if accounts.is_empty() {
        return "No accounts. Run `tavern login` to add one.\n".to_owned();
    }
    let mut out = format!("  {:<24} {:<20} {:<10}\n", "NAME", "ID", "TOKEN");
    out.push_str(&"-".repeat(58));
    out.push('\n');
    for account in accounts {
        let marker = if account.active { '*' } else { ' ' };
        out.push_str(&format!(
            "{marker} {:<24} {:<20} {:<10}\n",
            account.display_name(),
            account.profile.external_id,
            redact(&account.access_token),
        ));
    }
    out
}

pub async fn list(handle: &CacheHandle) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    print!("{}", format_table(&handle.accounts()));
    0
}

pub async fn activate(handle: &CacheHandle, reference: &str) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    match handle.activate(reference).await {
        Ok(ticket) => {
            let code = settle(ticket).await;
            if let Some(active) = handle.active_session() {
                println!("Now using {} ({}).", active.display_name(), active.profile.external_id);
            }
            code
        }
        Err(e) => fail(&e, reference),
    }
}

pub async fn sign_out(handle: &CacheHandle) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    let previous = handle.active_session();
    match handle.deactivate().await {
        Ok(ticket) => {
            let code = settle(ticket).await;
            match previous {
                Some(account) => println!("Signed out of {}.", account.display_name()),
                None => println!("No active account."),
            }
            code
        }
        Err(e) => fail(&e, ""),
    }
}

pub async fn forget(handle: &CacheHandle, reference: &str) -> i32 {
    if !ready(handle).await {
        return EXIT_FAILURE;
    }
    let target = handle
        .accounts()
        .into_iter()
        .find(|a| a.access_token == reference || a.profile.external_id == reference);
    match handle.remove(reference).await {
        Ok(ticket) => {
            let code = settle(ticket).await;
            if let Some(account) = target {
                println!("Forgot {} ({}).", account.display_name(), account.profile.external_id);
            }
            code
        }
        Err(e) => fail(&e, reference),
    }
}

/// Wait for the persistence write. The in-memory change stands either way.
pub(crate) async fn settle(ticket: PersistTicket) -> i32 {
    match ticket.wait().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("warning: change applied but not saved: {e}");
            EXIT_FAILURE
        }
    }
}

fn fail(err: &CacheError, reference: &str) -> i32 {
    match err.kind() {
        ErrorKind::UnknownAccount => eprintln!("error: no account matches {reference:?}"),
        _ => eprintln!("error: {err}"),
    }
    EXIT_FAILURE
}

#[cfg(test)]
#[path = "accounts_tests.rs"]
mod tests;
