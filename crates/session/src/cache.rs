// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session cache: account book plus persistence and the read model.
//!
//! Mutations are applied to memory first and then queued for persistence.
//! The returned [`PersistTicket`] reports the write outcome; a failed write
//! never rolls back the in-memory change.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::book::{AccountBook, Ingested, LoadReport};
use crate::error::{redact, CacheError, ErrorKind};
use crate::model::{AccountCredential, AccountView, AvatarScheme, Profile, SessionEvent};
use crate::store::{KvStore, SESSION_KEY, TOKEN_KEY};
use crate::writer::{PersistTicket, WriteQueue};

/// Options for [`SessionCache::initialize`].
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub avatar: AvatarScheme,
}

/// Lifecycle of the cache as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheStatus {
    /// Stored state is still being read.
    Loading,
    Ready,
    /// The store could not be opened; only a fresh login is possible.
    Unavailable { reason: String },
}

/// Read model published to UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSnapshot {
    #[serde(flatten)]
    pub status: CacheStatus,
    pub active: Option<AccountView>,
    pub accounts: Vec<AccountView>,
}

impl CacheSnapshot {
    pub fn loading() -> Self {
        Self { status: CacheStatus::Loading, active: None, accounts: Vec::new() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: CacheStatus::Unavailable { reason: reason.into() },
            active: None,
            accounts: Vec::new(),
        }
    }
}

pub struct SessionCache {
    book: AccountBook,
    writer: WriteQueue,
    avatar: AvatarScheme,
    load_report: LoadReport,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").field("accounts", &self.book.len()).finish()
    }
}

impl SessionCache {
    /// Load the credential list and profile cache from `store`.
    ///
    /// Missing keys are written back as empty values so later loads always
    /// find both. Inconsistent stored state is repaired and logged rather
    /// than returned as an error; see [`SessionCache::load_report`]. Any
    /// repair rewrites both keys from the repaired book so the store stays
    /// consistent on disk.
    pub async fn initialize(
        store: Arc<dyn KvStore>,
        options: CacheOptions,
    ) -> Result<Self, CacheError> {
        let stored_tokens = store.get(TOKEN_KEY).await.map_err(as_unavailable)?;
        let stored_profiles = store.get(SESSION_KEY).await.map_err(as_unavailable)?;

        let mut report = LoadReport::default();
        let mut missing = Vec::new();

        let credentials: Vec<AccountCredential> = match stored_tokens {
            Some(value) => decode_or_reset(TOKEN_KEY, value, &mut report),
            None => {
                missing.push(TOKEN_KEY);
                Vec::new()
            }
        };
        let profiles: HashMap<String, Profile> = match stored_profiles {
            Some(value) => decode_or_reset(SESSION_KEY, value, &mut report),
            None => {
                missing.push(SESSION_KEY);
                HashMap::new()
            }
        };

        let (book, book_report) = AccountBook::from_stored(credentials, profiles);
        report.problems.extend(book_report.problems);
        for problem in &report.problems {
            tracing::warn!(err = %problem, "repaired stored session state");
        }

        let writer = WriteQueue::spawn(store);
        let cache = Self { book, writer, avatar: options.avatar, load_report: report };
        if !missing.is_empty() || !cache.load_report.is_clean() {
            if let Err(e) = cache.persist_all().wait().await {
                tracing::warn!(err = %e, ?missing, "failed to write repaired session state");
            }
        }

        tracing::info!(
            accounts = cache.book.len(),
            active = cache.book.active().is_some(),
            "session cache loaded"
        );
        Ok(cache)
    }

    /// Problems found (and repaired) while loading.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn active_session(&self) -> Option<AccountView> {
        self.book.active().map(|(c, p)| self.view(c, p))
    }

    /// All accounts in the order they were first created.
    pub fn accounts(&self) -> Vec<AccountView> {
        self.book.iter().map(|(c, p)| self.view(c, p)).collect()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            status: CacheStatus::Ready,
            active: self.active_session(),
            accounts: self.accounts(),
        }
    }

    /// Resolve an account reference (access token or external id) to its access token.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        if self.book.contains(reference) {
            return Some(reference.to_owned());
        }
        self.book.token_for(reference).map(String::from)
    }

    /// Reconcile a session event from the login flow and make it active.
    pub fn ingest_session_event(&mut self, event: SessionEvent) -> PersistTicket {
        let external_id = event.profile.external_id.clone();
        let account = redact(&event.access_token);
        match self.book.ingest(event) {
            Ingested::Added => {
                tracing::info!(%external_id, %account, "account added");
            }
            Ingested::Relogin { previous_token } => {
                tracing::info!(
                    %external_id,
                    %account,
                    previous = %redact(&previous_token),
                    "account signed in again"
                );
            }
        }
        self.persist_all()
    }

    /// Make the account with `access_token` the active session.
    pub fn activate(&mut self, access_token: &str) -> Result<PersistTicket, CacheError> {
        self.book.activate(access_token)?;
        tracing::info!(account = %redact(access_token), "account activated");
        Ok(self.persist_credentials())
    }

    /// Sign out of the active account without forgetting it.
    pub fn deactivate(&mut self) -> PersistTicket {
        match self.book.deactivate() {
            Some(previous) => {
                tracing::info!(account = %redact(&previous), "account deactivated");
                self.persist_credentials()
            }
            None => PersistTicket::done(),
        }
    }

    /// Forget an account entirely.
    pub fn remove(&mut self, access_token: &str) -> Result<PersistTicket, CacheError> {
        let was_active = self.book.remove(access_token)?;
        tracing::info!(account = %redact(access_token), was_active, "account removed");
        Ok(self.persist_all())
    }

    /// Ticket that resolves once every queued write has finished.
    pub fn flush(&self) -> PersistTicket {
        self.writer.flush()
    }

    fn view(&self, cred: &AccountCredential, profile: &Profile) -> AccountView {
        AccountView {
            access_token: cred.access_token.clone(),
            refresh_token: cred.refresh_token.clone(),
            active: cred.active,
            profile: profile.clone(),
            avatar_url: self.avatar.url_for(profile),
        }
    }

    fn persist_credentials(&self) -> PersistTicket {
        match serde_json::to_value(self.book.credentials()) {
            Ok(tokens) => self.writer.submit(vec![(TOKEN_KEY, tokens)]),
            Err(e) => encode_failed(e),
        }
    }

    fn persist_all(&self) -> PersistTicket {
        let encoded = serde_json::to_value(self.book.credentials())
            .and_then(|tokens| Ok((tokens, serde_json::to_value(self.book.profiles())?)));
        match encoded {
            Ok((tokens, profiles)) => {
                self.writer.submit(vec![(TOKEN_KEY, tokens), (SESSION_KEY, profiles)])
            }
            Err(e) => encode_failed(e),
        }
    }
}

fn as_unavailable(err: CacheError) -> CacheError {
    match err.kind() {
        ErrorKind::StorageUnavailable => err,
        _ => CacheError::storage_unavailable(err.message()),
    }
}

/// Decode a stored value, falling back to the empty default when it does not
/// match the expected shape.
fn decode_or_reset<T: DeserializeOwned + Default>(
    key: &'static str,
    value: Value,
    report: &mut LoadReport,
) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            let problem = CacheError::corrupt_state(format!("stored {key} unreadable: {e}"));
            report.problems.push(problem);
            T::default()
        }
    }
}

fn encode_failed(err: serde_json::Error) -> PersistTicket {
    tracing::warn!(err = %err, "failed to encode session cache");
    PersistTicket::failed(CacheError::write_failed(format!("encode: {err}")))
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
