// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory account book: the credential list plus the profile cache.
//!
//! Everything here is synchronous and free of I/O. The book upholds two
//! invariants after every operation: at most one credential is active, and
//! the profile keys are exactly the credential access tokens.

use std::collections::{HashMap, HashSet};

use crate::error::{redact, CacheError};
use crate::model::{AccountCredential, Profile, SessionEvent};

/// Outcome of reconciling a session event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// First login for this external id.
    Added,
    /// Re-login of a known account; the profile moved from `previous_token`.
    Relogin { previous_token: String },
}

/// Problems found while loading stored state. The book is already repaired.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub problems: Vec<CacheError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
pub struct AccountBook {
    credentials: Vec<AccountCredential>,
    profiles: HashMap<String, Profile>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from stored values, repairing anything that breaks the
    /// book's invariants.
    ///
    /// Repairs, in order: duplicate access tokens (first wins), credentials
    /// without a profile, profiles without a credential, duplicate external
    /// ids (first wins), and more than one active credential (all cleared).
    pub fn from_stored(
        credentials: Vec<AccountCredential>,
        mut profiles: HashMap<String, Profile>,
    ) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let mut seen_tokens = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut kept = Vec::with_capacity(credentials.len());

        for cred in credentials {
            if !seen_tokens.insert(cred.access_token.clone()) {
                report.problems.push(CacheError::corrupt_state(format!(
                    "duplicate credential {}",
                    redact(&cred.access_token)
                )));
                continue;
            }
            let Some(profile) = profiles.get_mut(&cred.access_token) else {
                report.problems.push(CacheError::corrupt_state(format!(
                    "credential {} has no profile",
                    redact(&cred.access_token)
                )));
                continue;
            };
            if !seen_ids.insert(profile.external_id.clone()) {
                report.problems.push(CacheError::corrupt_state(format!(
                    "duplicate account {}",
                    profile.external_id
                )));
                profiles.remove(&cred.access_token);
                continue;
            }
            profile.strip_derived();
            kept.push(cred);
        }

        let orphans: Vec<String> =
            profiles.keys().filter(|k| !seen_tokens.contains(*k)).cloned().collect();
        for key in orphans {
            profiles.remove(&key);
            report.problems.push(CacheError::corrupt_state(format!(
                "profile {} has no credential",
                redact(&key)
            )));
        }

        let active = kept.iter().filter(|c| c.active).count();
        if active > 1 {
            report.problems.push(CacheError::corrupt_state(format!(
                "{active} credentials marked active"
            )));
            for cred in &mut kept {
                cred.active = false;
            }
        }

        (Self { credentials: kept, profiles }, report)
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn credentials(&self) -> &[AccountCredential] {
        &self.credentials
    }

    pub fn profiles(&self) -> &HashMap<String, Profile> {
        &self.profiles
    }

    pub fn contains(&self, access_token: &str) -> bool {
        self.profiles.contains_key(access_token)
    }

    /// Accounts in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccountCredential, &Profile)> + '_ {
        self.credentials
            .iter()
            .filter_map(|c| self.profiles.get(&c.access_token).map(|p| (c, p)))
    }

    pub fn active(&self) -> Option<(&AccountCredential, &Profile)> {
        self.iter().find(|(c, _)| c.active)
    }

    /// Find the access token currently bound to an external id.
    pub fn token_for(&self, external_id: &str) -> Option<&str> {
        self.iter()
            .find(|(_, p)| p.external_id == external_id)
            .map(|(c, _)| c.access_token.as_str())
    }

    /// Reconcile a session event into the book and make it the active account.
    ///
    /// Accounts are matched on external id, never on access token, because
    /// the access token rotates on every login.
    pub fn ingest(&mut self, event: SessionEvent) -> Ingested {
        let SessionEvent { access_token, refresh_token, mut profile } = event;
        profile.strip_derived();

        for cred in &mut self.credentials {
            cred.active = false;
        }

        // The token may still be keyed to another account from an earlier
        // login; tokens must stay unique, so that stale entry goes.
        let stale = self
            .profiles
            .get(&access_token)
            .is_some_and(|p| p.external_id != profile.external_id);
        if stale {
            tracing::warn!(
                account = %redact(&access_token),
                "evicting stale account holding incoming token"
            );
            self.delete(&access_token);
        }

        let existing = self.credentials.iter().position(|c| {
            self.profiles.get(&c.access_token).is_some_and(|p| p.external_id == profile.external_id)
        });

        match existing {
            Some(idx) => {
                let previous_token =
                    std::mem::replace(&mut self.credentials[idx].access_token, access_token.clone());
                self.credentials[idx].refresh_token = refresh_token;
                self.credentials[idx].active = true;
                self.profiles.remove(&previous_token);
                self.profiles.insert(access_token, profile);
                Ingested::Relogin { previous_token }
            }
            None => {
                self.credentials.push(AccountCredential {
                    access_token: access_token.clone(),
                    refresh_token,
                    active: true,
                });
                self.profiles.insert(access_token, profile);
                Ingested::Added
            }
        }
    }

    /// Make `access_token` the only active credential.
    pub fn activate(&mut self, access_token: &str) -> Result<(), CacheError> {
        if !self.contains(access_token) {
            return Err(CacheError::unknown_account(access_token));
        }
        for cred in &mut self.credentials {
            cred.active = cred.access_token == access_token;
        }
        Ok(())
    }

    /// Clear the active flag. Returns the token that was active, if any.
    pub fn deactivate(&mut self) -> Option<String> {
        let cred = self.credentials.iter_mut().find(|c| c.active)?;
        cred.active = false;
        Some(cred.access_token.clone())
    }

    /// Delete a credential and its profile together. Returns whether it was active.
    pub fn remove(&mut self, access_token: &str) -> Result<bool, CacheError> {
        if !self.contains(access_token) {
            return Err(CacheError::unknown_account(access_token));
        }
        Ok(self.delete(access_token))
    }

    fn delete(&mut self, access_token: &str) -> bool {
        let mut was_active = false;
        self.credentials.retain(|c| {
            if c.access_token == access_token {
                was_active |= c.active;
                false
            } else {
                true
            }
        });
        self.profiles.remove(access_token);
        was_active
    }

    /// Describe the first broken invariant, if any.
    pub fn invariant_violation(&self) -> Option<String> {
        let active = self.credentials.iter().filter(|c| c.active).count();
        if active > 1 {
            return Some(format!("{active} active credentials"));
        }
        let tokens: HashSet<&str> =
            self.credentials.iter().map(|c| c.access_token.as_str()).collect();
        if tokens.len() != self.credentials.len() {
            return Some("duplicate access tokens".to_owned());
        }
        let keys: HashSet<&str> = self.profiles.keys().map(String::as_str).collect();
        if tokens != keys {
            return Some("profile keys differ from credential tokens".to_owned());
        }
        None
    }
}

#[cfg(test)]
#[path = "book_tests.rs"]
mod tests;
