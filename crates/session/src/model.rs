// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account, profile, and session-event types shared by the cache and its consumers.
//!
//! Field names follow the backend's wire format so persisted values and push
//! payloads decode without translation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default CDN that serves identity-provider avatars.
pub const DEFAULT_AVATAR_CDN: &str = "https://cdn.discordapp.com";

/// A stored token pair. The access token identifies the credential within the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub active: bool,
}

/// Identity-provider user profile.
///
/// Unknown provider fields are carried through `extra` so a persist/load cycle
/// does not drop them. A legacy `avatar_url` field is discarded on load; the
/// URL is derived from `id` and `avatar` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable identity-provider user id.
    #[serde(rename = "id")]
    pub external_id: String,
    pub username: String,
    #[serde(default, alias = "globalName", skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    /// Avatar hash as returned by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    pub fn new(external_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            username: username.into(),
            global_name: None,
            discriminator: None,
            avatar: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    /// Name shown in the UI: the global name when set, else the username.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.username)
    }

    /// Drop the legacy denormalized avatar URL, if a stored value carried one.
    pub(crate) fn strip_derived(&mut self) {
        self.extra.remove("avatar_url");
    }
}

/// Builds avatar URLs from a profile's id and avatar hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarScheme {
    cdn_base: String,
}

impl AvatarScheme {
    pub fn new(cdn_base: impl Into<String>) -> Self {
        let cdn_base: String = cdn_base.into();
        Self { cdn_base: cdn_base.trim_end_matches('/').to_owned() }
    }

    /// Avatar URL for `profile`, or `None` when the profile has no avatar.
    pub fn url_for(&self, profile: &Profile) -> Option<String> {
        let avatar = profile.avatar.as_deref().filter(|a| !a.is_empty())?;
        Some(format!("{}/avatars/{}/{}", self.cdn_base, profile.external_id, avatar))
    }
}

impl Default for AvatarScheme {
    fn default() -> Self {
        Self::new(DEFAULT_AVATAR_CDN)
    }
}

/// A fresh token pair and profile delivered by the login flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "session")]
    pub profile: Profile,
}

impl SessionEvent {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        profile: Profile,
    ) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into(), profile }
    }

    /// Decode a session payload.
    ///
    /// The backend sends the payload as a JSON-encoded string; an inline
    /// object is accepted as well.
    pub fn from_payload(payload: &serde_json::Value) -> serde_json::Result<Self> {
        decode_payload(payload)
    }
}

/// Decode an event payload that may arrive JSON-encoded inside a string.
pub(crate) fn decode_payload<T: DeserializeOwned>(
    payload: &serde_json::Value,
) -> serde_json::Result<T> {
    match payload {
        serde_json::Value::String(s) => serde_json::from_str(s),
        other => T::deserialize(other),
    }
}

/// Read-only view of one cached account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    pub access_token: String,
    pub refresh_token: String,
    pub active: bool,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl AccountView {
    pub fn display_name(&self) -> &str {
        self.profile.display_name()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
