// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push events delivered by the backend.
//!
//! Frames are JSON objects `{"event": <name>, "payload": <value>}`. Only
//! `session` feeds the cache; the rest are passed through for UI consumers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{decode_payload, Profile, SessionEvent};

pub const SESSION_EVENT: &str = "session";
pub const MESSAGE_EVENT: &str = "message";
pub const CONNECTED_USERS_EVENT: &str = "connected_users";
pub const OPEN_LOGIN_URL_EVENT: &str = "open_login_url";
pub const LOGIN_DISCONNECT_EVENT: &str = "login_disconnect";

/// A chat message relayed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// External id of the sender.
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// The login flow produced a fresh session.
    Session(SessionEvent),
    Message(ChatMessage),
    /// Users currently connected to the chat, keyed by external id.
    ConnectedUsers(HashMap<String, Profile>),
    /// The backend wants the user to open this URL to log in.
    OpenLoginUrl(String),
    /// The login socket closed before a session arrived.
    LoginDisconnect(String),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl PushEvent {
    /// Parse a push frame. Unknown event names yield `Ok(None)`.
    pub fn parse(text: &str) -> serde_json::Result<Option<Self>> {
        let frame: Frame = serde_json::from_str(text)?;
        Self::from_parts(&frame.event, &frame.payload)
    }

    /// Build an event from its name and payload.
    pub fn from_parts(
        event: &str,
        payload: &serde_json::Value,
    ) -> serde_json::Result<Option<Self>> {
        let parsed = match event {
            SESSION_EVENT => Self::Session(SessionEvent::from_payload(payload)?),
            MESSAGE_EVENT => Self::Message(decode_payload(payload)?),
            CONNECTED_USERS_EVENT => Self::ConnectedUsers(decode_payload(payload)?),
            OPEN_LOGIN_URL_EVENT => Self::OpenLoginUrl(text_payload(payload)),
            LOGIN_DISCONNECT_EVENT => Self::LoginDisconnect(text_payload(payload)),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Session(_) => SESSION_EVENT,
            Self::Message(_) => MESSAGE_EVENT,
            Self::ConnectedUsers(_) => CONNECTED_USERS_EVENT,
            Self::OpenLoginUrl(_) => OPEN_LOGIN_URL_EVENT,
            Self::LoginDisconnect(_) => LOGIN_DISCONNECT_EVENT,
        }
    }
}

fn text_payload(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
