// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the login backend and the identity provider API.

use std::time::Duration;

use reqwest::StatusCode;

/// Per-request timeout for backend calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    backend_url: String,
    identity_api: String,
}

impl BackendClient {
    pub fn new(backend_url: &str, identity_api: &str) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            backend_url: backend_url.trim_end_matches('/').to_owned(),
            identity_api: identity_api.trim_end_matches('/').to_owned(),
        })
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Ask the backend to start an external login. Returns the URL the user
    /// must open; the session itself arrives later on the push channel.
    pub async fn begin_external_login(&self) -> anyhow::Result<String> {
        let url = format!("{}/login-url", self.backend_url);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("login-url request failed ({status}): {}", text.trim());
        }
        let login_url = text.trim();
        if login_url.is_empty() {
            anyhow::bail!("backend returned an empty login URL");
        }
        Ok(login_url.to_owned())
    }

    /// Whether the identity provider still accepts `access_token`.
    pub async fn check_token_valid(&self, access_token: &str) -> anyhow::Result<bool> {
        let url = format!("{}/users/@me", self.identity_api);
        let resp = self.http.get(&url).bearer_auth(access_token).send().await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => {
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("token check failed ({status}): {}", text.trim())
            }
        }
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
