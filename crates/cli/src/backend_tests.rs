// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::FakeBackend;

async fn client(fake: &FakeBackend) -> anyhow::Result<BackendClient> {
    BackendClient::new(&format!("{}/", fake.url()), &fake.url())
}

#[tokio::test]
async fn begin_external_login_returns_url() -> anyhow::Result<()> {
    let fake = FakeBackend::start().await?;
    let client = client(&fake).await?;
    assert_eq!(client.backend_url(), fake.url());
    assert_eq!(client.begin_external_login().await?, "https://login.example/authorize");
    Ok(())
}

#[tokio::test]
async fn begin_external_login_reports_backend_error() -> anyhow::Result<()> {
    let fake = FakeBackend::start().await?;
    fake.fail_login_url();
    let client = client(&fake).await?;
    crate::assert_err_contains!(client.begin_external_login().await, "503");
    Ok(())
}

#[tokio::test]
async fn check_token_distinguishes_valid_and_revoked() -> anyhow::Result<()> {
    let fake = FakeBackend::start().await?;
    fake.accept_token("good");
    let client = client(&fake).await?;
    assert!(client.check_token_valid("good").await?);
    assert!(!client.check_token_valid("revoked").await?);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_an_error() -> anyhow::Result<()> {
    let client = BackendClient::new("http://127.0.0.1:9", "http://127.0.0.1:9")?;
    assert!(client.check_token_valid("t").await.is_err());
    Ok(())
}
