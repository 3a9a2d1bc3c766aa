// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use crate::error::ErrorKind;

#[tokio::test]
async fn missing_file_opens_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::open(dir.path().join("store.json")).await?;
    assert_eq!(store.get("token").await?, None);
    assert!(!store.path().exists());
    Ok(())
}

#[tokio::test]
async fn save_then_reopen_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested/state/store.json");

    let store = JsonFileStore::open(&path).await?;
    store.set("token", json!([{ "access_token": "a", "refresh_token": "r", "active": true }])).await?;
    store.set("session", json!({})).await?;
    store.save().await?;

    let reopened = JsonFileStore::open(&path).await?;
    assert_eq!(reopened.get("session").await?, Some(json!({})));
    assert_eq!(reopened.get("token").await?.and_then(|v| v[0]["active"].as_bool()), Some(true));
    Ok(())
}

#[tokio::test]
async fn unsaved_values_are_not_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.json");

    let store = JsonFileStore::open(&path).await?;
    store.set("token", json!([])).await?;
    assert_eq!(store.get("token").await?, Some(json!([])));

    let other = JsonFileStore::open(&path).await?;
    assert_eq!(other.get("token").await?, None);
    Ok(())
}

#[tokio::test]
async fn save_leaves_no_temp_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::open(dir.path().join("store.json")).await?;
    for i in 0..5 {
        store.set("token", json!([i])).await?;
        store.save().await?;
    }
    let names: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["store.json".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn bad_contents_are_unavailable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for (i, contents) in ["{not json", "[1, 2]", "\"hello\""].iter().enumerate() {
        let path = dir.path().join(format!("store-{i}.json"));
        std::fs::write(&path, contents)?;

        let err = JsonFileStore::open(&path).await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::StorageUnavailable), "contents: {contents}");
    }
    Ok(())
}

#[tokio::test]
async fn empty_file_opens_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.json");
    std::fs::write(&path, "  \n")?;
    let store = JsonFileStore::open(&path).await?;
    assert_eq!(store.get("session").await?, None);
    Ok(())
}

#[tokio::test]
async fn directory_path_is_unavailable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let err = JsonFileStore::open(dir.path()).await.err().map(|e| e.kind());
    assert_eq!(err, Some(ErrorKind::StorageUnavailable));
    Ok(())
}
