// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! KV engine integration tests: version lifecycle, CAS, retention,
//! listing, and metadata.

mod common;

use common::{admin_caller, caller_with_roles, initialize, test_vault};
use strongroom::application::services::MetadataUpdate;
use strongroom::application::services::SecretData;
use strongroom_domain::VaultError;

fn data(key: &str, value: &str) -> SecretData {
    let mut map = SecretData::new();
    map.insert(key.into(), serde_json::json!(value));
    map
}

#[tokio::test]
async fn version_lifecycle() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    // Two writes advance the version.
    assert_eq!(
        vault.kv.write(&caller, "a/b", &data("k", "v1"), None).await.unwrap(),
        1
    );
    assert_eq!(
        vault.kv.write(&caller, "a/b", &data("k", "v2"), None).await.unwrap(),
        2
    );

    // CAS expecting the stale version conflicts.
    assert!(matches!(
        vault.kv.write(&caller, "a/b", &data("k", "v3"), Some(1)).await,
        Err(VaultError::Conflict(_))
    ));

    // Current read sees v2; pinned read sees v1.
    let (current, version) = vault.kv.read(&caller, "a/b", None).await.unwrap();
    assert_eq!(version, 2);
    assert_eq!(current["k"], "v2");
    let (old, _) = vault.kv.read(&caller, "a/b", Some(1)).await.unwrap();
    assert_eq!(old["k"], "v1");

    // Soft delete hides v1 until undeleted.
    vault.kv.soft_delete(&caller, "a/b", &[1]).await.unwrap();
    assert!(matches!(
        vault.kv.read(&caller, "a/b", Some(1)).await,
        Err(VaultError::NotFound(_))
    ));
    vault.kv.undelete(&caller, "a/b", &[1]).await.unwrap();
    let (restored, _) = vault.kv.read(&caller, "a/b", Some(1)).await.unwrap();
    assert_eq!(restored["k"], "v1");

    // Destroy is terminal: unreadable and not undeletable.
    vault.kv.destroy(&caller, "a/b", &[1]).await.unwrap();
    assert!(matches!(
        vault.kv.read(&caller, "a/b", Some(1)).await,
        Err(VaultError::NotFound(_))
    ));
    vault.kv.undelete(&caller, "a/b", &[1]).await.unwrap();
    assert!(matches!(
        vault.kv.read(&caller, "a/b", Some(1)).await,
        Err(VaultError::NotFound(_))
    ));

    // Lifecycle transitions are idempotent.
    vault.kv.destroy(&caller, "a/b", &[1]).await.unwrap();
    vault.kv.soft_delete(&caller, "a/b", &[1]).await.unwrap();
}

#[tokio::test]
async fn out_of_range_versions_are_not_found() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "a/b", &data("k", "v1"), None).await.unwrap();
    assert!(matches!(
        vault.kv.read(&caller, "a/b", Some(0)).await,
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        vault.kv.read(&caller, "a/b", Some(9)).await,
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        vault.kv.read(&caller, "missing/path", None).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn cas_required_flag_forces_expectations() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "locked", &data("k", "v1"), None).await.unwrap();
    vault
        .kv
        .update_metadata(
            &caller,
            "locked",
            MetadataUpdate {
                cas_required: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Writes without an expectation now conflict.
    assert!(matches!(
        vault.kv.write(&caller, "locked", &data("k", "v2"), None).await,
        Err(VaultError::Conflict(_))
    ));
    // With the right expectation they pass.
    assert_eq!(
        vault.kv.write(&caller, "locked", &data("k", "v2"), Some(1)).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn max_versions_cap_destroys_oldest() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "capped", &data("k", "v1"), None).await.unwrap();
    vault
        .kv
        .update_metadata(
            &caller,
            "capped",
            MetadataUpdate {
                max_versions: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    vault.kv.write(&caller, "capped", &data("k", "v2"), None).await.unwrap();
    vault.kv.write(&caller, "capped", &data("k", "v3"), None).await.unwrap();

    // Version 1 fell off the retention window.
    assert!(matches!(
        vault.kv.read(&caller, "capped", Some(1)).await,
        Err(VaultError::NotFound(_))
    ));
    let metadata = vault.kv.read_metadata(&caller, "capped").await.unwrap();
    assert_eq!(metadata.oldest_version, 2);
    assert_eq!(metadata.current_version, 3);

    // Versions 2 and 3 remain readable.
    assert!(vault.kv.read(&caller, "capped", Some(2)).await.is_ok());
    assert!(vault.kv.read(&caller, "capped", Some(3)).await.is_ok());
}

#[tokio::test]
async fn delete_metadata_is_terminal() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "gone", &data("k", "v"), None).await.unwrap();
    vault.kv.delete_metadata(&caller, "gone").await.unwrap();
    assert!(matches!(
        vault.kv.read(&caller, "gone", None).await,
        Err(VaultError::NotFound(_))
    ));
    // A fresh write starts over at version 1.
    assert_eq!(
        vault.kv.write(&caller, "gone", &data("k", "v"), None).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn list_returns_directory_style_entries() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    for path in ["app/db/creds", "app/db/url", "app/cache/token", "other/x"] {
        vault.kv.write(&caller, path, &data("k", "v"), None).await.unwrap();
    }

    let entries = vault.kv.list(&caller, "app").await.unwrap();
    assert_eq!(entries, vec!["cache/".to_string(), "db/".to_string()]);

    let entries = vault.kv.list(&caller, "app/db").await.unwrap();
    assert_eq!(entries, vec!["creds".to_string(), "url".to_string()]);

    let entries = vault.kv.list(&caller, "").await.unwrap();
    assert_eq!(entries, vec!["app/".to_string(), "other/".to_string()]);

    assert!(vault.kv.list(&caller, "nothing/here").await.unwrap().is_empty());
}

#[tokio::test]
async fn paths_are_normalized_and_validated() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "/trimmed/path/", &data("k", "v"), None).await.unwrap();
    assert!(vault.kv.read(&caller, "trimmed/path", None).await.is_ok());

    assert!(matches!(
        vault.kv.write(&caller, "", &data("k", "v"), None).await,
        Err(VaultError::InvalidArgument(_))
    ));
    assert!(matches!(
        vault.kv.write(&caller, "a//b", &data("k", "v"), None).await,
        Err(VaultError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn unauthorized_read_hides_existence() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "hidden", &data("k", "v"), None).await.unwrap();

    // A caller with no grants gets Unauthorized for both the existing and
    // the missing path — existence is not leaked.
    let nobody = caller_with_roles("nobody", &[]);
    assert_eq!(
        vault.kv.read(&nobody, "hidden", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
    assert_eq!(
        vault.kv.read(&nobody, "does/not/exist", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}
