// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Seal lifecycle integration tests: initialization, share submission,
//! duplicate rejection, wrong-KEK detection, and the sealed gate on the
//! crypto path.

mod common;

use common::{admin_caller, initialize, test_vault, vault_over, other_kek_b64};
use strongroom_domain::VaultError;

#[tokio::test]
async fn initialize_seal_unseal_round_trip() {
    let harness = test_vault().await;
    let vault = &harness.vault;

    let (shares, root_token) = initialize(vault, 5, 3).await;
    assert_eq!(shares.len(), 5);
    assert!(root_token.starts_with("s."));

    let status = vault.seal.status().await.unwrap();
    assert!(status.initialized);
    assert!(!status.sealed);
    assert_eq!(status.threshold, 3);
    assert_eq!(status.share_count, 5);

    // Seal, then unseal with shares 1 and 2: still sealed, progress 2.
    vault.seal_all().await;
    let status = vault.seal.submit_unseal_share(&shares[0]).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 1);
    let status = vault.seal.submit_unseal_share(&shares[1]).await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 2);

    // Third share crosses the threshold.
    let status = vault.seal.submit_unseal_share(&shares[2]).await.unwrap();
    assert!(!status.sealed);
    assert_eq!(status.progress, 0);

    // A different three-share subset also works after a fresh seal.
    vault.seal_all().await;
    for share in [&shares[0], &shares[2], &shares[4]] {
        vault.seal.submit_unseal_share(share).await.unwrap();
    }
    assert!(!vault.seal.status().await.unwrap().sealed);
}

#[tokio::test]
async fn duplicate_share_is_rejected() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    let (shares, _) = initialize(vault, 5, 3).await;

    vault.seal_all().await;
    vault.seal.submit_unseal_share(&shares[0]).await.unwrap();
    let err = vault.seal.submit_unseal_share(&shares[0]).await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidShare(_)));

    // Progress unchanged by the rejected duplicate.
    let status = vault.seal.status().await.unwrap();
    assert_eq!(status.progress, 1);
}

#[tokio::test]
async fn malformed_shares_are_rejected() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    vault.seal_all().await;

    // Wrong length (32 bytes instead of 33).
    use base64::engine::general_purpose;
    use base64::Engine as _;
    let short = general_purpose::STANDARD.encode([1u8; 32]);
    assert!(matches!(
        vault.seal.submit_unseal_share(&short).await.unwrap_err(),
        VaultError::InvalidShare(_)
    ));

    // Zero x-coordinate.
    let zero_x = general_purpose::STANDARD.encode([0u8; 33]);
    assert!(matches!(
        vault.seal.submit_unseal_share(&zero_x).await.unwrap_err(),
        VaultError::InvalidShare(_)
    ));

    // Not base64 at all.
    assert!(matches!(
        vault.seal.submit_unseal_share("@@@").await.unwrap_err(),
        VaultError::InvalidShare(_)
    ));
}

#[tokio::test]
async fn initialize_twice_fails() {
    let harness = test_vault().await;
    initialize(&harness.vault, 3, 2).await;
    assert_eq!(
        harness.vault.seal.initialize(3, 2).await.unwrap_err(),
        VaultError::AlreadyInitialized
    );
}

#[tokio::test]
async fn initialize_rejects_degenerate_splits() {
    let harness = test_vault().await;
    let seal = &harness.vault.seal;
    assert!(matches!(seal.initialize(0, 0).await, Err(VaultError::InvalidArgument(_))));
    assert!(matches!(seal.initialize(5, 0).await, Err(VaultError::InvalidArgument(_))));
    assert!(matches!(seal.initialize(3, 5).await, Err(VaultError::InvalidArgument(_))));
}

#[tokio::test]
async fn unseal_before_initialize_fails() {
    let harness = test_vault().await;
    use base64::engine::general_purpose;
    use base64::Engine as _;
    let mut raw = [1u8; 33];
    raw[0] = 1;
    let share = general_purpose::STANDARD.encode(raw);
    assert_eq!(
        harness.vault.seal.submit_unseal_share(&share).await.unwrap_err(),
        VaultError::NotInitialized
    );
}

#[tokio::test]
async fn wrong_kek_fails_verification() {
    // Initialize under KEK₁…
    let harness = test_vault().await;
    let (shares, _) = initialize(&harness.vault, 5, 3).await;

    // …then bring the same store up under KEK₂ (same length, different
    // bytes) and submit three valid shares. The Shamir reconstruction
    // succeeds; the KEK-wrapped verification fails.
    let restarted = vault_over(harness.pool.clone(), &other_kek_b64()).await;
    restarted.vault.seal.submit_unseal_share(&shares[0]).await.unwrap();
    restarted.vault.seal.submit_unseal_share(&shares[1]).await.unwrap();
    let err = restarted
        .vault
        .seal
        .submit_unseal_share(&shares[2])
        .await
        .unwrap_err();
    assert_eq!(err, VaultError::VerificationFailed);

    // The accumulator reset and the failure counter advanced.
    let status = restarted.vault.seal.status().await.unwrap();
    assert!(status.sealed);
    assert_eq!(status.progress, 0);
    assert_eq!(status.failed_unseal_attempts, 1);
}

#[tokio::test]
async fn root_token_verifies_against_stored_hash() {
    let harness = test_vault().await;
    let (_, root_token) = initialize(&harness.vault, 3, 2).await;

    assert!(harness.vault.seal.verify_root_token(&root_token).await.unwrap());
    assert!(!harness.vault.seal.verify_root_token("s.forged").await.unwrap());
}

#[tokio::test]
async fn sealed_vault_blocks_crypto_operations() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    vault.seal_all().await;

    let caller = admin_caller();
    let mut data = serde_json::Map::new();
    data.insert("k".into(), serde_json::json!("v"));
    assert_eq!(
        vault.kv.write(&caller, "app/db", &data, None).await.unwrap_err(),
        VaultError::Sealed
    );
}
