// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Transit engine integration tests: versioned encryption, rotation,
//! rewrap, floors, signing, and export gating.

mod common;

use common::{admin_caller, initialize, test_vault};
use strongroom::application::services::TransitConfigUpdate;
use strongroom_domain::value_objects::TransitKeyType;
use strongroom_domain::VaultError;

#[tokio::test]
async fn rewrap_round_trip_with_rotation() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "k1", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();

    let plaintext = b"the payload";
    let e1 = vault
        .transit
        .encrypt(&caller, "k1", plaintext, None, None)
        .await
        .unwrap();
    assert!(e1.starts_with("vault:v1:"));

    // Rotation leaves the old ciphertext decryptable.
    assert_eq!(vault.transit.rotate(&caller, "k1").await.unwrap(), 2);
    let decrypted = vault.transit.decrypt(&caller, "k1", &e1, None).await.unwrap();
    assert_eq!(&*decrypted, plaintext);

    // Rewrap moves it to v2 without changing the plaintext.
    let e2 = vault.transit.rewrap(&caller, "k1", &e1, None).await.unwrap();
    assert!(e2.starts_with("vault:v2:"));
    let decrypted = vault.transit.decrypt(&caller, "k1", &e2, None).await.unwrap();
    assert_eq!(&*decrypted, plaintext);

    // Raising the decryption floor retires v1 ciphertexts.
    vault
        .transit
        .update_config(
            &caller,
            "k1",
            TransitConfigUpdate {
                min_decryption_version: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        vault.transit.decrypt(&caller, "k1", &e1, None).await,
        Err(VaultError::InvalidArgument(_))
    ));
    assert!(vault.transit.decrypt(&caller, "k1", &e2, None).await.is_ok());
}

#[tokio::test]
async fn context_binds_ciphertexts() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "ctx", TransitKeyType::ChaCha20Poly1305, false, false)
        .await
        .unwrap();

    let ct = vault
        .transit
        .encrypt(&caller, "ctx", b"data", Some(b"tenant-1"), None)
        .await
        .unwrap();
    assert_eq!(
        &*vault
            .transit
            .decrypt(&caller, "ctx", &ct, Some(b"tenant-1"))
            .await
            .unwrap(),
        b"data"
    );
    assert!(matches!(
        vault
            .transit
            .decrypt(&caller, "ctx", &ct, Some(b"tenant-2"))
            .await,
        Err(VaultError::InvalidCiphertext)
    ));
    assert!(matches!(
        vault.transit.decrypt(&caller, "ctx", &ct, None).await,
        Err(VaultError::InvalidCiphertext)
    ));
}

#[tokio::test]
async fn pinned_encryption_version_respects_floor() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "pinned", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();
    vault.transit.rotate(&caller, "pinned").await.unwrap();

    // Pinning an old version is allowed until minimum-encryption pins to
    // the current version.
    let ct = vault
        .transit
        .encrypt(&caller, "pinned", b"x", None, Some(1))
        .await
        .unwrap();
    assert!(ct.starts_with("vault:v1:"));

    vault
        .transit
        .update_config(
            &caller,
            "pinned",
            TransitConfigUpdate {
                pin_min_encryption: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        vault.transit.encrypt(&caller, "pinned", b"x", None, Some(1)).await,
        Err(VaultError::InvalidArgument(_))
    ));
    assert!(vault
        .transit
        .encrypt(&caller, "pinned", b"x", None, Some(2))
        .await
        .is_ok());
}

#[tokio::test]
async fn missing_key_and_type_mismatches() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    assert!(matches!(
        vault.transit.encrypt(&caller, "ghost", b"x", None, None).await,
        Err(VaultError::NotFound(_))
    ));

    vault
        .transit
        .create_key(&caller, "signer", TransitKeyType::Ed25519, false, false)
        .await
        .unwrap();
    assert!(matches!(
        vault.transit.encrypt(&caller, "signer", b"x", None, None).await,
        Err(VaultError::InvalidArgument(_))
    ));

    vault
        .transit
        .create_key(&caller, "cipher", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();
    assert!(matches!(
        vault.transit.sign(&caller, "cipher", b"x", None).await,
        Err(VaultError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn sign_verify_across_rotation() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "sig", TransitKeyType::Ed25519, false, false)
        .await
        .unwrap();

    let signature = vault.transit.sign(&caller, "sig", b"message", None).await.unwrap();
    assert!(signature.starts_with("vault:v1:"));
    assert!(vault
        .transit
        .verify(&caller, "sig", b"message", &signature)
        .await
        .unwrap());
    assert!(!vault
        .transit
        .verify(&caller, "sig", b"tampered", &signature)
        .await
        .unwrap());

    // Old signatures still verify against their recorded version.
    vault.transit.rotate(&caller, "sig").await.unwrap();
    assert!(vault
        .transit
        .verify(&caller, "sig", b"message", &signature)
        .await
        .unwrap());
    let s2 = vault.transit.sign(&caller, "sig", b"message", None).await.unwrap();
    assert!(s2.starts_with("vault:v2:"));

    // Malformed signatures verify false, not error.
    assert!(!vault
        .transit
        .verify(&caller, "sig", b"message", "vault:v1:!!!")
        .await
        .unwrap());
    assert!(!vault
        .transit
        .verify(&caller, "sig", b"message", "garbage")
        .await
        .unwrap());
}

#[tokio::test]
async fn ecdsa_sign_verify() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    for (name, key_type) in [
        ("p256", TransitKeyType::EcdsaP256),
        ("p384", TransitKeyType::EcdsaP384),
    ] {
        vault
            .transit
            .create_key(&caller, name, key_type, false, false)
            .await
            .unwrap();
        let sig = vault.transit.sign(&caller, name, b"payload", None).await.unwrap();
        assert!(vault.transit.verify(&caller, name, b"payload", &sig).await.unwrap());
        assert!(!vault.transit.verify(&caller, name, b"other", &sig).await.unwrap());
    }
}

#[tokio::test]
async fn export_is_gated_on_exportable() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "private", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();
    assert!(matches!(
        vault.transit.export(&caller, "private", None).await,
        Err(VaultError::Unsupported(_))
    ));

    vault
        .transit
        .create_key(&caller, "portable", TransitKeyType::Aes256Gcm, true, false)
        .await
        .unwrap();
    vault.transit.rotate(&caller, "portable").await.unwrap();
    let exported = vault.transit.export(&caller, "portable", None).await.unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0].0, 1);
    assert_eq!(exported[1].0, 2);

    // Backup additionally requires allow_plaintext_backup.
    assert!(matches!(
        vault.transit.backup(&caller, "portable").await,
        Err(VaultError::Unsupported(_))
    ));
}

#[tokio::test]
async fn backup_restore_round_trip() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "backed", TransitKeyType::Aes256Gcm, true, true)
        .await
        .unwrap();
    let ciphertext = vault
        .transit
        .encrypt(&caller, "backed", b"survives", None, None)
        .await
        .unwrap();
    let bundle = vault.transit.backup(&caller, "backed").await.unwrap();

    // Restore under the same name conflicts…
    assert!(matches!(
        vault.transit.restore(&caller, &bundle).await,
        Err(VaultError::Conflict(_))
    ));

    // …but after deleting the original, the restored key decrypts the old
    // ciphertext.
    vault
        .transit
        .update_config(
            &caller,
            "backed",
            TransitConfigUpdate {
                deletion_protected: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    vault.transit.delete_key(&caller, "backed").await.unwrap();
    vault.transit.restore(&caller, &bundle).await.unwrap();
    let decrypted = vault
        .transit
        .decrypt(&caller, "backed", &ciphertext, None)
        .await
        .unwrap();
    assert_eq!(&*decrypted, b"survives");
}

#[tokio::test]
async fn deletion_protection() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "precious", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();
    // Protected by default.
    assert!(matches!(
        vault.transit.delete_key(&caller, "precious").await,
        Err(VaultError::Unsupported(_))
    ));

    vault
        .transit
        .update_config(
            &caller,
            "precious",
            TransitConfigUpdate {
                deletion_protected: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    vault.transit.delete_key(&caller, "precious").await.unwrap();
    assert!(matches!(
        vault.transit.encrypt(&caller, "precious", b"x", None, None).await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_key_name_conflicts() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .transit
        .create_key(&caller, "dup", TransitKeyType::Aes256Gcm, false, false)
        .await
        .unwrap();
    assert!(matches!(
        vault
            .transit
            .create_key(&caller, "dup", TransitKeyType::Ed25519, false, false)
            .await,
        Err(VaultError::Conflict(_))
    ));
}
