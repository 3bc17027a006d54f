// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Seal / Unseal Controller
//!
//! Owns the sealed/unsealed state and the only in-memory copy of the master
//! key. Everything cryptographic in the system is gated on this service:
//! the encryption service fetches the master key here on every call and
//! fails with `Sealed` when the cell is empty.
//!
//! ## Initialization
//!
//! `initialize(N, T)` generates the 32-byte master key and a 32-byte
//! verification token, splits the master key into N Shamir shares with
//! threshold T, wraps (master ∥ token) under the environment-sourced KEK,
//! and stores only the ciphertext, the token's hash, and the salted hash of
//! the freshly minted root token. The shares and the root token are
//! returned exactly once and never persisted in plaintext.
//!
//! ## Unseal
//!
//! One share per call, deduplicated by exact bytes. At threshold the
//! controller interpolates the master key, opens the KEK-wrapped
//! ciphertext, and checks the verification token's hash *and* that the
//! reconstructed key equals the stored one (constant-time). Any failure —
//! wrong KEK, corrupted ciphertext, wrong shares — resets the accumulator,
//! bumps the failure counter, and reports the same `VerificationFailed`.
//!
//! ## Locking
//!
//! Two locks with distinct jobs: an async mutex serializes unseal
//! submissions and seal/unseal transitions (no submission ever observes a
//! half-mutated accumulator), and a sync `RwLock` holds the key cell so
//! [`MasterKeyProvider::master_key`] stays synchronous for the crypto path.

use parking_lot::RwLock;
use rand::thread_rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose;
use base64::Engine as _;

use strongroom_domain::entities::{KdfParams, SealConfiguration};
use strongroom_domain::repositories::SealRepository;
use strongroom_domain::services::key_material::KEY_LEN;
use strongroom_domain::services::{shamir, KekProvider, MasterKey, MasterKeyProvider};
use strongroom_domain::value_objects::{CiphertextEnvelope, UnsealShare};
use strongroom_domain::VaultError;

use crate::infrastructure::adapters::encryption::{open_aes256_gcm, random_bytes, seal_aes256_gcm};

/// Returned by `initialize` exactly once.
#[derive(Debug)]
pub struct InitializeResult {
    /// Base64-encoded Shamir shares, one per custodian.
    pub shares: Vec<String>,
    /// The bearer root token; only its salted hash is stored.
    pub root_token: String,
}

/// Operator-facing seal state. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealStatus {
    pub initialized: bool,
    pub sealed: bool,
    pub progress: u8,
    pub threshold: u8,
    pub share_count: u8,
    pub failed_unseal_attempts: u64,
}

#[derive(Default)]
struct UnsealProgress {
    shares: Vec<UnsealShare>,
    failed_attempts: u64,
}

/// The seal controller.
pub struct SealService {
    repo: Arc<dyn SealRepository>,
    kek: Arc<dyn KekProvider>,
    key_cell: RwLock<Option<MasterKey>>,
    progress: Mutex<UnsealProgress>,
}

impl SealService {
    pub fn new(repo: Arc<dyn SealRepository>, kek: Arc<dyn KekProvider>) -> Self {
        Self {
            repo,
            kek,
            key_cell: RwLock::new(None),
            progress: Mutex::new(UnsealProgress::default()),
        }
    }

    /// Performs split-secret initialization. Fails with
    /// `AlreadyInitialized` on a second call.
    pub async fn initialize(
        &self,
        share_count: u8,
        threshold: u8,
    ) -> Result<InitializeResult, VaultError> {
        SealConfiguration::validate_split(share_count, threshold)?;
        let mut progress = self.progress.lock().await;

        if self.repo.load().await?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }

        let master_bytes = random_bytes(KEY_LEN)?;
        let verification_token = random_bytes(KEY_LEN)?;

        let mut master_array = Zeroizing::new([0u8; KEY_LEN]);
        master_array.copy_from_slice(&master_bytes);
        let shares = shamir::split(&master_array, share_count, threshold, &mut thread_rng())?;

        // Wrap (master ∥ token) under the KEK.
        let mut blob = Zeroizing::new(Vec::with_capacity(KEY_LEN * 2));
        blob.extend_from_slice(&master_bytes);
        blob.extend_from_slice(&verification_token);
        let kek = self.kek.kek()?;
        let envelope = seal_aes256_gcm(kek.as_bytes(), &blob, None)?;

        let verification_token_hash = hex::encode(Sha256::digest(&*verification_token));

        // Root token: 24 random bytes, URL-safe, prefixed for greppability.
        let token_bytes = random_bytes(24)?;
        let root_token = format!(
            "s.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(&*token_bytes)
        );
        let root_token_hash = hash_root_token(&root_token)?;

        let now = chrono::Utc::now();
        let config = SealConfiguration {
            initialized: true,
            share_count,
            threshold,
            encrypted_master: envelope.to_base64(),
            kdf_params: KdfParams::default(),
            verification_token_hash,
            root_token_hash,
            created_at: now,
            updated_at: now,
        };
        self.repo.initialize(&config).await?;

        // The operator holding N fresh shares is by definition present;
        // come up unsealed.
        *self.key_cell.write() = Some(MasterKey::from_bytes(*master_array));
        progress.shares.clear();

        info!(share_count, threshold, "vault initialized");
        Ok(InitializeResult {
            shares: shares.iter().map(UnsealShare::to_base64).collect(),
            root_token,
        })
    }

    /// Zeroizes the in-memory master key and any partial unseal progress.
    pub async fn seal(&self) {
        let mut progress = self.progress.lock().await;
        progress.shares.clear();
        // Dropping the MasterKey zeroizes it.
        *self.key_cell.write() = None;
        info!("vault sealed");
    }

    /// Accepts one base64 share; returns progress or completes the unseal.
    pub async fn submit_unseal_share(&self, share: &str) -> Result<SealStatus, VaultError> {
        let mut progress = self.progress.lock().await;

        let config = self
            .repo
            .load()
            .await?
            .ok_or(VaultError::NotInitialized)?;

        if self.key_cell.read().is_some() {
            // Already unsealed; nothing to accumulate.
            return Ok(self.status_locked(&progress, Some(&config)));
        }

        let share = UnsealShare::from_base64(share)?;
        if progress.shares.iter().any(|existing| existing == &share) {
            return Err(VaultError::InvalidShare("duplicate share".into()));
        }
        progress.shares.push(share);

        if progress.shares.len() < config.threshold as usize {
            return Ok(self.status_locked(&progress, Some(&config)));
        }

        // Threshold reached: reconstruct and verify.
        let outcome = self.try_unseal(&progress.shares, &config);
        match outcome {
            Ok(master) => {
                *self.key_cell.write() = Some(master);
                progress.shares.clear();
                info!("vault unsealed");
                Ok(self.status_locked(&progress, Some(&config)))
            }
            Err(e) => {
                progress.shares.clear();
                progress.failed_attempts += 1;
                warn!(failed_attempts = progress.failed_attempts, "unseal verification failed");
                Err(e)
            }
        }
    }

    fn try_unseal(
        &self,
        shares: &[UnsealShare],
        config: &SealConfiguration,
    ) -> Result<MasterKey, VaultError> {
        let reconstructed = shamir::combine(shares)?;

        let envelope = CiphertextEnvelope::from_base64(&config.encrypted_master)
            .map_err(|_| VaultError::VerificationFailed)?;
        let kek = self.kek.kek()?;
        // Wrong KEK and corruption are indistinguishable by design.
        let blob =
            open_aes256_gcm(kek.as_bytes(), &envelope, None).map_err(|_| VaultError::VerificationFailed)?;
        if blob.len() != KEY_LEN * 2 {
            return Err(VaultError::VerificationFailed);
        }
        let (stored_master, token) = blob.split_at(KEY_LEN);

        let token_hash = hex::encode(Sha256::digest(token));
        if token_hash != config.verification_token_hash {
            return Err(VaultError::VerificationFailed);
        }
        if ring::constant_time::verify_slices_are_equal(stored_master, &*reconstructed).is_err() {
            return Err(VaultError::VerificationFailed);
        }

        MasterKey::from_slice(stored_master)
    }

    /// Current seal state for operators.
    pub async fn status(&self) -> Result<SealStatus, VaultError> {
        let progress = self.progress.lock().await;
        let config = self.repo.load().await?;
        Ok(self.status_locked(&progress, config.as_ref()))
    }

    fn status_locked(
        &self,
        progress: &UnsealProgress,
        config: Option<&SealConfiguration>,
    ) -> SealStatus {
        SealStatus {
            initialized: config.is_some(),
            sealed: self.key_cell.read().is_none(),
            progress: progress.shares.len() as u8,
            threshold: config.map(|c| c.threshold).unwrap_or(0),
            share_count: config.map(|c| c.share_count).unwrap_or(0),
            failed_unseal_attempts: progress.failed_attempts,
        }
    }

    /// Verifies a presented root token against the stored salted hash.
    pub async fn verify_root_token(&self, token: &str) -> Result<bool, VaultError> {
        let config = self
            .repo
            .load()
            .await?
            .ok_or(VaultError::NotInitialized)?;
        let parsed = PasswordHash::new(&config.root_token_hash)
            .map_err(|e| VaultError::Internal(format!("stored root token hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(token.as_bytes(), &parsed)
            .is_ok())
    }
}

impl MasterKeyProvider for SealService {
    fn master_key(&self) -> Result<MasterKey, VaultError> {
        self.key_cell.read().clone().ok_or(VaultError::Sealed)
    }

    fn is_sealed(&self) -> bool {
        self.key_cell.read().is_none()
    }
}

fn hash_root_token(token: &str) -> Result<String, VaultError> {
    let salt_bytes = random_bytes(16)?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| VaultError::Internal(format!("salt encoding: {e}")))?;
    let hash = Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| VaultError::Internal(format!("root token hashing: {e}")))?;
    Ok(hash.to_string())
}
