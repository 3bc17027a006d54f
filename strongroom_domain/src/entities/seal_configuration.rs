// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Seal Configuration Entity
//!
//! The singleton row describing the initialized seal: share count N,
//! threshold T, the KEK-wrapped master-key ciphertext, the verification-token
//! hash used to detect a wrong KEK during unseal, and the salted hash of the
//! root token. Plaintext shares and the plaintext root token are returned to
//! the caller exactly once at initialization and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::VaultError;

/// KDF parameters recorded alongside the root-token hash so the hash stays
/// verifiable across parameter upgrades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // argon2id defaults of the argon2 crate (19 MiB, t=2, p=1)
        Self {
            algorithm: "argon2id".into(),
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// The persisted seal configuration (single row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealConfiguration {
    pub initialized: bool,
    pub share_count: u8,
    pub threshold: u8,
    /// Base64 AEAD envelope of (master key ∥ verification token) under the KEK.
    pub encrypted_master: String,
    pub kdf_params: KdfParams,
    /// Hex SHA-256 of the verification-token plaintext.
    pub verification_token_hash: String,
    /// Argon2 PHC string for the root token.
    pub root_token_hash: String,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl SealConfiguration {
    /// Validates the split parameters: 1 ≤ T ≤ N ≤ 255. The upper bound is
    /// enforced by `u8`; zero is the remaining degenerate case.
    pub fn validate_split(share_count: u8, threshold: u8) -> Result<(), VaultError> {
        if share_count == 0 {
            return Err(VaultError::InvalidArgument(
                "share count must be at least 1".into(),
            ));
        }
        if threshold == 0 {
            return Err(VaultError::InvalidArgument(
                "threshold must be at least 1".into(),
            ));
        }
        if threshold > share_count {
            return Err(VaultError::InvalidArgument(format!(
                "threshold {} exceeds share count {}",
                threshold, share_count
            )));
        }
        Ok(())
    }

    /// Entity-level invariant check applied after load and before store.
    pub fn validate(&self) -> Result<(), VaultError> {
        Self::validate_split(self.share_count, self.threshold)?;
        if self.initialized && self.encrypted_master.is_empty() {
            return Err(VaultError::Internal(
                "initialized seal configuration has empty master ciphertext".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SealConfiguration {
        SealConfiguration {
            initialized: true,
            share_count: 5,
            threshold: 3,
            encrypted_master: "AQID".into(),
            kdf_params: KdfParams::default(),
            verification_token_hash: "ab".repeat(32),
            root_token_hash: "$argon2id$...".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn split_bounds() {
        assert!(SealConfiguration::validate_split(5, 3).is_ok());
        assert!(SealConfiguration::validate_split(1, 1).is_ok());
        assert!(SealConfiguration::validate_split(255, 255).is_ok());
        assert!(SealConfiguration::validate_split(0, 1).is_err());
        assert!(SealConfiguration::validate_split(5, 0).is_err());
        assert!(SealConfiguration::validate_split(3, 5).is_err());
    }

    #[test]
    fn initialized_requires_ciphertext() {
        let mut c = config();
        assert!(c.validate().is_ok());
        c.encrypted_master.clear();
        assert!(c.validate().is_err());
    }
}
