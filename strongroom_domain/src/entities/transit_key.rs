// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transit Key Entities
//!
//! A [`TransitKey`] is a named, versioned key the transit engine manages on
//! behalf of applications that never see raw key material. Rotation appends
//! a [`TransitKeyVersion`]; old versions stay decryptable until the
//! minimum-decryption floor is raised past them. Version material is wrapped
//! under the master key by the encryption service before it ever reaches
//! storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::value_objects::{TransitKeyId, TransitKeyType, TransitKeyVersionId};
use crate::VaultError;

/// Named key managed by the transit engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitKey {
    pub id: TransitKeyId,
    pub name: String,
    pub key_type: TransitKeyType,
    pub latest_version: u32,
    /// Versions below this floor refuse decryption.
    pub min_decryption_version: u32,
    /// 0 = always encrypt with the latest version; otherwise pinned to the
    /// current version.
    pub min_encryption_version: u32,
    pub deletion_protected: bool,
    pub exportable: bool,
    pub allow_plaintext_backup: bool,
    pub auto_rotate_interval_secs: Option<u64>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::option")]
    pub last_rotated_at: Option<DateTime<Utc>>,
}

impl TransitKey {
    /// Validates a candidate key name: DNS-label-ish, no slashes, bounded.
    pub fn validate_name(name: &str) -> Result<(), VaultError> {
        if name.is_empty() || name.len() > 128 {
            return Err(VaultError::InvalidArgument(
                "transit key name must be 1-128 characters".into(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(VaultError::InvalidArgument(format!(
                "transit key name '{}' contains invalid characters",
                name
            )));
        }
        Ok(())
    }

    pub fn new(
        name: String,
        key_type: TransitKeyType,
        exportable: bool,
        allow_plaintext_backup: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, VaultError> {
        Self::validate_name(&name)?;
        if allow_plaintext_backup && !exportable {
            return Err(VaultError::InvalidArgument(
                "allow_plaintext_backup requires exportable".into(),
            ));
        }
        Ok(Self {
            id: TransitKeyId::new(),
            name,
            key_type,
            latest_version: 1,
            min_decryption_version: 1,
            min_encryption_version: 0,
            deletion_protected: true,
            exportable,
            allow_plaintext_backup,
            auto_rotate_interval_secs: None,
            created_at: now,
            updated_at: now,
            last_rotated_at: None,
        })
    }

    /// Advances the current version; returns the new version number.
    pub fn rotate(&mut self, now: DateTime<Utc>) -> u32 {
        self.latest_version += 1;
        self.last_rotated_at = Some(now);
        self.updated_at = now;
        // A pinned minimum-encryption version follows the rotation.
        if self.min_encryption_version != 0 {
            self.min_encryption_version = self.latest_version;
        }
        self.latest_version
    }

    /// Whether the auto-rotate interval has elapsed.
    pub fn rotation_due(&self, now: DateTime<Utc>) -> bool {
        match self.auto_rotate_interval_secs {
            Some(secs) if secs > 0 => {
                let anchor = self.last_rotated_at.unwrap_or(self.created_at);
                now - anchor >= Duration::seconds(secs as i64)
            }
            _ => false,
        }
    }

    /// Resolves the version an encrypt call will use. A pinned request must
    /// be at or above the minimum-encryption floor and must exist.
    pub fn encryption_version(&self, pinned: Option<u32>) -> Result<u32, VaultError> {
        match pinned {
            None => Ok(self.latest_version),
            Some(v) => {
                if v == 0 || v > self.latest_version {
                    return Err(VaultError::InvalidArgument(format!(
                        "key '{}' has no version {}",
                        self.name, v
                    )));
                }
                if self.min_encryption_version != 0 && v < self.min_encryption_version {
                    return Err(VaultError::InvalidArgument(format!(
                        "version {} is below minimum encryption version {}",
                        v, self.min_encryption_version
                    )));
                }
                Ok(v)
            }
        }
    }

    /// Whether a ciphertext produced by `version` may still be decrypted.
    pub fn can_decrypt_version(&self, version: u32) -> Result<(), VaultError> {
        if version == 0 || version > self.latest_version {
            return Err(VaultError::InvalidCiphertext);
        }
        if version < self.min_decryption_version {
            return Err(VaultError::InvalidArgument(format!(
                "version {} is below minimum decryption version {}",
                version, self.min_decryption_version
            )));
        }
        Ok(())
    }

    /// Applies a configuration update, enforcing the version invariants:
    /// `min_decryption_version ≤ latest` and
    /// `min_encryption_version ∈ {0, latest}`.
    pub fn update_config(
        &mut self,
        min_decryption_version: Option<u32>,
        pin_min_encryption: Option<bool>,
        deletion_protected: Option<bool>,
        auto_rotate_interval_secs: Option<Option<u64>>,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        if let Some(v) = min_decryption_version {
            if v == 0 || v > self.latest_version {
                return Err(VaultError::InvalidArgument(format!(
                    "minimum decryption version must be in 1..={}",
                    self.latest_version
                )));
            }
            self.min_decryption_version = v;
        }
        if let Some(pin) = pin_min_encryption {
            self.min_encryption_version = if pin { self.latest_version } else { 0 };
        }
        if let Some(p) = deletion_protected {
            self.deletion_protected = p;
        }
        if let Some(interval) = auto_rotate_interval_secs {
            if let Some(secs) = interval {
                if secs < 3600 {
                    return Err(VaultError::InvalidArgument(
                        "auto-rotate interval must be at least one hour".into(),
                    ));
                }
            }
            self.auto_rotate_interval_secs = interval;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// One generation of key material for a transit key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitKeyVersion {
    pub id: TransitKeyVersionId,
    pub key_id: TransitKeyId,
    pub version: u32,
    /// Base64 AEAD envelope of the raw material under the master key.
    pub wrapped_material: String,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::option")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TransitKeyVersion {
    pub fn new(
        key_id: TransitKeyId,
        version: u32,
        wrapped_material: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransitKeyVersionId::new(),
            key_id,
            version,
            wrapped_material,
            created_at: now,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TransitKey {
        TransitKey::new(
            "orders".into(),
            TransitKeyType::Aes256Gcm,
            false,
            false,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn name_validation() {
        assert!(TransitKey::validate_name("payments-v2").is_ok());
        assert!(TransitKey::validate_name("a.b_c").is_ok());
        assert!(TransitKey::validate_name("").is_err());
        assert!(TransitKey::validate_name("a/b").is_err());
        assert!(TransitKey::validate_name(&"x".repeat(200)).is_err());
    }

    #[test]
    fn plaintext_backup_requires_exportable() {
        let err = TransitKey::new(
            "k".into(),
            TransitKeyType::Aes256Gcm,
            false,
            true,
            Utc::now(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn rotation_advances_and_tracks_pin() {
        let mut k = key();
        assert_eq!(k.rotate(Utc::now()), 2);
        assert_eq!(k.latest_version, 2);
        assert_eq!(k.min_encryption_version, 0);

        k.update_config(None, Some(true), None, None, Utc::now()).unwrap();
        assert_eq!(k.min_encryption_version, 2);
        k.rotate(Utc::now());
        assert_eq!(k.min_encryption_version, 3, "pin follows rotation");
    }

    #[test]
    fn encryption_version_resolution() {
        let mut k = key();
        k.rotate(Utc::now());
        assert_eq!(k.encryption_version(None).unwrap(), 2);
        assert_eq!(k.encryption_version(Some(1)).unwrap(), 1);
        assert!(k.encryption_version(Some(3)).is_err());
        assert!(k.encryption_version(Some(0)).is_err());

        k.update_config(None, Some(true), None, None, Utc::now()).unwrap();
        assert!(k.encryption_version(Some(1)).is_err());
        assert_eq!(k.encryption_version(Some(2)).unwrap(), 2);
    }

    #[test]
    fn decryption_floor() {
        let mut k = key();
        k.rotate(Utc::now());
        k.rotate(Utc::now());
        k.update_config(Some(2), None, None, None, Utc::now()).unwrap();

        assert!(k.can_decrypt_version(2).is_ok());
        assert!(k.can_decrypt_version(3).is_ok());
        assert!(matches!(
            k.can_decrypt_version(1),
            Err(VaultError::InvalidArgument(_))
        ));
        assert!(matches!(
            k.can_decrypt_version(9),
            Err(VaultError::InvalidCiphertext)
        ));
    }

    #[test]
    fn floor_cannot_pass_latest() {
        let mut k = key();
        assert!(k.update_config(Some(5), None, None, None, Utc::now()).is_err());
        assert!(k.update_config(Some(0), None, None, None, Utc::now()).is_err());
    }

    #[test]
    fn auto_rotation_due() {
        let mut k = key();
        let now = Utc::now();
        assert!(!k.rotation_due(now));
        k.auto_rotate_interval_secs = Some(3600);
        assert!(!k.rotation_due(now));
        assert!(k.rotation_due(now + Duration::seconds(3601)));
    }
}
