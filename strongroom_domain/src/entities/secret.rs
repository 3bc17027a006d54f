// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secret and SecretVersion Entities
//!
//! The versioned KV aggregate. A [`Secret`] owns the path-level metadata
//! (current version, retention caps, CAS requirement); each write produces a
//! [`SecretVersion`] holding the encrypted payload. Versions move through a
//! soft-delete → undelete ↔ destroy lifecycle:
//!
//! - **Soft delete** stamps `deleted_at`; the payload is retained and the
//!   version can be undeleted.
//! - **Destroy** wipes the payload and stamps `destroyed_at`; irreversible.
//!
//! All lifecycle transitions are idempotent: re-deleting a deleted version,
//! undeleting a live one, or destroying a destroyed one are no-ops.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::datetime_serde;
use crate::value_objects::{SecretId, SecretPath, SecretVersionId};
use crate::VaultError;

/// Default cap on retained versions when none is configured.
pub const DEFAULT_MAX_VERSIONS: u32 = 10;

/// Path-level secret metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    pub id: SecretId,
    pub path: SecretPath,
    pub current_version: u32,
    /// Oldest version not yet pruned by the max-versions cap.
    pub oldest_version: u32,
    pub max_versions: u32,
    pub cas_required: bool,
    /// If set, versions older than this window read as soft-deleted.
    pub delete_version_after_secs: Option<u64>,
    pub custom_metadata: HashMap<String, String>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    /// Creates the metadata row for a path's first write.
    pub fn new(path: SecretPath, now: DateTime<Utc>) -> Self {
        Self {
            id: SecretId::new(),
            path,
            current_version: 0,
            oldest_version: 1,
            max_versions: DEFAULT_MAX_VERSIONS,
            cas_required: false,
            delete_version_after_secs: None,
            custom_metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates a caller-supplied CAS expectation against current state.
    ///
    /// When `cas_required` is set, the caller MUST supply the expected
    /// current version; version 0 means "only create".
    pub fn check_cas(&self, expected: Option<u32>) -> Result<(), VaultError> {
        match (self.cas_required, expected) {
            (true, None) => Err(VaultError::Conflict(format!(
                "check-and-set required for '{}'",
                self.path
            ))),
            (_, Some(expected)) if expected != self.current_version => {
                Err(VaultError::Conflict(format!(
                    "check-and-set failed for '{}': expected version {}, current is {}",
                    self.path, expected, self.current_version
                )))
            }
            _ => Ok(()),
        }
    }

    /// Advances to the next version number, updating retention bookkeeping.
    /// Returns the version number the new payload will carry.
    pub fn advance_version(&mut self, now: DateTime<Utc>) -> u32 {
        self.current_version += 1;
        self.updated_at = now;
        self.current_version
    }

    /// The version that falls off the retention window after a write, if the
    /// cap is exceeded. The caller destroys it and then records the new
    /// floor with [`Secret::raise_oldest`].
    pub fn version_to_prune(&self) -> Option<u32> {
        let retained = self.current_version.saturating_sub(self.oldest_version) + 1;
        (self.max_versions > 0 && retained > self.max_versions).then_some(self.oldest_version)
    }

    pub fn raise_oldest(&mut self, new_oldest: u32) {
        debug_assert!(new_oldest >= self.oldest_version);
        self.oldest_version = new_oldest;
    }

    /// Whether a version number is inside the addressable range.
    pub fn version_in_range(&self, version: u32) -> bool {
        version >= self.oldest_version && version <= self.current_version && version > 0
    }
}

/// One immutable write at a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretVersion {
    pub id: SecretVersionId,
    pub secret_id: SecretId,
    pub version: u32,
    /// Base64 AEAD envelope of the JSON payload; None once destroyed.
    pub payload: Option<String>,
    pub created_by: Option<String>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(with = "datetime_serde::option")]
    pub destroyed_at: Option<DateTime<Utc>>,
}

impl SecretVersion {
    pub fn new(
        secret_id: SecretId,
        version: u32,
        payload: String,
        created_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SecretVersionId::new(),
            secret_id,
            version,
            payload: Some(payload),
            created_by,
            created_at: now,
            deleted_at: None,
            destroyed_at: None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed_at.is_some()
    }

    /// Soft-deleted explicitly, or aged out by `delete_version_after`.
    pub fn is_deleted(&self, delete_after_secs: Option<u64>, now: DateTime<Utc>) -> bool {
        if self.deleted_at.is_some() {
            return true;
        }
        match delete_after_secs {
            Some(secs) => now - self.created_at >= Duration::seconds(secs as i64),
            None => false,
        }
    }

    /// Marks the version deleted. No-op if already deleted or destroyed.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        if self.deleted_at.is_none() && self.destroyed_at.is_none() {
            self.deleted_at = Some(now);
        }
    }

    /// Clears the deletion mark. No-op unless soft-deleted and not destroyed.
    pub fn undelete(&mut self) {
        if self.destroyed_at.is_none() {
            self.deleted_at = None;
        }
    }

    /// Wipes the payload and stamps destruction. Irreversible; no-op if
    /// already destroyed.
    pub fn destroy(&mut self, now: DateTime<Utc>) {
        if self.destroyed_at.is_none() {
            self.payload = None;
            self.destroyed_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Secret {
        Secret::new(SecretPath::new("app/db").unwrap(), Utc::now())
    }

    #[test]
    fn cas_rules() {
        let mut s = secret();
        s.advance_version(Utc::now());
        assert_eq!(s.current_version, 1);

        // No CAS required, no expectation: fine.
        assert!(s.check_cas(None).is_ok());
        // Expectation must match.
        assert!(s.check_cas(Some(1)).is_ok());
        assert!(matches!(s.check_cas(Some(2)), Err(VaultError::Conflict(_))));

        s.cas_required = true;
        assert!(matches!(s.check_cas(None), Err(VaultError::Conflict(_))));
        assert!(s.check_cas(Some(1)).is_ok());
    }

    #[test]
    fn prune_when_cap_exceeded() {
        let mut s = secret();
        s.max_versions = 2;
        for _ in 0..2 {
            s.advance_version(Utc::now());
        }
        assert_eq!(s.version_to_prune(), None);
        s.advance_version(Utc::now());
        assert_eq!(s.version_to_prune(), Some(1));
        s.raise_oldest(2);
        assert_eq!(s.version_to_prune(), None);
    }

    #[test]
    fn version_lifecycle_idempotence() {
        let now = Utc::now();
        let mut v = SecretVersion::new(SecretId::new(), 1, "ct".into(), None, now);

        v.soft_delete(now);
        let stamp = v.deleted_at;
        v.soft_delete(now + Duration::seconds(5));
        assert_eq!(v.deleted_at, stamp, "re-delete is a no-op");

        v.undelete();
        assert!(v.deleted_at.is_none());
        v.undelete();
        assert!(v.deleted_at.is_none(), "undelete of live version is a no-op");

        v.destroy(now);
        assert!(v.payload.is_none());
        let stamp = v.destroyed_at;
        v.destroy(now + Duration::seconds(5));
        assert_eq!(v.destroyed_at, stamp, "re-destroy is a no-op");

        // Destroyed versions cannot be resurrected or re-deleted.
        v.undelete();
        assert!(v.is_destroyed());
        v.soft_delete(now);
        assert!(v.deleted_at.is_none());
    }

    #[test]
    fn age_based_deletion() {
        let now = Utc::now();
        let v = SecretVersion::new(SecretId::new(), 1, "ct".into(), None, now);
        assert!(!v.is_deleted(Some(3600), now + Duration::seconds(10)));
        assert!(v.is_deleted(Some(3600), now + Duration::seconds(3600)));
        assert!(!v.is_deleted(None, now + Duration::days(365)));
    }
}
