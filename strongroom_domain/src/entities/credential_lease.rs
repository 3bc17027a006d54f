// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dynamic Credential Lease Entity
//!
//! Every issued dynamic database account is tracked as a lease: who it was
//! created for, when it expires, and whether revocation on the external
//! system has happened yet. The sweeper walks expired, unrevoked leases and
//! drives the connector's revoke path; a connector failure parks the lease
//! in `revoke_pending` for retry with backoff.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::value_objects::LeaseId;
use crate::VaultError;

/// A tracked dynamic credential on an external database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialLease {
    pub id: LeaseId,
    pub database_name: String,
    pub role_name: String,
    pub username: String,
    /// Base64 AEAD envelope of the generated password under the master key.
    /// The plaintext is returned to the caller exactly once at issuance.
    pub encrypted_password: String,
    #[serde(with = "datetime_serde")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub expires_at: DateTime<Utc>,
    /// Renewal ceiling fixed at issuance: issued_at + role max TTL.
    #[serde(with = "datetime_serde")]
    pub max_expires_at: DateTime<Utc>,
    pub renewable: bool,
    pub revoked: bool,
    #[serde(with = "datetime_serde::option")]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Connector revocation failed; the sweeper retries with backoff.
    pub revoke_pending: bool,
    pub revoke_attempts: u32,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl CredentialLease {
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        database_name: String,
        role_name: String,
        username: String,
        encrypted_password: String,
        ttl_secs: u64,
        max_ttl_secs: u64,
        renewable: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LeaseId::new(),
            database_name,
            role_name,
            username,
            encrypted_password,
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
            max_expires_at: now + Duration::seconds(max_ttl_secs as i64),
            renewable,
            revoked: false,
            revoked_at: None,
            revoke_pending: false,
            revoke_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Extends the lease by the role's default TTL, capped at the renewal
    /// ceiling fixed at issuance. A revoked or expired lease never renews.
    pub fn renew(&mut self, increment_secs: u64, now: DateTime<Utc>) -> Result<DateTime<Utc>, VaultError> {
        if self.revoked || self.revoke_pending {
            return Err(VaultError::Conflict(format!(
                "lease {} is revoked",
                self.id
            )));
        }
        if !self.renewable {
            return Err(VaultError::Unsupported(format!(
                "lease {} is not renewable",
                self.id
            )));
        }
        if self.is_expired(now) {
            return Err(VaultError::Conflict(format!(
                "lease {} has expired",
                self.id
            )));
        }
        let proposed = now + Duration::seconds(increment_secs as i64);
        self.expires_at = proposed.min(self.max_expires_at);
        self.updated_at = now;
        Ok(self.expires_at)
    }

    /// Marks the lease revoked on the external system. Idempotent.
    pub fn mark_revoked(&mut self, now: DateTime<Utc>) {
        if !self.revoked {
            self.revoked = true;
            self.revoked_at = Some(now);
            self.revoke_pending = false;
            self.updated_at = now;
        }
    }

    /// Records a failed connector revocation attempt.
    pub fn mark_revoke_failed(&mut self, now: DateTime<Utc>) {
        self.revoke_pending = true;
        self.revoke_attempts += 1;
        self.updated_at = now;
    }
}
