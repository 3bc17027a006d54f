// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for dynamic-credential leases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{AuditEvent, CredentialLease};
use crate::value_objects::LeaseId;
use crate::VaultError;

/// Stores credential leases for the dynamic-credentials engine.
#[async_trait]
pub trait LeaseRepository: Send + Sync {
    async fn find(&self, id: LeaseId) -> Result<Option<CredentialLease>, VaultError>;

    async fn list_by_database(&self, database_name: &str)
        -> Result<Vec<CredentialLease>, VaultError>;

    /// Leases whose expiry has passed and that are not yet revoked —
    /// the sweeper's work queue, oldest expiry first.
    async fn find_expired_unrevoked(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CredentialLease>, VaultError>;

    async fn insert(&self, lease: &CredentialLease, audit: AuditEvent) -> Result<(), VaultError>;

    /// Persists lease state changes. Revocations carry an audit record;
    /// retry-bookkeeping updates from the sweeper do not.
    async fn update(
        &self,
        lease: &CredentialLease,
        audit: Option<AuditEvent>,
    ) -> Result<(), VaultError>;
}
