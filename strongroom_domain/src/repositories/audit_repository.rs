// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the hash-chained audit log.
//!
//! Appends are serialized by the implementation so chain hashing is serial:
//! the previous record's hash is read, the new record hashed and inserted,
//! all under one lock and one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{AuditEvent, AuditRecord};
use crate::value_objects::AuditRecordId;
use crate::VaultError;

/// Stores audit records and maintains the chain.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Redacts, chains, and persists one event. Used for operations whose
    /// audit record is not coupled to a mutation (reads, denials); coupled
    /// appends happen inside the owning repository's transaction.
    async fn append(&self, event: AuditEvent) -> Result<AuditRecord, VaultError>;

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, VaultError>;

    async fn latest(&self) -> Result<Option<AuditRecord>, VaultError>;

    /// Records in `[from, to)` in creation order.
    async fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, VaultError>;

    /// Retention cleanup: removes records created before `cutoff`, returning
    /// the count removed. Breaks the chain at the oldest retained record by
    /// design.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, VaultError>;
}
