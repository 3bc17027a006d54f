// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the versioned KV aggregate.
//!
//! Write serialization contract: [`SecretRepository::append_version`] is an
//! optimistic compare-and-set on the stored `current_version`. Concurrent
//! writers to one path race on the guard; exactly one wins, the rest fail
//! with [`VaultError::Conflict`] and may retry after re-reading.

use async_trait::async_trait;

use crate::entities::{AuditEvent, Secret, SecretVersion};
use crate::value_objects::{SecretId, SecretPath};
use crate::VaultError;

/// Stores secrets and their versions.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn find_by_path(&self, path: &SecretPath) -> Result<Option<Secret>, VaultError>;

    async fn find_version(
        &self,
        secret_id: SecretId,
        version: u32,
    ) -> Result<Option<SecretVersion>, VaultError>;

    async fn list_versions(&self, secret_id: SecretId) -> Result<Vec<SecretVersion>, VaultError>;

    /// First write at a path: inserts the metadata row and version 1, plus
    /// the audit record, in one transaction. Fails with `Conflict` if
    /// another writer created the path concurrently.
    async fn create_with_version(
        &self,
        secret: &Secret,
        version: &SecretVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Subsequent write: updates the metadata row guarded by
    /// `current_version = expected_current`, inserts the new version row,
    /// optionally destroys the version pruned by the max-versions cap, and
    /// appends the audit record — one transaction. A guard miss fails with
    /// `Conflict` and writes nothing.
    async fn append_version(
        &self,
        secret: &Secret,
        expected_current: u32,
        version: &SecretVersion,
        destroy_version: Option<u32>,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Persists lifecycle changes (soft-delete, undelete, destroy) to the
    /// given version rows with the audit record.
    async fn update_versions(
        &self,
        versions: &[SecretVersion],
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Updates path-level metadata (caps, CAS flag, custom metadata).
    async fn update_metadata(&self, secret: &Secret, audit: AuditEvent) -> Result<(), VaultError>;

    /// Removes the secret and every version. Terminal.
    async fn delete_all(&self, secret_id: SecretId, audit: AuditEvent) -> Result<(), VaultError>;

    /// All stored paths beginning with `prefix` (the service derives
    /// directory-style entries from these).
    async fn list_paths(&self, prefix: &str) -> Result<Vec<String>, VaultError>;
}
