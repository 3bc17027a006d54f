// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for transit keys and their versions.

use async_trait::async_trait;

use crate::entities::{AuditEvent, TransitKey, TransitKeyVersion};
use crate::value_objects::TransitKeyId;
use crate::VaultError;

/// Stores named transit keys and their version material.
#[async_trait]
pub trait TransitKeyRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<TransitKey>, VaultError>;

    async fn list_all(&self) -> Result<Vec<TransitKey>, VaultError>;

    async fn find_version(
        &self,
        key_id: TransitKeyId,
        version: u32,
    ) -> Result<Option<TransitKeyVersion>, VaultError>;

    /// Creates a key with its version-1 material. Fails with `Conflict` on a
    /// duplicate name.
    async fn create(
        &self,
        key: &TransitKey,
        version: &TransitKeyVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Persists a rotation: the updated key row plus the new version row.
    async fn add_version(
        &self,
        key: &TransitKey,
        version: &TransitKeyVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Persists configuration changes (floors, protection, rotation interval).
    async fn update(&self, key: &TransitKey, audit: AuditEvent) -> Result<(), VaultError>;

    /// Deletes the key and all versions. Implementations overwrite the
    /// wrapped material before deleting the rows so no ciphertext of key
    /// material outlives the key.
    async fn delete(&self, key_id: TransitKeyId, audit: AuditEvent) -> Result<(), VaultError>;
}
