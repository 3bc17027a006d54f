// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for RBAC roles, permissions, and access policies.
//!
//! Role↔permission links are an explicit join table; the port exposes the
//! union query the authorization engine needs
//! ([`AccessControlRepository::permissions_for_roles`]) rather than raw link
//! rows.

use async_trait::async_trait;

use crate::entities::{AccessPolicy, AuditEvent, Permission, Role};
use crate::value_objects::{PermissionId, PolicyId, RoleId};
use crate::VaultError;

/// Stores the access-control model.
#[async_trait]
pub trait AccessControlRepository: Send + Sync {
    // --- RBAC roles ---

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, VaultError>;

    async fn list_roles(&self) -> Result<Vec<Role>, VaultError>;

    /// Inserts a role. Fails with `Conflict` on a duplicate name.
    async fn create_role(&self, role: &Role, audit: AuditEvent) -> Result<(), VaultError>;

    /// Deletes a non-system role and its permission links.
    async fn delete_role(&self, id: RoleId, audit: AuditEvent) -> Result<(), VaultError>;

    // --- Permissions ---

    async fn find_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<Option<Permission>, VaultError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, VaultError>;

    /// Inserts a permission. Fails with `Conflict` on a duplicate
    /// (resource, action) pair.
    async fn create_permission(
        &self,
        permission: &Permission,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    async fn delete_permission(&self, id: PermissionId, audit: AuditEvent)
        -> Result<(), VaultError>;

    // --- Role ↔ permission links ---

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    /// Union of permissions granted to any of the named roles.
    async fn permissions_for_roles(
        &self,
        role_names: &[String],
    ) -> Result<Vec<Permission>, VaultError>;

    // --- ABAC policies ---

    async fn find_policy_by_name(&self, name: &str) -> Result<Option<AccessPolicy>, VaultError>;

    async fn list_policies(&self) -> Result<Vec<AccessPolicy>, VaultError>;

    /// Inserts or updates a policy by name.
    async fn save_policy(&self, policy: &AccessPolicy, audit: AuditEvent)
        -> Result<(), VaultError>;

    async fn delete_policy(&self, id: PolicyId, audit: AuditEvent) -> Result<(), VaultError>;
}
