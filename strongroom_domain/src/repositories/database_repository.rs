// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for database configurations and roles.

use async_trait::async_trait;

use crate::entities::{AuditEvent, DatabaseConfig, DatabaseRole};
use crate::VaultError;

/// Stores external-database configurations and their roles.
#[async_trait]
pub trait DatabaseRepository: Send + Sync {
    async fn find_config(&self, name: &str) -> Result<Option<DatabaseConfig>, VaultError>;

    async fn list_configs(&self) -> Result<Vec<DatabaseConfig>, VaultError>;

    /// Inserts or updates a configuration by name.
    async fn save_config(
        &self,
        config: &DatabaseConfig,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;

    async fn delete_config(&self, name: &str, audit: AuditEvent) -> Result<(), VaultError>;

    async fn find_role(
        &self,
        database_name: &str,
        role_name: &str,
    ) -> Result<Option<DatabaseRole>, VaultError>;

    async fn list_roles(&self, database_name: &str) -> Result<Vec<DatabaseRole>, VaultError>;

    /// Inserts or updates a role by (database, name).
    async fn save_role(&self, role: &DatabaseRole, audit: AuditEvent) -> Result<(), VaultError>;

    async fn delete_role(
        &self,
        database_name: &str,
        role_name: &str,
        audit: AuditEvent,
    ) -> Result<(), VaultError>;
}
