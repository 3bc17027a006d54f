// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the database configuration/role repository.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use strongroom_domain::entities::{AuditEvent, DatabaseConfig, DatabasePlugin, DatabaseRole};
use strongroom_domain::repositories::DatabaseRepository;
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{
    get_bool, get_id, get_opt_string, get_opt_ts, get_string, get_ts, get_u32, opt_ts,
    storage_err, ts,
};

pub struct SqliteDatabaseRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteDatabaseRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

fn map_config_row(row: &SqliteRow) -> Result<DatabaseConfig, VaultError> {
    let options_json = get_string(row, "options")?;
    let options: HashMap<String, String> = serde_json::from_str(&options_json)
        .map_err(|e| VaultError::Internal(format!("bad options: {e}")))?;
    Ok(DatabaseConfig {
        id: get_id(row, "id")?,
        name: get_string(row, "name")?,
        plugin: DatabasePlugin::from_str(&get_string(row, "plugin")?)
            .map_err(|e| VaultError::Internal(format!("bad plugin: {e}")))?,
        connection_url: get_string(row, "connection_url")?,
        admin_username: get_string(row, "admin_username")?,
        encrypted_admin_password: get_string(row, "encrypted_admin_password")?,
        max_connections: get_u32(row, "max_connections")?,
        connect_timeout_secs: super::row::get_i64(row, "connect_timeout_secs")? as u64,
        options,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
        password_rotated_at: get_opt_ts(row, "password_rotated_at")?,
    })
}

fn map_role_row(row: &SqliteRow) -> Result<DatabaseRole, VaultError> {
    Ok(DatabaseRole {
        id: get_id(row, "id")?,
        database_name: get_string(row, "database_name")?,
        name: get_string(row, "name")?,
        creation_statements: get_string(row, "creation_statements")?,
        revocation_statements: get_opt_string(row, "revocation_statements")?,
        rollback_statements: get_opt_string(row, "rollback_statements")?,
        default_ttl_secs: super::row::get_i64(row, "default_ttl_secs")? as u64,
        max_ttl_secs: super::row::get_i64(row, "max_ttl_secs")? as u64,
        renewable: get_bool(row, "renewable")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

#[async_trait]
impl DatabaseRepository for SqliteDatabaseRepository {
    async fn find_config(&self, name: &str) -> Result<Option<DatabaseConfig>, VaultError> {
        let row = sqlx::query("SELECT * FROM database_configs WHERE name = ?")
            .bind(name)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_config_row).transpose()
    }

    async fn list_configs(&self) -> Result<Vec<DatabaseConfig>, VaultError> {
        let rows = sqlx::query("SELECT * FROM database_configs ORDER BY name")
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_config_row).collect()
    }

    async fn save_config(
        &self,
        config: &DatabaseConfig,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        config.validate()?;
        let options_json = serde_json::to_string(&config.options)
            .map_err(|e| VaultError::Internal(format!("options serialization: {e}")))?;

        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO database_configs \
             (id, name, plugin, connection_url, admin_username, encrypted_admin_password, \
              max_connections, connect_timeout_secs, options, created_at, updated_at, \
              password_rotated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
               plugin = excluded.plugin, \
               connection_url = excluded.connection_url, \
               admin_username = excluded.admin_username, \
               encrypted_admin_password = excluded.encrypted_admin_password, \
               max_connections = excluded.max_connections, \
               connect_timeout_secs = excluded.connect_timeout_secs, \
               options = excluded.options, \
               updated_at = excluded.updated_at, \
               password_rotated_at = excluded.password_rotated_at",
        )
        .bind(config.id.to_string())
        .bind(&config.name)
        .bind(config.plugin.as_str())
        .bind(&config.connection_url)
        .bind(&config.admin_username)
        .bind(&config.encrypted_admin_password)
        .bind(config.max_connections as i64)
        .bind(config.connect_timeout_secs as i64)
        .bind(&options_json)
        .bind(ts(&config.created_at))
        .bind(ts(&config.updated_at))
        .bind(opt_ts(&config.password_rotated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_config(&self, name: &str, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query("DELETE FROM database_roles WHERE database_name = ?")
            .bind(name)
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        let result = sqlx::query("DELETE FROM database_configs WHERE name = ?")
            .bind(name)
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("database '{name}'")));
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn find_role(
        &self,
        database_name: &str,
        role_name: &str,
    ) -> Result<Option<DatabaseRole>, VaultError> {
        let row = sqlx::query("SELECT * FROM database_roles WHERE database_name = ? AND name = ?")
            .bind(database_name)
            .bind(role_name)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_role_row).transpose()
    }

    async fn list_roles(&self, database_name: &str) -> Result<Vec<DatabaseRole>, VaultError> {
        let rows = sqlx::query("SELECT * FROM database_roles WHERE database_name = ? ORDER BY name")
            .bind(database_name)
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_role_row).collect()
    }

    async fn save_role(&self, role: &DatabaseRole, audit: AuditEvent) -> Result<(), VaultError> {
        role.validate()?;
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO database_roles \
             (id, database_name, name, creation_statements, revocation_statements, \
              rollback_statements, default_ttl_secs, max_ttl_secs, renewable, created_at, \
              updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(database_name, name) DO UPDATE SET \
               creation_statements = excluded.creation_statements, \
               revocation_statements = excluded.revocation_statements, \
               rollback_statements = excluded.rollback_statements, \
               default_ttl_secs = excluded.default_ttl_secs, \
               max_ttl_secs = excluded.max_ttl_secs, \
               renewable = excluded.renewable, \
               updated_at = excluded.updated_at",
        )
        .bind(role.id.to_string())
        .bind(&role.database_name)
        .bind(&role.name)
        .bind(&role.creation_statements)
        .bind(&role.revocation_statements)
        .bind(&role.rollback_statements)
        .bind(role.default_ttl_secs as i64)
        .bind(role.max_ttl_secs as i64)
        .bind(role.renewable as i64)
        .bind(ts(&role.created_at))
        .bind(ts(&role.updated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_role(
        &self,
        database_name: &str,
        role_name: &str,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        let result = sqlx::query("DELETE FROM database_roles WHERE database_name = ? AND name = ?")
            .bind(database_name)
            .bind(role_name)
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!(
                "role '{role_name}' on database '{database_name}'"
            )));
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }
}
