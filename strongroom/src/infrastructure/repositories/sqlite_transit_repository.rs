// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the transit-key repository.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;
use std::sync::Arc;

use strongroom_domain::entities::{AuditEvent, TransitKey, TransitKeyVersion};
use strongroom_domain::repositories::TransitKeyRepository;
use strongroom_domain::value_objects::{TransitKeyId, TransitKeyType};
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{
    get_bool, get_id, get_opt_ts, get_opt_u64, get_string, get_ts, get_u32, opt_ts, storage_err,
    ts, write_err,
};

pub struct SqliteTransitKeyRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteTransitKeyRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

fn map_key_row(row: &SqliteRow) -> Result<TransitKey, VaultError> {
    Ok(TransitKey {
        id: get_id(row, "id")?,
        name: get_string(row, "name")?,
        key_type: TransitKeyType::from_str(&get_string(row, "key_type")?)
            .map_err(|e| VaultError::Internal(format!("bad key_type: {e}")))?,
        latest_version: get_u32(row, "latest_version")?,
        min_decryption_version: get_u32(row, "min_decryption_version")?,
        min_encryption_version: get_u32(row, "min_encryption_version")?,
        deletion_protected: get_bool(row, "deletion_protected")?,
        exportable: get_bool(row, "exportable")?,
        allow_plaintext_backup: get_bool(row, "allow_plaintext_backup")?,
        auto_rotate_interval_secs: get_opt_u64(row, "auto_rotate_interval_secs")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
        last_rotated_at: get_opt_ts(row, "last_rotated_at")?,
    })
}

fn map_version_row(row: &SqliteRow) -> Result<TransitKeyVersion, VaultError> {
    Ok(TransitKeyVersion {
        id: get_id(row, "id")?,
        key_id: get_id(row, "key_id")?,
        version: get_u32(row, "version")?,
        wrapped_material: get_string(row, "wrapped_material")?,
        created_at: get_ts(row, "created_at")?,
        deleted_at: get_opt_ts(row, "deleted_at")?,
    })
}

async fn upsert_key(
    tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
    key: &TransitKey,
) -> Result<(), VaultError> {
    sqlx::query(
        "UPDATE transit_keys SET latest_version = ?, min_decryption_version = ?, \
         min_encryption_version = ?, deletion_protected = ?, exportable = ?, \
         allow_plaintext_backup = ?, auto_rotate_interval_secs = ?, updated_at = ?, \
         last_rotated_at = ? WHERE id = ?",
    )
    .bind(key.latest_version as i64)
    .bind(key.min_decryption_version as i64)
    .bind(key.min_encryption_version as i64)
    .bind(key.deletion_protected as i64)
    .bind(key.exportable as i64)
    .bind(key.allow_plaintext_backup as i64)
    .bind(key.auto_rotate_interval_secs.map(|v| v as i64))
    .bind(ts(&key.updated_at))
    .bind(opt_ts(&key.last_rotated_at))
    .bind(key.id.to_string())
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;
    Ok(())
}

async fn insert_version(
    tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
    version: &TransitKeyVersion,
) -> Result<(), VaultError> {
    sqlx::query(
        "INSERT INTO transit_key_versions \
         (id, key_id, version, wrapped_material, created_at, deleted_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(version.id.to_string())
    .bind(version.key_id.to_string())
    .bind(version.version as i64)
    .bind(&version.wrapped_material)
    .bind(ts(&version.created_at))
    .bind(opt_ts(&version.deleted_at))
    .execute(&mut **tx)
    .await
    .map_err(|e| write_err(e, "transit key version"))?;
    Ok(())
}

#[async_trait]
impl TransitKeyRepository for SqliteTransitKeyRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<TransitKey>, VaultError> {
        let row = sqlx::query("SELECT * FROM transit_keys WHERE name = ?")
            .bind(name)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_key_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<TransitKey>, VaultError> {
        let rows = sqlx::query("SELECT * FROM transit_keys ORDER BY name")
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_key_row).collect()
    }

    async fn find_version(
        &self,
        key_id: TransitKeyId,
        version: u32,
    ) -> Result<Option<TransitKeyVersion>, VaultError> {
        let row =
            sqlx::query("SELECT * FROM transit_key_versions WHERE key_id = ? AND version = ?")
                .bind(key_id.to_string())
                .bind(version as i64)
                .fetch_optional(self.chain.pool())
                .await
                .map_err(storage_err)?;
        row.as_ref().map(map_version_row).transpose()
    }

    async fn create(
        &self,
        key: &TransitKey,
        version: &TransitKeyVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;

        sqlx::query(
            "INSERT INTO transit_keys \
             (id, name, key_type, latest_version, min_decryption_version, \
              min_encryption_version, deletion_protected, exportable, allow_plaintext_backup, \
              auto_rotate_interval_secs, created_at, updated_at, last_rotated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(key.id.to_string())
        .bind(&key.name)
        .bind(key.key_type.as_str())
        .bind(key.latest_version as i64)
        .bind(key.min_decryption_version as i64)
        .bind(key.min_encryption_version as i64)
        .bind(key.deletion_protected as i64)
        .bind(key.exportable as i64)
        .bind(key.allow_plaintext_backup as i64)
        .bind(key.auto_rotate_interval_secs.map(|v| v as i64))
        .bind(ts(&key.created_at))
        .bind(ts(&key.updated_at))
        .bind(opt_ts(&key.last_rotated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(|e| write_err(e, format!("transit key '{}'", key.name).as_str()))?;

        insert_version(chain_tx.tx(), version).await?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn add_version(
        &self,
        key: &TransitKey,
        version: &TransitKeyVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        upsert_key(chain_tx.tx(), key).await?;
        insert_version(chain_tx.tx(), version).await?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn update(&self, key: &TransitKey, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        upsert_key(chain_tx.tx(), key).await?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete(&self, key_id: TransitKeyId, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;

        // Overwrite wrapped material before removal so deleted key
        // ciphertext never lingers in free pages.
        sqlx::query("UPDATE transit_key_versions SET wrapped_material = '' WHERE key_id = ?")
            .bind(key_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM transit_key_versions WHERE key_id = ?")
            .bind(key_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM transit_keys WHERE id = ?")
            .bind(key_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }
}
