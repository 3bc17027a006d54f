// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the KV secret repository.
//!
//! Write serialization is the optimistic guard on `current_version`: the
//! metadata UPDATE carries `WHERE current_version = ?` and zero affected
//! rows means another writer won the race — the transaction rolls back
//! untouched and the caller sees `Conflict`.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use std::collections::HashMap;
use std::sync::Arc;

use strongroom_domain::entities::{AuditEvent, Secret, SecretVersion};
use strongroom_domain::repositories::SecretRepository;
use strongroom_domain::value_objects::{SecretId, SecretPath};
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{
    get_bool, get_id, get_opt_string, get_opt_ts, get_opt_u64, get_string, get_ts, get_u32,
    opt_ts, storage_err, ts, write_err,
};

pub struct SqliteSecretRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteSecretRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

fn map_secret_row(row: &SqliteRow) -> Result<Secret, VaultError> {
    let metadata_json = get_string(row, "custom_metadata")?;
    let custom_metadata: HashMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| VaultError::Internal(format!("bad custom_metadata: {e}")))?;
    Ok(Secret {
        id: get_id(row, "id")?,
        path: SecretPath::new(&get_string(row, "path")?)?,
        current_version: get_u32(row, "current_version")?,
        oldest_version: get_u32(row, "oldest_version")?,
        max_versions: get_u32(row, "max_versions")?,
        cas_required: get_bool(row, "cas_required")?,
        delete_version_after_secs: get_opt_u64(row, "delete_version_after_secs")?,
        custom_metadata,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn map_version_row(row: &SqliteRow) -> Result<SecretVersion, VaultError> {
    Ok(SecretVersion {
        id: get_id(row, "id")?,
        secret_id: get_id(row, "secret_id")?,
        version: get_u32(row, "version")?,
        payload: get_opt_string(row, "payload")?,
        created_by: get_opt_string(row, "created_by")?,
        created_at: get_ts(row, "created_at")?,
        deleted_at: get_opt_ts(row, "deleted_at")?,
        destroyed_at: get_opt_ts(row, "destroyed_at")?,
    })
}

fn metadata_json(secret: &Secret) -> Result<String, VaultError> {
    serde_json::to_string(&secret.custom_metadata)
        .map_err(|e| VaultError::Internal(format!("custom_metadata serialization: {e}")))
}

/// Escapes LIKE wildcards so stored paths cannot broaden a prefix scan.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

async fn insert_version(
    tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
    version: &SecretVersion,
) -> Result<(), VaultError> {
    sqlx::query(
        "INSERT INTO secret_versions \
         (id, secret_id, version, payload, created_by, created_at, deleted_at, destroyed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(version.id.to_string())
    .bind(version.secret_id.to_string())
    .bind(version.version as i64)
    .bind(&version.payload)
    .bind(&version.created_by)
    .bind(ts(&version.created_at))
    .bind(opt_ts(&version.deleted_at))
    .bind(opt_ts(&version.destroyed_at))
    .execute(&mut **tx)
    .await
    .map_err(|e| write_err(e, "secret version"))?;
    Ok(())
}

#[async_trait]
impl SecretRepository for SqliteSecretRepository {
    async fn find_by_path(&self, path: &SecretPath) -> Result<Option<Secret>, VaultError> {
        let row = sqlx::query("SELECT * FROM secrets WHERE path = ?")
            .bind(path.as_str())
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_secret_row).transpose()
    }

    async fn find_version(
        &self,
        secret_id: SecretId,
        version: u32,
    ) -> Result<Option<SecretVersion>, VaultError> {
        let row = sqlx::query("SELECT * FROM secret_versions WHERE secret_id = ? AND version = ?")
            .bind(secret_id.to_string())
            .bind(version as i64)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_version_row).transpose()
    }

    async fn list_versions(&self, secret_id: SecretId) -> Result<Vec<SecretVersion>, VaultError> {
        let rows =
            sqlx::query("SELECT * FROM secret_versions WHERE secret_id = ? ORDER BY version")
                .bind(secret_id.to_string())
                .fetch_all(self.chain.pool())
                .await
                .map_err(storage_err)?;
        rows.iter().map(map_version_row).collect()
    }

    async fn create_with_version(
        &self,
        secret: &Secret,
        version: &SecretVersion,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;

        sqlx::query(
            "INSERT INTO secrets \
             (id, path, current_version, oldest_version, max_versions, cas_required, \
              delete_version_after_secs, custom_metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(secret.id.to_string())
        .bind(secret.path.as_str())
        .bind(secret.current_version as i64)
        .bind(secret.oldest_version as i64)
        .bind(secret.max_versions as i64)
        .bind(secret.cas_required as i64)
        .bind(secret.delete_version_after_secs.map(|v| v as i64))
        .bind(metadata_json(secret)?)
        .bind(ts(&secret.created_at))
        .bind(ts(&secret.updated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(|e| write_err(e, format!("secret '{}'", secret.path).as_str()))?;

        insert_version(chain_tx.tx(), version).await?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn append_version(
        &self,
        secret: &Secret,
        expected_current: u32,
        version: &SecretVersion,
        destroy_version: Option<u32>,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;

        let updated = sqlx::query(
            "UPDATE secrets SET current_version = ?, oldest_version = ?, max_versions = ?, \
             cas_required = ?, delete_version_after_secs = ?, custom_metadata = ?, updated_at = ? \
             WHERE id = ? AND current_version = ?",
        )
        .bind(secret.current_version as i64)
        .bind(secret.oldest_version as i64)
        .bind(secret.max_versions as i64)
        .bind(secret.cas_required as i64)
        .bind(secret.delete_version_after_secs.map(|v| v as i64))
        .bind(metadata_json(secret)?)
        .bind(ts(&secret.updated_at))
        .bind(secret.id.to_string())
        .bind(expected_current as i64)
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;

        if updated.rows_affected() == 0 {
            // Another writer advanced the version first; roll back.
            return Err(VaultError::Conflict(format!(
                "concurrent write to '{}'",
                secret.path
            )));
        }

        insert_version(chain_tx.tx(), version).await?;

        if let Some(pruned) = destroy_version {
            sqlx::query(
                "UPDATE secret_versions SET payload = NULL, destroyed_at = ? \
                 WHERE secret_id = ? AND version = ? AND destroyed_at IS NULL",
            )
            .bind(ts(&secret.updated_at))
            .bind(secret.id.to_string())
            .bind(pruned as i64)
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        }

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn update_versions(
        &self,
        versions: &[SecretVersion],
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        for version in versions {
            sqlx::query(
                "UPDATE secret_versions SET payload = ?, deleted_at = ?, destroyed_at = ? \
                 WHERE id = ?",
            )
            .bind(&version.payload)
            .bind(opt_ts(&version.deleted_at))
            .bind(opt_ts(&version.destroyed_at))
            .bind(version.id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn update_metadata(&self, secret: &Secret, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "UPDATE secrets SET max_versions = ?, cas_required = ?, \
             delete_version_after_secs = ?, custom_metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(secret.max_versions as i64)
        .bind(secret.cas_required as i64)
        .bind(secret.delete_version_after_secs.map(|v| v as i64))
        .bind(metadata_json(secret)?)
        .bind(ts(&secret.updated_at))
        .bind(secret.id.to_string())
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_all(&self, secret_id: SecretId, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;

        // Wipe payload ciphertext before the rows go.
        sqlx::query("UPDATE secret_versions SET payload = NULL WHERE secret_id = ?")
            .bind(secret_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM secret_versions WHERE secret_id = ?")
            .bind(secret_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM secrets WHERE id = ?")
            .bind(secret_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn list_paths(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        let pattern = if prefix.is_empty() {
            "%".to_string()
        } else {
            format!("{}/%", escape_like(prefix))
        };
        let rows = sqlx::query("SELECT path FROM secrets WHERE path LIKE ? ESCAPE '\\' ORDER BY path")
            .bind(&pattern)
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(|row| get_string(row, "path")).collect()
    }
}
