// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the audit-log repository.
//!
//! Appends delegate to the shared [`AuditChainWriter`] so standalone and
//! mutation-coupled records share one serialized chain. Reads order by
//! rowid, which is insertion order — the order the chain was built in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;
use std::sync::Arc;

use strongroom_domain::entities::{AuditEvent, AuditRecord, AuditStatus};
use strongroom_domain::repositories::AuditRepository;
use strongroom_domain::value_objects::AuditRecordId;
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{get_id, get_opt_string, get_string, get_ts, storage_err, ts};

pub struct SqliteAuditRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteAuditRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

pub(crate) fn map_audit_row(row: &SqliteRow) -> Result<AuditRecord, VaultError> {
    Ok(AuditRecord {
        id: get_id(row, "id")?,
        actor_id: get_opt_string(row, "actor_id")?,
        action: get_string(row, "action")?,
        resource_type: get_string(row, "resource_type")?,
        resource_id: get_opt_string(row, "resource_id")?,
        old_value: get_opt_string(row, "old_value")?,
        new_value: get_opt_string(row, "new_value")?,
        source_addr: get_opt_string(row, "source_addr")?,
        user_agent: get_opt_string(row, "user_agent")?,
        status: AuditStatus::from_str(&get_string(row, "status")?)?,
        error: get_opt_string(row, "error")?,
        correlation_id: get_string(row, "correlation_id")?,
        created_at: get_ts(row, "created_at")?,
        previous_hash: get_string(row, "previous_hash")?,
        current_hash: get_string(row, "current_hash")?,
    })
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn append(&self, event: AuditEvent) -> Result<AuditRecord, VaultError> {
        self.chain.append(event).await
    }

    async fn find(&self, id: AuditRecordId) -> Result<Option<AuditRecord>, VaultError> {
        let row = sqlx::query("SELECT * FROM audit_logs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_audit_row).transpose()
    }

    async fn latest(&self) -> Result<Option<AuditRecord>, VaultError> {
        let row = sqlx::query("SELECT * FROM audit_logs ORDER BY rowid DESC LIMIT 1")
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_audit_row).transpose()
    }

    async fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, VaultError> {
        let rows = sqlx::query(
            "SELECT * FROM audit_logs WHERE created_at >= ? AND created_at < ? ORDER BY rowid",
        )
        .bind(ts(&from))
        .bind(ts(&to))
        .fetch_all(self.chain.pool())
        .await
        .map_err(storage_err)?;
        rows.iter().map(map_audit_row).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, VaultError> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < ?")
            .bind(ts(&cutoff))
            .execute(self.chain.pool())
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}
