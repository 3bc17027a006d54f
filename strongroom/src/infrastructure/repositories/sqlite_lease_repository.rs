// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the credential-lease repository.
//!
//! Expiry queries compare RFC3339 TEXT timestamps; the fixed-width
//! millisecond `Z` form sorts lexicographically, so string comparison is
//! time comparison.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;

use strongroom_domain::entities::{AuditEvent, CredentialLease};
use strongroom_domain::repositories::LeaseRepository;
use strongroom_domain::value_objects::LeaseId;
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{get_bool, get_id, get_opt_ts, get_string, get_ts, get_u32, opt_ts, storage_err, ts, write_err};

pub struct SqliteLeaseRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteLeaseRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

fn map_lease_row(row: &SqliteRow) -> Result<CredentialLease, VaultError> {
    Ok(CredentialLease {
        id: get_id(row, "id")?,
        database_name: get_string(row, "database_name")?,
        role_name: get_string(row, "role_name")?,
        username: get_string(row, "username")?,
        encrypted_password: get_string(row, "encrypted_password")?,
        issued_at: get_ts(row, "issued_at")?,
        expires_at: get_ts(row, "expires_at")?,
        max_expires_at: get_ts(row, "max_expires_at")?,
        renewable: get_bool(row, "renewable")?,
        revoked: get_bool(row, "revoked")?,
        revoked_at: get_opt_ts(row, "revoked_at")?,
        revoke_pending: get_bool(row, "revoke_pending")?,
        revoke_attempts: get_u32(row, "revoke_attempts")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

#[async_trait]
impl LeaseRepository for SqliteLeaseRepository {
    async fn find(&self, id: LeaseId) -> Result<Option<CredentialLease>, VaultError> {
        let row = sqlx::query("SELECT * FROM credential_leases WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_lease_row).transpose()
    }

    async fn list_by_database(
        &self,
        database_name: &str,
    ) -> Result<Vec<CredentialLease>, VaultError> {
        let rows = sqlx::query(
            "SELECT * FROM credential_leases WHERE database_name = ? ORDER BY issued_at",
        )
        .bind(database_name)
        .fetch_all(self.chain.pool())
        .await
        .map_err(storage_err)?;
        rows.iter().map(map_lease_row).collect()
    }

    async fn find_expired_unrevoked(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CredentialLease>, VaultError> {
        let rows = sqlx::query(
            "SELECT * FROM credential_leases WHERE expires_at <= ? AND revoked = 0 \
             ORDER BY expires_at LIMIT ?",
        )
        .bind(ts(&now))
        .bind(limit as i64)
        .fetch_all(self.chain.pool())
        .await
        .map_err(storage_err)?;
        rows.iter().map(map_lease_row).collect()
    }

    async fn insert(&self, lease: &CredentialLease, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO credential_leases \
             (id, database_name, role_name, username, encrypted_password, issued_at, \
              expires_at, max_expires_at, renewable, revoked, revoked_at, revoke_pending, \
              revoke_attempts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lease.id.to_string())
        .bind(&lease.database_name)
        .bind(&lease.role_name)
        .bind(&lease.username)
        .bind(&lease.encrypted_password)
        .bind(ts(&lease.issued_at))
        .bind(ts(&lease.expires_at))
        .bind(ts(&lease.max_expires_at))
        .bind(lease.renewable as i64)
        .bind(lease.revoked as i64)
        .bind(opt_ts(&lease.revoked_at))
        .bind(lease.revoke_pending as i64)
        .bind(lease.revoke_attempts as i64)
        .bind(ts(&lease.created_at))
        .bind(ts(&lease.updated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(|e| write_err(e, "lease"))?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn update(
        &self,
        lease: &CredentialLease,
        audit: Option<AuditEvent>,
    ) -> Result<(), VaultError> {
        let query = "UPDATE credential_leases SET expires_at = ?, revoked = ?, revoked_at = ?, \
                     revoke_pending = ?, revoke_attempts = ?, updated_at = ? WHERE id = ?";

        match audit {
            Some(audit) => {
                let mut chain_tx = self.chain.begin().await?;
                sqlx::query(query)
                    .bind(ts(&lease.expires_at))
                    .bind(lease.revoked as i64)
                    .bind(opt_ts(&lease.revoked_at))
                    .bind(lease.revoke_pending as i64)
                    .bind(lease.revoke_attempts as i64)
                    .bind(ts(&lease.updated_at))
                    .bind(lease.id.to_string())
                    .execute(&mut **chain_tx.tx())
                    .await
                    .map_err(storage_err)?;
                chain_tx.append(audit).await?;
                chain_tx.commit().await
            }
            None => {
                sqlx::query(query)
                    .bind(ts(&lease.expires_at))
                    .bind(lease.revoked as i64)
                    .bind(opt_ts(&lease.revoked_at))
                    .bind(lease.revoke_pending as i64)
                    .bind(lease.revoke_attempts as i64)
                    .bind(ts(&lease.updated_at))
                    .bind(lease.id.to_string())
                    .execute(self.chain.pool())
                    .await
                    .map_err(storage_err)?;
                Ok(())
            }
        }
    }
}
