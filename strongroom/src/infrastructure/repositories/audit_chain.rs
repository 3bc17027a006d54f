// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Chain Appender
//!
//! The single writer for the hash-chained audit log. Every append — whether
//! standalone or coupled to an engine mutation — goes through
//! [`AuditChainWriter::begin`], which serializes chain computation under one
//! async lock:
//!
//! ```text
//! lock ─► BEGIN ─► engine mutation rows ─► read tail hash ─► redact,
//! chain, INSERT audit row ─► COMMIT ─► unlock
//! ```
//!
//! Holding the lock across the commit is what makes the chain property
//! hold: no second append can read the tail until the first one's row is
//! durable. A failed audit insert rolls the whole transaction back, so a
//! mutation never lands without its audit record.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use strongroom_domain::entities::{AuditEvent, AuditRecord};
use strongroom_domain::services::{audit_hash, redaction};
use strongroom_domain::value_objects::AuditRecordId;
use strongroom_domain::VaultError;

use super::row::{storage_err, ts};

/// Serialized writer over the audit chain.
pub struct AuditChainWriter {
    pool: SqlitePool,
    lock: Mutex<()>,
}

impl AuditChainWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a chained transaction: the chain lock plus a database
    /// transaction. Mutation queries run against [`ChainTx::tx`]; the final
    /// [`ChainTx::append`] + [`ChainTx::commit`] land the audit record
    /// atomically with them.
    pub async fn begin(&self) -> Result<ChainTx<'_>, VaultError> {
        let guard = self.lock.lock().await;
        let tx = self.pool.begin().await.map_err(storage_err)?;
        Ok(ChainTx {
            _guard: guard,
            tx,
            appended: None,
        })
    }

    /// Standalone append (reads, denials): its own one-statement transaction.
    pub async fn append(&self, event: AuditEvent) -> Result<AuditRecord, VaultError> {
        let mut chain_tx = self.begin().await?;
        let record = chain_tx.append(event).await?;
        chain_tx.commit().await?;
        Ok(record)
    }
}

/// A transaction coupled to the audit chain lock.
pub struct ChainTx<'a> {
    _guard: MutexGuard<'a, ()>,
    tx: Transaction<'static, Sqlite>,
    appended: Option<AuditRecord>,
}

impl ChainTx<'_> {
    /// The underlying transaction for mutation queries.
    pub fn tx(&mut self) -> &mut Transaction<'static, Sqlite> {
        &mut self.tx
    }

    /// Redacts, chains, and inserts the audit record inside this
    /// transaction.
    pub async fn append(&mut self, event: AuditEvent) -> Result<AuditRecord, VaultError> {
        let previous_hash: Option<(String,)> =
            sqlx::query_as("SELECT current_hash FROM audit_logs ORDER BY rowid DESC LIMIT 1")
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(storage_err)?;

        let mut record = AuditRecord {
            id: AuditRecordId::new(),
            actor_id: event.actor_id,
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            old_value: event.old_value.as_ref().map(redaction::redact_to_string),
            new_value: event.new_value.as_ref().map(redaction::redact_to_string),
            source_addr: event.source_addr,
            user_agent: event.user_agent,
            status: event.status,
            error: event.error,
            correlation_id: event
                .correlation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            created_at: Utc::now(),
            previous_hash: previous_hash.map(|(h,)| h).unwrap_or_default(),
            current_hash: String::new(),
        };
        record.current_hash = audit_hash::compute_hash(&record);

        sqlx::query(
            "INSERT INTO audit_logs \
             (id, actor_id, action, resource_type, resource_id, old_value, new_value, \
              source_addr, user_agent, status, error, correlation_id, created_at, \
              previous_hash, current_hash) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.actor_id)
        .bind(&record.action)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.old_value)
        .bind(&record.new_value)
        .bind(&record.source_addr)
        .bind(&record.user_agent)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(&record.correlation_id)
        .bind(ts(&record.created_at))
        .bind(&record.previous_hash)
        .bind(&record.current_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_err)?;

        self.appended = Some(record.clone());
        Ok(record)
    }

    /// Commits mutation and audit record together.
    pub async fn commit(self) -> Result<(), VaultError> {
        debug_assert!(
            self.appended.is_some(),
            "chained transaction committed without an audit record"
        );
        self.tx.commit().await.map_err(storage_err)
    }
}
