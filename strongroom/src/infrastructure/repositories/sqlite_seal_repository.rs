// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the seal-configuration repository.
//!
//! The table holds at most one row with a fixed primary key, which makes
//! "initialize exactly once" a constraint the database enforces rather than
//! a check-then-act race.

use async_trait::async_trait;
use sqlx::SqlitePool;

use strongroom_domain::entities::{KdfParams, SealConfiguration};
use strongroom_domain::repositories::SealRepository;
use strongroom_domain::VaultError;

use super::row::{get_bool, get_string, get_ts, storage_err, ts};

pub struct SqliteSealRepository {
    pool: SqlitePool,
}

impl SqliteSealRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SealRepository for SqliteSealRepository {
    async fn load(&self) -> Result<Option<SealConfiguration>, VaultError> {
        let row = sqlx::query("SELECT * FROM seal_configuration WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let kdf_json = get_string(&row, "kdf_params")?;
        let kdf_params: KdfParams = serde_json::from_str(&kdf_json)
            .map_err(|e| VaultError::Internal(format!("bad kdf_params: {e}")))?;

        let config = SealConfiguration {
            initialized: get_bool(&row, "initialized")?,
            share_count: u8::try_from(super::row::get_i64(&row, "share_count")?)
                .map_err(|_| VaultError::Internal("share_count out of range".into()))?,
            threshold: u8::try_from(super::row::get_i64(&row, "threshold")?)
                .map_err(|_| VaultError::Internal("threshold out of range".into()))?,
            encrypted_master: get_string(&row, "encrypted_master")?,
            kdf_params,
            verification_token_hash: get_string(&row, "verification_token_hash")?,
            root_token_hash: get_string(&row, "root_token_hash")?,
            created_at: get_ts(&row, "created_at")?,
            updated_at: get_ts(&row, "updated_at")?,
        };
        config.validate()?;
        Ok(Some(config))
    }

    async fn initialize(&self, config: &SealConfiguration) -> Result<(), VaultError> {
        config.validate()?;
        let kdf_json = serde_json::to_string(&config.kdf_params)
            .map_err(|e| VaultError::Internal(format!("kdf_params serialization: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO seal_configuration \
             (id, initialized, share_count, threshold, encrypted_master, kdf_params, \
              verification_token_hash, root_token_hash, created_at, updated_at) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(config.initialized as i64)
        .bind(config.share_count as i64)
        .bind(config.threshold as i64)
        .bind(&config.encrypted_master)
        .bind(&kdf_json)
        .bind(&config.verification_token_hash)
        .bind(&config.root_token_hash)
        .bind(ts(&config.created_at))
        .bind(ts(&config.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(VaultError::AlreadyInitialized)
            }
            // The CHECK(id = 1) constraint also lands here on a second row.
            Err(sqlx::Error::Database(db)) if db.is_check_violation() => {
                Err(VaultError::AlreadyInitialized)
            }
            Err(e) => Err(storage_err(e)),
        }
    }
}
