// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Row-decoding helpers shared by the SQLite repositories.
//!
//! Timestamps are RFC3339 TEXT, booleans are INTEGER 0/1, ids are ULID
//! TEXT. Decoding failures mean the database was edited out-of-band and
//! surface as `Internal`.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use strongroom_domain::services::datetime_serde;
use strongroom_domain::value_objects::{EntityId, IdKind};
use strongroom_domain::VaultError;

pub fn storage_err(e: impl std::fmt::Display) -> VaultError {
    VaultError::storage(e)
}

/// Maps a sqlx error, turning unique-constraint violations into `Conflict`.
pub fn write_err(e: sqlx::Error, what: &str) -> VaultError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return VaultError::Conflict(format!("{what} already exists"));
        }
    }
    storage_err(e)
}

pub fn get_string(row: &SqliteRow, col: &str) -> Result<String, VaultError> {
    row.try_get::<String, _>(col).map_err(storage_err)
}

pub fn get_opt_string(row: &SqliteRow, col: &str) -> Result<Option<String>, VaultError> {
    row.try_get::<Option<String>, _>(col).map_err(storage_err)
}

pub fn get_i64(row: &SqliteRow, col: &str) -> Result<i64, VaultError> {
    row.try_get::<i64, _>(col).map_err(storage_err)
}

pub fn get_u32(row: &SqliteRow, col: &str) -> Result<u32, VaultError> {
    u32::try_from(get_i64(row, col)?)
        .map_err(|_| VaultError::Internal(format!("column {col} out of range")))
}

pub fn get_opt_u64(row: &SqliteRow, col: &str) -> Result<Option<u64>, VaultError> {
    let value: Option<i64> = row.try_get(col).map_err(storage_err)?;
    value
        .map(|v| u64::try_from(v).map_err(|_| VaultError::Internal(format!("column {col} out of range"))))
        .transpose()
}

pub fn get_bool(row: &SqliteRow, col: &str) -> Result<bool, VaultError> {
    Ok(get_i64(row, col)? != 0)
}

pub fn get_ts(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, VaultError> {
    let text = get_string(row, col)?;
    datetime_serde::parse_rfc3339(&text)
        .map_err(|e| VaultError::Internal(format!("bad timestamp in {col}: {e}")))
}

pub fn get_opt_ts(row: &SqliteRow, col: &str) -> Result<Option<DateTime<Utc>>, VaultError> {
    match get_opt_string(row, col)? {
        Some(text) => datetime_serde::parse_rfc3339(&text)
            .map(Some)
            .map_err(|e| VaultError::Internal(format!("bad timestamp in {col}: {e}"))),
        None => Ok(None),
    }
}

pub fn get_id<K: IdKind>(row: &SqliteRow, col: &str) -> Result<EntityId<K>, VaultError> {
    let text = get_string(row, col)?;
    EntityId::parse(&text).map_err(|e| VaultError::Internal(format!("bad id in {col}: {e}")))
}

/// Formats a timestamp for binding.
pub fn ts(value: &DateTime<Utc>) -> String {
    datetime_serde::format_rfc3339_millis(value)
}

pub fn opt_ts(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(ts)
}
