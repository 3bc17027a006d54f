// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by repository implementations.
//!
//! Applies migrations on start-up so integration tests and services see a
//! consistent database.

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Runs pending migrations against the provided SQLite pool.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("ensuring database schema is up to date");
    sqlx::migrate!("../migrations").run(pool).await?;
    info!("database schema is up to date");
    Ok(())
}

/// Creates the SQLite database file if it doesn't exist yet.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("created new SQLite database: {}", database_url);
    }
    Ok(())
}

/// Creates the database if missing, connects, and migrates. The one-call
/// startup path.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with schema applied. A single connection keeps every
/// handle on the same memory database; tests and examples use this.
pub async fn in_memory_database() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}
