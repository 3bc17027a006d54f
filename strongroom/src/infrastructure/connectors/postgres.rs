// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! PostgreSQL connector over sqlx.
//!
//! Sessions are short-lived: one bounded pool per operation, torn down when
//! the operation completes, so rotated admin credentials can never be served
//! from a stale pool.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use strongroom_domain::entities::{DatabaseConfig, DatabaseRole};
use strongroom_domain::VaultError;

use super::{
    connector_err, escape_identifier, escape_literal, render_statements, AdminCredentials,
    DatabaseConnector,
};

pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }

    async fn connect(
        &self,
        config: &DatabaseConfig,
        username: &str,
        password: &str,
    ) -> Result<PgPool, VaultError> {
        let options = PgConnectOptions::from_str(&config.connection_url)
            .map_err(connector_err)?
            .username(username)
            .password(password);
        PgPoolOptions::new()
            .max_connections(config.max_connections.min(4))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(connector_err)
    }

    async fn execute_all(&self, pool: &PgPool, statements: &[String]) -> Result<(), VaultError> {
        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(connector_err)?;
        }
        Ok(())
    }
}

impl Default for PostgresConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    async fn verify_connection(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
    ) -> Result<(), VaultError> {
        let pool = self.connect(config, &admin.username, &admin.password).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connector_err)?;
        pool.close().await;
        Ok(())
    }

    async fn create_user(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        role: &DatabaseRole,
        username: &str,
        password: &str,
        expiration: &str,
    ) -> Result<(), VaultError> {
        let statements = render_statements(&role.creation_statements, username, password, expiration);
        if statements.is_empty() {
            return Err(VaultError::InvalidArgument(
                "role has no creation statements".into(),
            ));
        }
        let pool = self.connect(config, &admin.username, &admin.password).await?;
        let result = self.execute_all(&pool, &statements).await;

        // A partial multi-statement failure leaves debris; run the rollback
        // statements before surfacing the error.
        if result.is_err() {
            if let Some(rollback) = &role.rollback_statements {
                let statements = render_statements(rollback, username, password, expiration);
                let _ = self.execute_all(&pool, &statements).await;
            }
        }
        pool.close().await;
        result
    }

    async fn revoke_user(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        role: Option<&DatabaseRole>,
        username: &str,
    ) -> Result<(), VaultError> {
        let statements = match role.and_then(|r| r.revocation_statements.as_deref()) {
            Some(template) => render_statements(template, username, "", ""),
            None => vec![format!(
                "DROP USER IF EXISTS \"{}\"",
                escape_identifier(username)
            )],
        };
        let pool = self.connect(config, &admin.username, &admin.password).await?;
        let result = self.execute_all(&pool, &statements).await;
        pool.close().await;
        result
    }

    async fn rotate_root(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        new_password: &str,
    ) -> Result<(), VaultError> {
        let pool = self.connect(config, &admin.username, &admin.password).await?;
        let statement = format!(
            "ALTER USER \"{}\" WITH PASSWORD '{}'",
            escape_identifier(&admin.username),
            escape_literal(new_password)
        );
        let result = sqlx::query(&statement)
            .execute(&pool)
            .await
            .map(|_| ())
            .map_err(connector_err);
        pool.close().await;
        result?;

        // Prove the new credential works before the caller persists it.
        let verify_pool = self.connect(config, &admin.username, new_password).await?;
        sqlx::query("SELECT 1")
            .execute(&verify_pool)
            .await
            .map_err(connector_err)?;
        verify_pool.close().await;
        Ok(())
    }
}
