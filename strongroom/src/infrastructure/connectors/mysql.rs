// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! MySQL connector over sqlx. Mirrors the Postgres connector apart from the
//! quoting dialect and the `'user'@'%'` account form.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use strongroom_domain::entities::{DatabaseConfig, DatabaseRole};
use strongroom_domain::VaultError;

use super::{connector_err, escape_literal, render_statements, AdminCredentials, DatabaseConnector};

pub struct MysqlConnector;

impl MysqlConnector {
    pub fn new() -> Self {
        Self
    }

    async fn connect(
        &self,
        config: &DatabaseConfig,
        username: &str,
        password: &str,
    ) -> Result<MySqlPool, VaultError> {
        let options = MySqlConnectOptions::from_str(&config.connection_url)
            .map_err(connector_err)?
            .username(username)
            .password(password);
        MySqlPoolOptions::new()
            .max_connections(config.max_connections.min(4))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(connector_err)
    }

    async fn execute_all(&self, pool: &MySqlPool, statements: &[String]) -> Result<(), VaultError> {
        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(connector_err)?;
        }
        Ok(())
    }
}

impl Default for MysqlConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseConnector for MysqlConnector {
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
                "DROP USER IF EXISTS '{}'@'%'",
                escape_literal(username)
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
            "ALTER USER '{}'@'%' IDENTIFIED BY '{}'",
            escape_literal(&admin.username),
            escape_literal(new_password)
        );
        let result = sqlx::query(&statement)
            .execute(&pool)
            .await
            .map(|_| ())
            .map_err(connector_err);
        pool.close().await;
        result?;

        let verify_pool = self.connect(config, &admin.username, new_password).await?;
        sqlx::query("SELECT 1")
            .execute(&verify_pool)
            .await
            .map_err(connector_err)?;
        verify_pool.close().await;
        Ok(())
    }
}
