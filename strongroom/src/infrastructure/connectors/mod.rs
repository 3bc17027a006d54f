// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Connectors
//!
//! The pluggable boundary between the dynamic-credentials engine and
//! external databases. A connector implements four operations against an
//! admin session: verify connectivity, create a dynamic user from a
//! statement template, revoke a user, and rotate the root credential.
//!
//! Postgres and MySQL connectors ship in this module over sqlx. The other
//! plugin tags are declared (configurations referencing them store and
//! validate) but resolve to `ConnectorError` when a session is attempted —
//! their wire stacks are not linked into this build.
//!
//! ## Statement templates
//!
//! Role templates are plain SQL with `{{name}}`, `{{password}}`, and
//! `{{expiration}}` placeholders, `;`-separated for multi-statement setups:
//!
//! ```sql
//! CREATE USER "{{name}}" WITH PASSWORD '{{password}}' VALID UNTIL '{{expiration}}';
//! GRANT SELECT ON ALL TABLES IN SCHEMA public TO "{{name}}"
//! ```
//!
//! The engine — not the connector — generates both the username and the
//! password; connectors only substitute and execute.

pub mod mysql;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

use strongroom_domain::entities::{DatabaseConfig, DatabasePlugin, DatabaseRole};
use strongroom_domain::VaultError;

pub use mysql::MysqlConnector;
pub use postgres::PostgresConnector;

/// Decrypted administrative credentials, wiped on drop.
pub struct AdminCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

/// One external-database integration.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Opens an admin session and runs a trivial probe.
    async fn verify_connection(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
    ) -> Result<(), VaultError>;

    /// Executes the role's creation statements for a freshly generated
    /// (username, password) pair.
    async fn create_user(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        role: &DatabaseRole,
        username: &str,
        password: &str,
        expiration: &str,
    ) -> Result<(), VaultError>;

    /// Removes a dynamic user, using the role's revocation statements when
    /// present and the plugin's default drop otherwise.
    async fn revoke_user(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        role: Option<&DatabaseRole>,
        username: &str,
    ) -> Result<(), VaultError>;

    /// Sets a new admin password and verifies connectivity with it before
    /// returning. On error the old credential is still in force.
    async fn rotate_root(
        &self,
        config: &DatabaseConfig,
        admin: &AdminCredentials,
        new_password: &str,
    ) -> Result<(), VaultError>;
}

/// Resolves a connector from a configuration's plugin tag.
pub trait ConnectorFactory: Send + Sync {
    fn connector_for(&self, plugin: DatabasePlugin) -> Result<Arc<dyn DatabaseConnector>, VaultError>;
}

/// Production factory over the sqlx drivers linked into this build.
pub struct SqlxConnectorFactory {
    postgres: Arc<dyn DatabaseConnector>,
    mysql: Arc<dyn DatabaseConnector>,
}

impl SqlxConnectorFactory {
    pub fn new() -> Self {
        Self {
            postgres: Arc::new(PostgresConnector::new()),
            mysql: Arc::new(MysqlConnector::new()),
        }
    }
}

impl Default for SqlxConnectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorFactory for SqlxConnectorFactory {
    fn connector_for(
        &self,
        plugin: DatabasePlugin,
    ) -> Result<Arc<dyn DatabaseConnector>, VaultError> {
        match plugin {
            DatabasePlugin::Postgres => Ok(self.postgres.clone()),
            DatabasePlugin::Mysql => Ok(self.mysql.clone()),
            other => Err(VaultError::ConnectorError(format!(
                "no connector built in for plugin '{other}'"
            ))),
        }
    }
}

/// Substitutes template placeholders and splits into statements.
pub fn render_statements(template: &str, username: &str, password: &str, expiration: &str) -> Vec<String> {
    template
        .replace("{{name}}", username)
        .replace("{{password}}", password)
        .replace("{{expiration}}", expiration)
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Escapes a string literal for embedding in generated SQL.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escapes a double-quoted identifier.
pub fn escape_identifier(value: &str) -> String {
    value.replace('"', "\"\"")
}

pub(crate) fn connector_err(e: impl std::fmt::Display) -> VaultError {
    VaultError::ConnectorError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_splits_statements() {
        let statements = render_statements(
            "CREATE USER \"{{name}}\" WITH PASSWORD '{{password}}' VALID UNTIL '{{expiration}}';\n\
             GRANT SELECT ON t TO \"{{name}}\";",
            "v-ro-1234",
            "pw",
            "2025-01-01T00:00:00.000Z",
        );
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("v-ro-1234"));
        assert!(statements[0].contains("VALID UNTIL '2025-01-01T00:00:00.000Z'"));
        assert!(statements[1].starts_with("GRANT"));
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_literal("a'b"), "a''b");
        assert_eq!(escape_identifier("a\"b"), "a\"\"b");
    }

    #[test]
    fn factory_rejects_unlinked_plugins() {
        let factory = SqlxConnectorFactory::new();
        assert!(factory.connector_for(DatabasePlugin::Postgres).is_ok());
        assert!(factory.connector_for(DatabasePlugin::Mysql).is_ok());
        for plugin in [
            DatabasePlugin::SqlServer,
            DatabasePlugin::MongoDb,
            DatabasePlugin::Oracle,
            DatabasePlugin::Cassandra,
            DatabasePlugin::Elasticsearch,
        ] {
            assert!(matches!(
                factory.connector_for(plugin),
                Err(VaultError::ConnectorError(_))
            ));
        }
    }
}
