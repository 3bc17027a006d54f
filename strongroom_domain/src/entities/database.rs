// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Connection and Role Entities
//!
//! Configuration for the dynamic-credentials engine: a [`DatabaseConfig`]
//! names an external database and carries the (encrypted) administrative
//! credential; a [`DatabaseRole`] binds statement templates and TTL bounds
//! to that database. The admin password is stored as an AEAD envelope under
//! the master key and decrypted only for the duration of a connector call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::services::datetime_serde;
use crate::value_objects::{DatabaseConfigId, DatabaseRoleId};
use crate::VaultError;

/// Supported connector plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabasePlugin {
    Postgres,
    Mysql,
    SqlServer,
    MongoDb,
    Oracle,
    Cassandra,
    Elasticsearch,
}

impl DatabasePlugin {
    pub const ALL: [DatabasePlugin; 7] = [
        Self::Postgres,
        Self::Mysql,
        Self::SqlServer,
        Self::MongoDb,
        Self::Oracle,
        Self::Cassandra,
        Self::Elasticsearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::SqlServer => "sqlserver",
            Self::MongoDb => "mongodb",
            Self::Oracle => "oracle",
            Self::Cassandra => "cassandra",
            Self::Elasticsearch => "elasticsearch",
        }
    }
}

impl Display for DatabasePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatabasePlugin {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| VaultError::InvalidArgument(format!("unknown database plugin '{s}'")))
    }
}

/// A configured external database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub id: DatabaseConfigId,
    pub name: String,
    pub plugin: DatabasePlugin,
    pub connection_url: String,
    pub admin_username: String,
    /// Base64 AEAD envelope of the admin password under the master key.
    pub encrypted_admin_password: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    /// Plugin-specific options passed through to the connector.
    pub options: HashMap<String, String>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "datetime_serde::option")]
    pub password_rotated_at: Option<DateTime<Utc>>,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.name.is_empty() {
            return Err(VaultError::InvalidArgument(
                "database name cannot be empty".into(),
            ));
        }
        if self.connection_url.is_empty() {
            return Err(VaultError::InvalidArgument(
                "connection URL cannot be empty".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(VaultError::InvalidArgument(
                "max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Records a successful root-credential rotation.
    pub fn record_rotation(&mut self, new_encrypted_password: String, now: DateTime<Utc>) {
        self.encrypted_admin_password = new_encrypted_password;
        self.password_rotated_at = Some(now);
        self.updated_at = now;
    }
}

/// A role template on a configured database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseRole {
    pub id: DatabaseRoleId,
    pub database_name: String,
    pub name: String,
    /// Statement template executed to create the dynamic user. Supports the
    /// `{{name}}`, `{{password}}`, and `{{expiration}}` placeholders.
    pub creation_statements: String,
    pub revocation_statements: Option<String>,
    pub rollback_statements: Option<String>,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub renewable: bool,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl DatabaseRole {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.name.is_empty() || self.database_name.is_empty() {
            return Err(VaultError::InvalidArgument(
                "role and database names cannot be empty".into(),
            ));
        }
        if self.creation_statements.trim().is_empty() {
            return Err(VaultError::InvalidArgument(
                "creation statements cannot be empty".into(),
            ));
        }
        if self.default_ttl_secs == 0 || self.max_ttl_secs == 0 {
            return Err(VaultError::InvalidArgument(
                "TTLs must be positive".into(),
            ));
        }
        if self.default_ttl_secs > self.max_ttl_secs {
            return Err(VaultError::InvalidArgument(format!(
                "default TTL {}s exceeds max TTL {}s",
                self.default_ttl_secs, self.max_ttl_secs
            )));
        }
        Ok(())
    }

    /// Clamps a requested TTL to the role's bounds; None means default.
    pub fn resolve_ttl(&self, requested_secs: Option<u64>) -> Result<u64, VaultError> {
        match requested_secs {
            None => Ok(self.default_ttl_secs),
            Some(0) => Err(VaultError::InvalidArgument("TTL must be positive".into())),
            Some(secs) if secs > self.max_ttl_secs => Err(VaultError::InvalidArgument(format!(
                "requested TTL {}s exceeds role maximum {}s",
                secs, self.max_ttl_secs
            ))),
            Some(secs) => Ok(secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> DatabaseRole {
        DatabaseRole {
            id: DatabaseRoleId::new(),
            database_name: "db1".into(),
            name: "readonly".into(),
            creation_statements: "CREATE USER \"{{name}}\" WITH PASSWORD '{{password}}'".into(),
            revocation_statements: None,
            rollback_statements: None,
            default_ttl_secs: 3600,
            max_ttl_secs: 86400,
            renewable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plugin_round_trip() {
        for p in DatabasePlugin::ALL {
            assert_eq!(p.as_str().parse::<DatabasePlugin>().unwrap(), p);
        }
        assert!("db2".parse::<DatabasePlugin>().is_err());
    }

    #[test]
    fn ttl_bounds() {
        let r = role();
        assert_eq!(r.resolve_ttl(None).unwrap(), 3600);
        assert_eq!(r.resolve_ttl(Some(7200)).unwrap(), 7200);
        assert!(r.resolve_ttl(Some(0)).is_err());
        assert!(r.resolve_ttl(Some(100_000)).is_err());
    }

    #[test]
    fn role_validation() {
        let mut r = role();
        assert!(r.validate().is_ok());
        r.default_ttl_secs = 90_000;
        assert!(r.validate().is_err());
        r.default_ttl_secs = 0;
        assert!(r.validate().is_err());
    }
}
