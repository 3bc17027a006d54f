// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared test harness: an in-memory vault with a fixed KEK and a mock
//! database connector that simulates an external database in memory.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose;
use base64::Engine as _;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use strongroom::application::{Caller, Vault};
use strongroom::infrastructure::connectors::{
    AdminCredentials, ConnectorFactory, DatabaseConnector,
};
use strongroom::infrastructure::repositories::schema;
use strongroom_bootstrap::EnvKekProvider;
use strongroom_domain::entities::{DatabaseConfig, DatabasePlugin, DatabaseRole};
use strongroom_domain::services::SubjectAttributes;
use strongroom_domain::VaultError;

/// Fixed 32-byte KEK for tests, base64-encoded.
pub fn test_kek_b64() -> String {
    general_purpose::STANDARD.encode([7u8; 32])
}

/// A second, different KEK of the same length.
pub fn other_kek_b64() -> String {
    general_purpose::STANDARD.encode([8u8; 32])
}

/// In-memory stand-in for an external database: a set of live usernames
/// plus failure injection for revocation-retry tests.
#[derive(Default)]
pub struct MockDatabase {
    pub users: Mutex<HashSet<String>>,
    pub fail_revocations: AtomicBool,
    pub admin_password: Mutex<Option<String>>,
}

impl MockDatabase {
    pub fn has_user(&self, username: &str) -> bool {
        self.users.lock().unwrap().contains(username)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn set_fail_revocations(&self, fail: bool) {
        self.fail_revocations.store(fail, Ordering::SeqCst);
    }
}

pub struct MockConnector {
    pub database: Arc<MockDatabase>,
}

#[async_trait]
impl DatabaseConnector for MockConnector {
    async fn verify_connection(
        &self,
        _config: &DatabaseConfig,
        _admin: &AdminCredentials,
    ) -> Result<(), VaultError> {
        Ok(())
    }

    async fn create_user(
        &self,
        _config: &DatabaseConfig,
        _admin: &AdminCredentials,
        _role: &DatabaseRole,
        username: &str,
        _password: &str,
        _expiration: &str,
    ) -> Result<(), VaultError> {
        self.database
            .users
            .lock()
            .unwrap()
            .insert(username.to_string());
        Ok(())
    }

    async fn revoke_user(
        &self,
        _config: &DatabaseConfig,
        _admin: &AdminCredentials,
        _role: Option<&DatabaseRole>,
        username: &str,
    ) -> Result<(), VaultError> {
        if self.database.fail_revocations.load(Ordering::SeqCst) {
            return Err(VaultError::ConnectorError("injected revocation failure".into()));
        }
        self.database.users.lock().unwrap().remove(username);
        Ok(())
    }

    async fn rotate_root(
        &self,
        _config: &DatabaseConfig,
        _admin: &AdminCredentials,
        new_password: &str,
    ) -> Result<(), VaultError> {
        *self.database.admin_password.lock().unwrap() = Some(new_password.to_string());
        Ok(())
    }
}

pub struct MockConnectorFactory {
    pub database: Arc<MockDatabase>,
}

impl ConnectorFactory for MockConnectorFactory {
    fn connector_for(
        &self,
        _plugin: DatabasePlugin,
    ) -> Result<Arc<dyn DatabaseConnector>, VaultError> {
        Ok(Arc::new(MockConnector {
            database: self.database.clone(),
        }))
    }
}

/// A full vault over an in-memory database and the mock connector.
pub struct TestVault {
    pub vault: Vault,
    pub pool: SqlitePool,
    pub external_db: Arc<MockDatabase>,
}

pub async fn test_vault() -> TestVault {
    test_vault_with_kek(&test_kek_b64()).await
}

pub async fn test_vault_with_kek(kek_b64: &str) -> TestVault {
    let pool = schema::in_memory_database().await.unwrap();
    vault_over(pool, kek_b64).await
}

/// Builds a vault over an existing pool (used to simulate a restart with a
/// different KEK against the same store).
pub async fn vault_over(pool: SqlitePool, kek_b64: &str) -> TestVault {
    let kek = Arc::new(EnvKekProvider::from_base64(kek_b64).unwrap());
    let external_db = Arc::new(MockDatabase::default());
    let connectors = Arc::new(MockConnectorFactory {
        database: external_db.clone(),
    });
    let vault = Vault::with_connectors(pool.clone(), kek, connectors)
        .await
        .unwrap();
    TestVault {
        vault,
        pool,
        external_db,
    }
}

/// A caller holding the seeded `admin` role.
pub fn admin_caller() -> Caller {
    caller_with_roles("root", &["admin"])
}

pub fn caller_with_roles(id: &str, roles: &[&str]) -> Caller {
    Caller::new(SubjectAttributes {
        id: id.into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        groups: vec![],
        attributes: serde_json::Map::new(),
    })
}

/// Initializes and leaves the vault unsealed; returns the shares and root
/// token.
pub async fn initialize(vault: &Vault, n: u8, t: u8) -> (Vec<String>, String) {
    let result = vault.seal.initialize(n, t).await.unwrap();
    (result.shares, result.root_token)
}
