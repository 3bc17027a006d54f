// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Database Credentials Engine
//!
//! Issues short-lived accounts on external databases through the connector
//! boundary and tracks every issuance as a lease with guaranteed
//! revocation. The engine — never the connector — generates usernames and
//! passwords; the plaintext password is returned to the caller exactly
//! once and persisted only as an AEAD envelope.
//!
//! ## Lease lifecycle
//!
//! The background sweeper scans for expired, unrevoked leases and drives
//! the connector's revoke path. Connector failures park the lease as
//! revoke-pending and retry with exponential backoff (1s base, 5min cap,
//! 10 attempts) before the lease is surfaced as a failed revocation for
//! operator attention.
//!
//! ## Rollback on partial failure
//!
//! If the external user was created but the lease insert fails (storage
//! error, cancellation at the suspension point), the engine invokes the
//! connector's revoke path before surfacing the error — no untracked
//! accounts.
//!
//! Static-credential rotation is deliberately unsupported; the design
//! directs callers to dynamic credentials.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use strongroom_bootstrap::CancellationToken;
use strongroom_domain::entities::{
    AuditStatus, CredentialLease, DatabaseConfig, DatabasePlugin, DatabaseRole,
};
use strongroom_domain::repositories::{AuditRepository, DatabaseRepository, LeaseRepository};
use strongroom_domain::services::{datetime_serde, EncryptionService};
use strongroom_domain::value_objects::{DatabaseConfigId, DatabaseRoleId, LeaseId};
use strongroom_domain::VaultError;

use crate::application::context::Caller;
use crate::application::services::authz_service::AuthorizationService;
use crate::infrastructure::adapters::encryption::random_bytes;
use crate::infrastructure::connectors::{AdminCredentials, ConnectorFactory, DatabaseConnector};

/// Per-operation connector timeout.
pub const CONNECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Revocation retry schedule: base 1s, cap 5min, then operator attention.
const REVOKE_BACKOFF_BASE_SECS: u64 = 1;
const REVOKE_BACKOFF_CAP_SECS: u64 = 300;
const REVOKE_MAX_ATTEMPTS: u32 = 10;

/// Sweep batch size per pass.
const SWEEP_BATCH: u32 = 100;

const PASSWORD_LEN: usize = 32;
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Parameters for configuring an external database.
#[derive(Debug, Clone)]
pub struct DatabaseConfigParams {
    pub name: String,
    pub plugin: DatabasePlugin,
    pub connection_url: String,
    pub admin_username: String,
    pub admin_password: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub options: HashMap<String, String>,
}

/// Parameters for defining a role on a database.
#[derive(Debug, Clone)]
pub struct DatabaseRoleParams {
    pub database_name: String,
    pub name: String,
    pub creation_statements: String,
    pub revocation_statements: Option<String>,
    pub rollback_statements: Option<String>,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub renewable: bool,
}

/// What the caller receives at issuance — the only time the password
/// exists in plaintext outside the external database.
pub struct IssuedCredentials {
    pub lease_id: LeaseId,
    pub username: String,
    pub password: Zeroizing<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// The dynamic-credentials engine.
pub struct DbCredsService {
    databases: Arc<dyn DatabaseRepository>,
    leases: Arc<dyn LeaseRepository>,
    encryption: Arc<dyn EncryptionService>,
    connectors: Arc<dyn ConnectorFactory>,
    authz: Arc<AuthorizationService>,
    audit: Arc<dyn AuditRepository>,
}

impl DbCredsService {
    pub fn new(
        databases: Arc<dyn DatabaseRepository>,
        leases: Arc<dyn LeaseRepository>,
        encryption: Arc<dyn EncryptionService>,
        connectors: Arc<dyn ConnectorFactory>,
        authz: Arc<AuthorizationService>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            databases,
            leases,
            encryption,
            connectors,
            authz,
            audit,
        }
    }

    async fn enforce(
        &self,
        caller: &Caller,
        action: &str,
        resource_id: String,
    ) -> Result<(), VaultError> {
        let ctx = caller.request(action, "database", Some(resource_id));
        self.authz.enforce(caller, &ctx).await
    }

    async fn with_timeout<T>(
        &self,
        operation: impl std::future::Future<Output = Result<T, VaultError>>,
    ) -> Result<T, VaultError> {
        timeout(CONNECTOR_TIMEOUT, operation)
            .await
            .map_err(|_| VaultError::ConnectorError("connector operation timed out".into()))?
    }

    fn admin_credentials(&self, config: &DatabaseConfig) -> Result<AdminCredentials, VaultError> {
        let password = self
            .encryption
            .decrypt_string(&config.encrypted_admin_password, Some(config.name.as_bytes()))?;
        Ok(AdminCredentials {
            username: config.admin_username.clone(),
            password: Zeroizing::new(password),
        })
    }

    async fn load_config(&self, name: &str) -> Result<DatabaseConfig, VaultError> {
        self.databases
            .find_config(name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("database '{name}'")))
    }

    async fn load_role(&self, database: &str, role: &str) -> Result<DatabaseRole, VaultError> {
        self.databases
            .find_role(database, role)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("role '{role}' on database '{database}'")))
    }

    fn connector(&self, config: &DatabaseConfig) -> Result<Arc<dyn DatabaseConnector>, VaultError> {
        self.connectors.connector_for(config.plugin)
    }

    // --- Configuration ---

    /// Registers (or updates) an external database after verifying the
    /// admin credentials actually connect.
    pub async fn configure_database(
        &self,
        caller: &Caller,
        params: DatabaseConfigParams,
    ) -> Result<(), VaultError> {
        self.enforce(caller, "write", params.name.clone()).await?;

        let now = chrono::Utc::now();
        let existing = self.databases.find_config(&params.name).await?;
        let encrypted_admin_password = self
            .encryption
            .encrypt_string(&params.admin_password, Some(params.name.as_bytes()))?;

        let config = DatabaseConfig {
            id: existing
                .as_ref()
                .map(|c| c.id)
                .unwrap_or_else(DatabaseConfigId::new),
            name: params.name.clone(),
            plugin: params.plugin,
            connection_url: params.connection_url,
            admin_username: params.admin_username.clone(),
            encrypted_admin_password,
            max_connections: params.max_connections,
            connect_timeout_secs: params.connect_timeout_secs,
            options: params.options,
            created_at: existing.as_ref().map(|c| c.created_at).unwrap_or(now),
            updated_at: now,
            password_rotated_at: existing.and_then(|c| c.password_rotated_at),
        };
        config.validate()?;

        let connector = self.connector(&config)?;
        let admin = AdminCredentials {
            username: params.admin_username,
            password: Zeroizing::new(params.admin_password),
        };
        self.with_timeout(connector.verify_connection(&config, &admin))
            .await?;

        // The password lands in the snapshot redacted, never in plaintext.
        let audit = caller
            .audit("write", "database", Some(config.name.clone()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "name": config.name,
                "plugin": config.plugin.as_str(),
                "admin_username": config.admin_username,
                "password": "present",
            }));
        self.databases.save_config(&config, audit).await?;
        info!(database = %config.name, plugin = %config.plugin, "database configured");
        Ok(())
    }

    pub async fn create_role(
        &self,
        caller: &Caller,
        params: DatabaseRoleParams,
    ) -> Result<(), VaultError> {
        let resource = format!("{}/{}", params.database_name, params.name);
        self.enforce(caller, "write", resource.clone()).await?;

        // The database must exist before roles attach to it.
        self.load_config(&params.database_name).await?;

        let now = chrono::Utc::now();
        let existing = self
            .databases
            .find_role(&params.database_name, &params.name)
            .await?;
        let role = DatabaseRole {
            id: existing.as_ref().map(|r| r.id).unwrap_or_else(DatabaseRoleId::new),
            database_name: params.database_name,
            name: params.name,
            creation_statements: params.creation_statements,
            revocation_statements: params.revocation_statements,
            rollback_statements: params.rollback_statements,
            default_ttl_secs: params.default_ttl_secs,
            max_ttl_secs: params.max_ttl_secs,
            renewable: params.renewable,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        role.validate()?;

        let audit = caller
            .audit("write", "database_role", Some(resource), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "default_ttl_secs": role.default_ttl_secs,
                "max_ttl_secs": role.max_ttl_secs,
            }));
        self.databases.save_role(&role, audit).await
    }

    // --- Issuance and lease lifecycle ---

    /// Issues a dynamic credential: creates the user on the external
    /// database and records the lease. The plaintext password is returned
    /// exactly once.
    pub async fn issue(
        &self,
        caller: &Caller,
        database: &str,
        role_name: &str,
        requested_ttl_secs: Option<u64>,
    ) -> Result<IssuedCredentials, VaultError> {
        let resource = format!("{database}/{role_name}");
        self.enforce(caller, "issue", resource.clone()).await?;

        let config = self.load_config(database).await?;
        let role = self.load_role(database, role_name).await?;
        let ttl_secs = role.resolve_ttl(requested_ttl_secs)?;

        let admin = self.admin_credentials(&config)?;
        let connector = self.connector(&config)?;

        let username = generate_username(role_name)?;
        let password = generate_password()?;
        let now = chrono::Utc::now();
        let expiration =
            datetime_serde::format_rfc3339_millis(&(now + chrono::Duration::seconds(ttl_secs as i64)));

        self.with_timeout(connector.create_user(
            &config,
            &admin,
            &role,
            &username,
            &password,
            &expiration,
        ))
        .await?;

        let encrypted_password = self
            .encryption
            .encrypt_string(&password, Some(username.as_bytes()))?;
        let lease = CredentialLease::issue(
            database.to_string(),
            role_name.to_string(),
            username.clone(),
            encrypted_password,
            ttl_secs,
            role.max_ttl_secs,
            role.renewable,
            now,
        );

        let audit = caller
            .audit("issue", "database_creds", Some(resource), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "lease_id": lease.id.to_string(),
                "username": username,
                "ttl_secs": ttl_secs,
            }));
        if let Err(e) = self.leases.insert(&lease, audit).await {
            // The external user exists but the lease does not: roll the
            // external side back before surfacing the failure.
            warn!(username = %username, error = %e, "lease insert failed, revoking external user");
            let _ = self
                .with_timeout(connector.revoke_user(&config, &admin, Some(&role), &username))
                .await;
            return Err(e);
        }

        info!(lease = %lease.id, database, role = role_name, "credentials issued");
        Ok(IssuedCredentials {
            lease_id: lease.id,
            username,
            password: Zeroizing::new(password),
            expires_at: lease.expires_at,
        })
    }

    /// Renews a lease by the role's default TTL, bounded by the ceiling
    /// fixed at issuance.
    pub async fn renew(
        &self,
        caller: &Caller,
        lease_id: LeaseId,
    ) -> Result<chrono::DateTime<chrono::Utc>, VaultError> {
        self.enforce(caller, "renew", lease_id.to_string()).await?;

        let mut lease = self
            .leases
            .find(lease_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("lease {lease_id}")))?;
        let role = self.load_role(&lease.database_name, &lease.role_name).await?;

        let new_expiry = lease.renew(role.default_ttl_secs, chrono::Utc::now())?;
        let audit = caller
            .audit("renew", "lease", Some(lease_id.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "expires_at": datetime_serde::format_rfc3339_millis(&new_expiry),
            }));
        self.leases.update(&lease, Some(audit)).await?;
        Ok(new_expiry)
    }

    /// Looks up a lease by id. The encrypted password is not part of the
    /// readout — the plaintext left the engine exactly once at issuance.
    pub async fn lookup(
        &self,
        caller: &Caller,
        lease_id: LeaseId,
    ) -> Result<CredentialLease, VaultError> {
        self.enforce(caller, "read", lease_id.to_string()).await?;
        let mut lease = self
            .leases
            .find(lease_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("lease {lease_id}")))?;
        lease.encrypted_password = String::new();
        Ok(lease)
    }

    /// All leases issued against a database, ciphertext withheld.
    pub async fn list_leases(
        &self,
        caller: &Caller,
        database: &str,
    ) -> Result<Vec<CredentialLease>, VaultError> {
        self.enforce(caller, "read", database.to_string()).await?;
        let mut leases = self.leases.list_by_database(database).await?;
        for lease in &mut leases {
            lease.encrypted_password = String::new();
        }
        Ok(leases)
    }

    /// Revokes a lease immediately. Revoking an already-revoked lease is a
    /// no-op.
    pub async fn revoke(&self, caller: &Caller, lease_id: LeaseId) -> Result<(), VaultError> {
        self.enforce(caller, "revoke", lease_id.to_string()).await?;

        let lease = self
            .leases
            .find(lease_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("lease {lease_id}")))?;
        if lease.revoked {
            return Ok(());
        }
        self.revoke_lease(caller, lease).await
    }

    /// Shared revocation path for the public API and the sweeper.
    async fn revoke_lease(
        &self,
        actor: &Caller,
        mut lease: CredentialLease,
    ) -> Result<(), VaultError> {
        let now = chrono::Utc::now();
        let config = self.load_config(&lease.database_name).await?;
        let role = self
            .databases
            .find_role(&lease.database_name, &lease.role_name)
            .await?;
        let admin = self.admin_credentials(&config)?;
        let connector = self.connector(&config)?;

        let revocation = self
            .with_timeout(connector.revoke_user(&config, &admin, role.as_ref(), &lease.username))
            .await;

        match revocation {
            Ok(()) => {
                lease.mark_revoked(now);
                let audit = actor
                    .audit("revoke", "lease", Some(lease.id.to_string()), AuditStatus::Success)
                    .with_new_value(serde_json::json!({ "username": lease.username }));
                self.leases.update(&lease, Some(audit)).await?;
                info!(lease = %lease.id, "lease revoked");
                Ok(())
            }
            Err(e) => {
                lease.mark_revoke_failed(now);
                self.leases.update(&lease, None).await?;
                warn!(lease = %lease.id, attempts = lease.revoke_attempts, error = %e,
                      "connector revocation failed, lease parked revoke-pending");
                Err(e)
            }
        }
    }

    // --- Root credential rotation ---

    /// Rotates the administrative password: sets a fresh random password on
    /// the external database, verifies it, and only then persists it. On
    /// any failure the old credential remains in force.
    pub async fn rotate_root(&self, caller: &Caller, database: &str) -> Result<(), VaultError> {
        self.enforce(caller, "rotate_root", database.to_string())
            .await?;

        let mut config = self.load_config(database).await?;
        let admin = self.admin_credentials(&config)?;
        let connector = self.connector(&config)?;

        let new_password = generate_password()?;
        self.with_timeout(connector.rotate_root(&config, &admin, &new_password))
            .await?;

        let now = chrono::Utc::now();
        let encrypted = self
            .encryption
            .encrypt_string(&new_password, Some(config.name.as_bytes()))?;
        config.record_rotation(encrypted, now);

        let audit = caller
            .audit("rotate_root", "database", Some(database.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "rotated_at": datetime_serde::format_rfc3339_millis(&now),
            }));
        self.databases.save_config(&config, audit).await?;
        info!(database, "root credentials rotated");
        Ok(())
    }

    /// Static-credential rotation is not part of this design.
    pub async fn rotate_static_credentials(
        &self,
        _caller: &Caller,
        _database: &str,
        _username: &str,
    ) -> Result<(), VaultError> {
        Err(VaultError::Unsupported(
            "static credential rotation is not supported; use dynamic credentials".into(),
        ))
    }

    // --- Sweeper ---

    /// One sweep pass: revoke expired leases whose backoff window has
    /// elapsed. Returns the number revoked.
    pub async fn sweep_expired(&self) -> Result<u32, VaultError> {
        let now = chrono::Utc::now();
        let system = Caller::system();
        let expired = self.leases.find_expired_unrevoked(now, SWEEP_BATCH).await?;

        let mut revoked = 0;
        for lease in expired {
            if lease.revoke_pending {
                if lease.revoke_attempts >= REVOKE_MAX_ATTEMPTS {
                    error!(lease = %lease.id, username = %lease.username,
                           attempts = lease.revoke_attempts,
                           "lease revocation exhausted retries; operator attention required");
                    continue;
                }
                let backoff = revoke_backoff(lease.revoke_attempts);
                if now < lease.updated_at + chrono::Duration::seconds(backoff as i64) {
                    continue;
                }
            }
            if self.revoke_lease(&system, lease).await.is_ok() {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    /// Spawns the background lease-revocation sweeper.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        token: CancellationToken,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("lease sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match service.sweep_expired().await {
                            Ok(0) => {}
                            Ok(count) => info!(count, "lease sweep revoked expired leases"),
                            Err(e) => warn!(error = %e, "lease sweep pass failed"),
                        }
                    }
                }
            }
        })
    }
}

fn revoke_backoff(attempts: u32) -> u64 {
    REVOKE_BACKOFF_BASE_SECS
        .saturating_mul(1u64 << attempts.min(16))
        .min(REVOKE_BACKOFF_CAP_SECS)
}

/// `v-<role>-<random>`: recognizable in database user lists, unique per
/// issuance, bounded for picky identifier limits.
fn generate_username(role_name: &str) -> Result<String, VaultError> {
    let role_part: String = role_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();
    let random = random_bytes(6)?;
    Ok(format!("v-{}-{}", role_part, hex::encode(&*random)))
}

fn generate_password() -> Result<String, VaultError> {
    let bytes = random_bytes(PASSWORD_LEN)?;
    Ok(bytes
        .iter()
        .map(|b| PASSWORD_ALPHABET[(*b as usize) % PASSWORD_ALPHABET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule() {
        assert_eq!(revoke_backoff(0), 1);
        assert_eq!(revoke_backoff(1), 2);
        assert_eq!(revoke_backoff(5), 32);
        assert_eq!(revoke_backoff(9), 300, "capped at five minutes");
        assert_eq!(revoke_backoff(30), 300);
    }

    #[test]
    fn username_shape() {
        let name = generate_username("read-only").unwrap();
        assert!(name.starts_with("v-readonly-"));
        assert!(name.len() <= 32);
        assert_ne!(name, generate_username("read-only").unwrap());
    }

    #[test]
    fn password_shape() {
        let password = generate_password().unwrap();
        assert_eq!(password.len(), PASSWORD_LEN);
        assert!(password
            .bytes()
            .all(|b| PASSWORD_ALPHABET.contains(&b)));
        assert_ne!(password, generate_password().unwrap());
    }
}
