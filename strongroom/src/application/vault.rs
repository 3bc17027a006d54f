// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Composition Root
//!
//! Wires the seven engines over one SQLite pool: the shared audit chain,
//! the repositories, the master-keyed encryption service, and the services
//! themselves. The embedding transport layer constructs a [`Vault`] at
//! startup and routes requests to its engines; tests construct one over an
//! in-memory pool.

use sqlx::SqlitePool;
use std::sync::Arc;

use strongroom_domain::repositories::AuditRepository;
use strongroom_domain::services::{EncryptionService, KekProvider};

use crate::application::services::{
    AuditService, AuthorizationService, DbCredsService, KvService, SealService, TransitService,
};
use crate::infrastructure::adapters::AesGcmEncryption;
use crate::infrastructure::connectors::{ConnectorFactory, SqlxConnectorFactory};
use crate::infrastructure::repositories::{
    AuditChainWriter, SqliteAccessRepository, SqliteAuditRepository, SqliteDatabaseRepository,
    SqliteLeaseRepository, SqliteSealRepository, SqliteSecretRepository,
    SqliteTransitKeyRepository,
};

/// The assembled secrets-management core.
pub struct Vault {
    pub seal: Arc<SealService>,
    pub kv: Arc<KvService>,
    pub transit: Arc<TransitService>,
    pub db_creds: Arc<DbCredsService>,
    pub authz: Arc<AuthorizationService>,
    pub audit: Arc<AuditService>,
    pub audit_repo: Arc<dyn AuditRepository>,
    pub encryption: Arc<dyn EncryptionService>,
}

impl Vault {
    /// Assembles the engines with the production connector factory.
    pub async fn new(
        pool: SqlitePool,
        kek: Arc<dyn KekProvider>,
    ) -> Result<Self, strongroom_domain::VaultError> {
        Self::with_connectors(pool, kek, Arc::new(SqlxConnectorFactory::new())).await
    }

    /// Assembles the engines with a caller-supplied connector factory
    /// (tests inject mocks here).
    pub async fn with_connectors(
        pool: SqlitePool,
        kek: Arc<dyn KekProvider>,
        connectors: Arc<dyn ConnectorFactory>,
    ) -> Result<Self, strongroom_domain::VaultError> {
        let chain = Arc::new(AuditChainWriter::new(pool.clone()));

        let seal_repo = Arc::new(SqliteSealRepository::new(pool.clone()));
        let audit_repo: Arc<dyn AuditRepository> =
            Arc::new(SqliteAuditRepository::new(chain.clone()));
        let secret_repo = Arc::new(SqliteSecretRepository::new(chain.clone()));
        let transit_repo = Arc::new(SqliteTransitKeyRepository::new(chain.clone()));
        let database_repo = Arc::new(SqliteDatabaseRepository::new(chain.clone()));
        let lease_repo = Arc::new(SqliteLeaseRepository::new(chain.clone()));
        let access_repo = Arc::new(SqliteAccessRepository::new(chain.clone()));

        let seal = Arc::new(SealService::new(seal_repo, kek));
        let encryption: Arc<dyn EncryptionService> =
            Arc::new(AesGcmEncryption::new(seal.clone()));

        let authz = Arc::new(AuthorizationService::new(access_repo, audit_repo.clone()));
        authz.ensure_system_roles().await?;

        let kv = Arc::new(KvService::new(
            secret_repo,
            encryption.clone(),
            authz.clone(),
            audit_repo.clone(),
        ));
        let transit = Arc::new(TransitService::new(
            transit_repo,
            encryption.clone(),
            authz.clone(),
            audit_repo.clone(),
        ));
        let db_creds = Arc::new(DbCredsService::new(
            database_repo,
            lease_repo,
            encryption.clone(),
            connectors,
            authz.clone(),
            audit_repo.clone(),
        ));
        let audit = Arc::new(AuditService::new(audit_repo.clone(), authz.clone()));

        Ok(Self {
            seal,
            kv,
            transit,
            db_creds,
            authz,
            audit,
            audit_repo,
            encryption,
        })
    }

    /// Seals the vault: wipes the master key, clears partial unseal
    /// progress, and resets the decision cache (both pieces of global
    /// mutable state go down together).
    pub async fn seal_all(&self) {
        self.seal.seal().await;
        self.authz.clear_cache();
    }
}
