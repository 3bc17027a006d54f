// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services - the seven engines.

pub mod audit_service;
pub mod authz_service;
pub mod db_creds_service;
pub mod kv_service;
pub mod seal_service;
pub mod transit_service;

pub use audit_service::{AuditService, VerificationReport, DEFAULT_RETENTION_DAYS};
pub use authz_service::AuthorizationService;
pub use db_creds_service::{
    DatabaseConfigParams, DatabaseRoleParams, DbCredsService, IssuedCredentials,
};
pub use kv_service::{KvService, MetadataUpdate, SecretData};
pub use seal_service::{InitializeResult, SealService, SealStatus};
pub use transit_service::{TransitConfigUpdate, TransitService};
