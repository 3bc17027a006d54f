// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities module - identified, mutable domain records.
//!
//! Entities have a stable identity that persists through state changes;
//! equality is by id, never by attributes. Each entity enforces its own
//! lifecycle invariants (CAS rules, version floors, lease renewal caps) so
//! the application services stay thin.

pub mod access_control;
pub mod audit_record;
pub mod credential_lease;
pub mod database;
pub mod seal_configuration;
pub mod secret;
pub mod transit_key;

// Re-export all entity types for convenient access
pub use access_control::{AccessPolicy, Permission, PolicyEffect, Role};
pub use audit_record::{AuditEvent, AuditRecord, AuditStatus};
pub use credential_lease::CredentialLease;
pub use database::{DatabaseConfig, DatabasePlugin, DatabaseRole};
pub use seal_configuration::{KdfParams, SealConfiguration};
pub use secret::{Secret, SecretVersion, DEFAULT_MAX_VERSIONS};
pub use transit_key::{TransitKey, TransitKeyVersion};
