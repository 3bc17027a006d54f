// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Strongroom Domain
//!
//! The strongroom domain crate holds the core business logic of the
//! secrets-management platform: the entities and value objects of the data
//! model, the stateless cryptographic and policy services, the closed error
//! taxonomy, and the repository ports implemented by the infrastructure
//! layer. It is completely independent of external concerns like databases,
//! async runtimes, or logging backends.
//!
//! ## Module Structure
//!
//! - [`entities`] — identified, mutable records: secrets and their versions,
//!   transit keys and their versions, database configurations and roles,
//!   credential leases, RBAC roles and permissions, access policies, audit
//!   records, and the singleton seal configuration.
//! - [`value_objects`] — immutable, self-validating values: typed entity
//!   ids, normalized secret paths, the ciphertext envelope wire format,
//!   unseal shares, and the transit key-type enumeration.
//! - [`services`] — stateless domain services: Shamir secret sharing over
//!   GF(2⁸), audit canonicalization and hash chaining, sensitive-field
//!   redaction, and the policy expression engine. These are pure and
//!   synchronous; cryptographic primitives never suspend.
//! - [`repositories`] — async persistence ports, one per aggregate.
//! - [`error`] — the closed [`VaultError`] taxonomy every public operation
//!   returns.
//!
//! ## Layering Rules
//!
//! The domain crate never depends on tokio, sqlx, or tracing. Repository
//! ports are `async` because persistence is I/O-bound; everything else in
//! this crate is synchronous. Infrastructure adapters implement the ports,
//! and application services in the `strongroom` crate orchestrate them.
//!
//! ## Security Invariants Enforced Here
//!
//! - Unseal shares and master-key bytes are zeroized on drop.
//! - A destroyed secret version's payload is unrecoverable; the entity
//!   transition wipes the ciphertext before persisting.
//! - Audit records chain by SHA-256 over a fixed canonical serialization;
//!   the chain head is the empty string.
//! - Policy evaluation is deny-overrides; evaluation failures surface as
//!   `NotApplicable`, which callers treat as a denial.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{
    AccessPolicy, AuditRecord, AuditStatus, CredentialLease, DatabaseConfig, DatabaseRole,
    Permission, Role, SealConfiguration, Secret, SecretVersion, TransitKey, TransitKeyVersion,
};
pub use error::VaultError;
pub use services::{Decision, EncryptionService, MasterKey, MasterKeyProvider};
pub use value_objects::{CiphertextEnvelope, SecretPath, TransitKeyType, UnsealShare};
