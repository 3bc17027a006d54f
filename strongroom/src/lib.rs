// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Strongroom
//!
//! The secrets-management core of the platform: application services (the
//! engines) and infrastructure (SQLite persistence, AEAD adapters, database
//! connectors) over the `strongroom_domain` model.
//!
//! ## Engines
//!
//! - [`application::services::SealService`] — split-secret initialization,
//!   sealed/unsealed state, in-memory master-key custody.
//! - [`application::services::KvService`] — versioned path-addressed
//!   secrets with CAS, soft-delete, undelete, and destroy.
//! - [`application::services::TransitService`] — named versioned keys for
//!   encrypt/decrypt/rewrap/sign/verify without exposing material.
//! - [`application::services::DbCredsService`] — dynamic database accounts
//!   with leases, a revocation sweeper, and root-credential rotation.
//! - [`application::services::AuthorizationService`] — RBAC + ABAC
//!   decisions with deny-overrides and a TTL cache.
//! - [`application::services::AuditService`] — hash-chain verification and
//!   retention over the tamper-evident log.
//!
//! The [`application::Vault`] composition root wires all of them over one
//! SQLite pool; `strongroom_bootstrap` supplies the KEK, tracing, and
//! shutdown plumbing around it.
//!
//! ## Request flow
//!
//! Every engine method takes a [`application::Caller`] and runs:
//! authorization decision → operation (crypto via the master-keyed
//! encryption service) → audit append, with mutation and audit record
//! committing in one transaction.

pub mod application;
pub mod infrastructure;

pub use application::{Caller, Vault};
