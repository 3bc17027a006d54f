// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repositories module - async persistence ports.
//!
//! One port per aggregate. Implementations live in the infrastructure layer
//! and must be `Send + Sync`. Mutating methods that the design requires to
//! be audited take the prepared [`AuditEvent`](crate::entities::AuditEvent)
//! and persist the mutation and the chained audit record in one
//! transaction — a failed audit append aborts the mutation.

pub mod access_repository;
pub mod audit_repository;
pub mod database_repository;
pub mod lease_repository;
pub mod seal_repository;
pub mod secret_repository;
pub mod transit_key_repository;

pub use access_repository::AccessControlRepository;
pub use audit_repository::AuditRepository;
pub use database_repository::DatabaseRepository;
pub use lease_repository::LeaseRepository;
pub use seal_repository::SealRepository;
pub use secret_repository::SecretRepository;
pub use transit_key_repository::TransitKeyRepository;
