// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value Objects module - immutable, self-validating domain values.
//!
//! Value objects have no identity: two with the same attributes are equal.
//! Each type validates its invariants at construction so invalid states are
//! unrepresentable downstream.

pub mod ciphertext;
pub mod entity_id;
pub mod key_type;
pub mod secret_path;
pub mod unseal_share;

// Re-export all value object types for convenient access
pub use ciphertext::{
    CiphertextEnvelope, TransitCiphertext, ENVELOPE_VERSION_AES256_GCM, NONCE_LEN, TAG_LEN,
    TRANSIT_PREFIX,
};
pub use entity_id::{
    AuditRecordId, DatabaseConfigId, DatabaseRoleId, EntityId, IdKind, LeaseId, PermissionId,
    PolicyId, RoleId, SecretId, SecretVersionId, TransitKeyId, TransitKeyVersionId,
};
pub use key_type::TransitKeyType;
pub use secret_path::SecretPath;
pub use unseal_share::{UnsealShare, SHARE_LEN};
