// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Entity Identifiers
//!
//! ULID-backed identifiers with a phantom kind parameter so a `SecretId`
//! can never be passed where a `LeaseId` is expected. ULIDs are
//! lexicographically sortable by creation time, compact (26 chars), and
//! URL-safe, which makes them good TEXT primary keys.
//!
//! ## Serialization
//!
//! Ids serialize as their plain ULID string (no wrapper object) so the JSON
//! and database representations are identical.
//!
//! ## Adding a new id type
//!
//! Declare a marker type implementing [`IdKind`] and a type alias; the
//! `entity_ids!` invocation at the bottom of this file does both.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

use crate::VaultError;

/// Marker trait tying an id to the entity kind it identifies.
pub trait IdKind {
    /// Short kind name used in error messages and tracing fields.
    fn kind_name() -> &'static str;
}

/// Generic ULID identifier with a phantom kind parameter.
///
/// Equality, ordering, and hashing delegate to the underlying ULID; the
/// phantom parameter exists purely for compile-time separation.
#[derive(Debug)]
pub struct EntityId<K: IdKind> {
    value: Ulid,
    _marker: PhantomData<K>,
}

impl<K: IdKind> EntityId<K> {
    /// Generates a fresh, time-ordered id.
    pub fn new() -> Self {
        Self {
            value: Ulid::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps an existing ULID (e.g. read back from storage).
    pub fn from_ulid(value: Ulid) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Parses from the canonical 26-character string form.
    pub fn parse(s: &str) -> Result<Self, VaultError> {
        let value = Ulid::from_string(s).map_err(|e| {
            VaultError::InvalidArgument(format!("malformed {} id '{}': {}", K::kind_name(), s, e))
        })?;
        if value == Ulid::nil() {
            return Err(VaultError::InvalidArgument(format!(
                "{} id cannot be nil",
                K::kind_name()
            )));
        }
        Ok(Self::from_ulid(value))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.value
    }
}

impl<K: IdKind> Default for EntityId<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IdKind> Clone for EntityId<K> {
    fn clone(&self) -> Self {
        Self::from_ulid(self.value)
    }
}

impl<K: IdKind> Copy for EntityId<K> {}

impl<K: IdKind> PartialEq for EntityId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: IdKind> Eq for EntityId<K> {}

impl<K: IdKind> PartialOrd for EntityId<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: IdKind> Ord for EntityId<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K: IdKind> Hash for EntityId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K: IdKind> Display for EntityId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<K: IdKind> FromStr for EntityId<K> {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Plain-string serde so database TEXT columns and JSON agree.
impl<K: IdKind> Serialize for EntityId<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.to_string().serialize(serializer)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for EntityId<K> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! entity_ids {
    ($(($marker:ident, $alias:ident, $name:literal)),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $marker;

            impl IdKind for $marker {
                fn kind_name() -> &'static str {
                    $name
                }
            }

            pub type $alias = EntityId<$marker>;
        )+
    };
}

entity_ids!(
    (SecretKind, SecretId, "secret"),
    (SecretVersionKind, SecretVersionId, "secret_version"),
    (TransitKeyKind, TransitKeyId, "transit_key"),
    (TransitKeyVersionKind, TransitKeyVersionId, "transit_key_version"),
    (DatabaseConfigKind, DatabaseConfigId, "database_config"),
    (DatabaseRoleKind, DatabaseRoleId, "database_role"),
    (LeaseKind, LeaseId, "lease"),
    (RoleKind, RoleId, "role"),
    (PermissionKind, PermissionId, "permission"),
    (PolicyKind, PolicyId, "access_policy"),
    (AuditRecordKind, AuditRecordId, "audit_record"),
);
