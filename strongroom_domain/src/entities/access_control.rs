// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Access Control Entities
//!
//! RBAC roles and permissions plus attribute-based access policies. Roles
//! link to permissions through an explicit join table in storage; policies
//! carry structured selectors and a condition expression that the policy
//! engine parses into a typed tree at load time (see
//! [`crate::services::policy`]).
//!
//! Two roles are seeded at first start and flagged as system roles:
//! `admin` (wildcard permission) and `auditor` (audit read/verify). System
//! roles cannot be deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::services::policy::{Condition, ResourceSelector, SubjectSelector};
use crate::value_objects::{PermissionId, PolicyId, RoleId};
use crate::VaultError;

/// An RBAC role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    /// System roles are seeded at startup and refuse deletion.
    pub is_system: bool,
    /// Higher priority wins when roles disagree on hierarchy questions.
    pub priority: i32,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: Option<String>, priority: i32, now: DateTime<Utc>) -> Result<Self, VaultError> {
        if name.is_empty() || name.len() > 128 {
            return Err(VaultError::InvalidArgument(
                "role name must be 1-128 characters".into(),
            ));
        }
        Ok(Self {
            id: RoleId::new(),
            name,
            description,
            is_system: false,
            priority,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn ensure_deletable(&self) -> Result<(), VaultError> {
        if self.is_system {
            return Err(VaultError::Unsupported(format!(
                "system role '{}' cannot be deleted",
                self.name
            )));
        }
        Ok(())
    }
}

/// A (resource, action) permission pair.
///
/// Resource patterns support exact match and a wildcard suffix
/// (`secret/app/*`); actions support exact match and `*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(resource: String, action: String, description: Option<String>, now: DateTime<Utc>) -> Result<Self, VaultError> {
        if resource.is_empty() || action.is_empty() {
            return Err(VaultError::InvalidArgument(
                "permission resource and action cannot be empty".into(),
            ));
        }
        Ok(Self {
            id: PermissionId::new(),
            resource,
            action,
            description,
            created_at: now,
        })
    }

    /// Whether this permission grants `action` on `resource`.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        Self::pattern_matches(&self.resource, resource)
            && (self.action == "*" || self.action == action)
    }

    /// Exact match, `*`, or wildcard-suffix match (`foo/*` covers `foo/bar`
    /// and `foo/bar/baz`, but not `foo` itself).
    pub fn pattern_matches(pattern: &str, value: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        match pattern.strip_suffix("/*") {
            Some(prefix) => value
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/')),
            None => pattern == value,
        }
    }
}

/// Allow or deny, the two policy effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

/// An attribute-based access policy.
///
/// Policies are evaluated in descending priority order with deny-overrides
/// combination: any applicable Deny wins over every Allow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: PolicyId,
    pub name: String,
    pub effect: PolicyEffect,
    pub subject: SubjectSelector,
    pub resource: ResourceSelector,
    /// Actions this policy applies to; `*` matches any.
    pub actions: Vec<String>,
    pub condition: Option<Condition>,
    pub priority: i32,
    pub enabled: bool,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl AccessPolicy {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.name.is_empty() {
            return Err(VaultError::InvalidArgument(
                "policy name cannot be empty".into(),
            ));
        }
        if self.actions.is_empty() {
            return Err(VaultError::InvalidArgument(format!(
                "policy '{}' must name at least one action",
                self.name
            )));
        }
        Ok(())
    }

    pub fn applies_to_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == "*" || a == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_wildcards() {
        assert!(Permission::pattern_matches("*", "anything"));
        assert!(Permission::pattern_matches("secret/app/*", "secret/app/db"));
        assert!(Permission::pattern_matches("secret/app/*", "secret/app/db/creds"));
        assert!(!Permission::pattern_matches("secret/app/*", "secret/app"));
        assert!(!Permission::pattern_matches("secret/app/*", "secret/application/db"));
        assert!(Permission::pattern_matches("secret/app", "secret/app"));
        assert!(!Permission::pattern_matches("secret/app", "secret/app/db"));
    }

    #[test]
    fn permission_action_match() {
        let now = Utc::now();
        let p = Permission::new("secret/*".into(), "read".into(), None, now).unwrap();
        assert!(p.matches("secret/app", "read"));
        assert!(!p.matches("secret/app", "write"));

        let any = Permission::new("secret/*".into(), "*".into(), None, now).unwrap();
        assert!(any.matches("secret/app", "destroy"));
    }

    #[test]
    fn system_role_is_undeletable() {
        let mut r = Role::new("ops".into(), None, 0, Utc::now()).unwrap();
        assert!(r.ensure_deletable().is_ok());
        r.is_system = true;
        assert!(matches!(
            r.ensure_deletable(),
            Err(VaultError::Unsupported(_))
        ));
    }
}
