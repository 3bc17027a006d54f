// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Record Entity
//!
//! One row of the tamper-evident log. Records chain by hash: each record's
//! `current_hash` is SHA-256 over a canonical pipe-separated serialization
//! of its fields ending with the previous record's `current_hash`. The chain
//! head uses the empty string. Value snapshots are redacted before they
//! reach this entity — an [`AuditRecord`] never holds plaintext secrets.
//!
//! The canonical field order is part of the external interface and must not
//! change:
//!
//! ```text
//! id|user_id|action|resource_type|resource_id|old_value|new_value|ip|
//! user_agent|status|error|created_at|correlation_id|previous_hash
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::value_objects::AuditRecordId;

/// Outcome recorded for an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    Denied,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = crate::VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "denied" => Ok(Self::Denied),
            other => Err(crate::VaultError::InvalidArgument(format!(
                "unknown audit status '{other}'"
            ))),
        }
    }
}

/// The draft of an audit entry, before chaining.
///
/// Engines build an `AuditEvent` at each operation site; the audit appender
/// redacts the value snapshots, fills in the correlation id if absent,
/// assigns the id and timestamp, and links the chain.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub source_addr: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub error: Option<String>,
    pub correlation_id: Option<String>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            actor_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            old_value: None,
            new_value: None,
            source_addr: None,
            user_agent: None,
            status,
            error: None,
            correlation_id: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_id = Some(actor.into());
        self
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_old_value(mut self, value: serde_json::Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn with_new_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_source(mut self, addr: impl Into<String>) -> Self {
        self.source_addr = Some(addr.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A persisted, chained audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub actor_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// Redacted JSON snapshot, serialized compactly.
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source_addr: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub error: Option<String>,
    pub correlation_id: String,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    /// Empty string for the chain head.
    pub previous_hash: String,
    /// Base64 SHA-256 of the canonical serialization.
    pub current_hash: String,
}

impl AuditRecord {
    /// The canonical pipe-separated serialization hashed into
    /// `current_hash`. Optional fields serialize as the empty string; the
    /// timestamp uses the millisecond RFC3339 form.
    pub fn canonical_string(&self) -> String {
        fn opt(s: &Option<String>) -> &str {
            s.as_deref().unwrap_or("")
        }
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            opt(&self.actor_id),
            self.action,
            self.resource_type,
            opt(&self.resource_id),
            opt(&self.old_value),
            opt(&self.new_value),
            opt(&self.source_addr),
            opt(&self.user_agent),
            self.status.as_str(),
            opt(&self.error),
            datetime_serde::format_rfc3339_millis(&self.created_at),
            self.correlation_id,
            self.previous_hash,
        )
    }
}
