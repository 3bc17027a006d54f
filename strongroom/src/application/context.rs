// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Caller Context
//!
//! What the transport layer knows about the requester, carried into every
//! engine call: subject attributes for authorization, source address and
//! user agent for the audit trail, and the ambient correlation id. Engines
//! derive per-operation [`RequestContext`]s and audit events from it.

use std::net::IpAddr;

use strongroom_domain::entities::{AuditEvent, AuditStatus};
use strongroom_domain::services::{RequestContext, ResourceDescriptor, SubjectAttributes};

/// The authenticated requester of an engine operation.
#[derive(Debug, Clone)]
pub struct Caller {
    pub subject: SubjectAttributes,
    pub source_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
}

impl Caller {
    pub fn new(subject: SubjectAttributes) -> Self {
        Self {
            subject,
            source_ip: None,
            user_agent: None,
            correlation_id: None,
        }
    }

    /// Internal actor for background tasks (sweepers, auto-rotation).
    pub fn system() -> Self {
        Self::new(SubjectAttributes {
            id: "system".into(),
            roles: vec!["system".into()],
            groups: vec![],
            attributes: serde_json::Map::new(),
        })
    }

    pub fn with_source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builds the authorization request for one operation.
    pub fn request(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: Option<String>,
    ) -> RequestContext {
        let mut ctx = RequestContext::new(
            self.subject.clone(),
            action,
            ResourceDescriptor {
                resource_type: resource_type.into(),
                id: resource_id,
            },
        );
        if let Some(ip) = self.source_ip {
            ctx = ctx.with_source_ip(ip);
        }
        if let Some(agent) = &self.user_agent {
            ctx = ctx.with_user_agent(agent.clone());
        }
        ctx
    }

    /// Starts an audit event stamped with this caller's identity.
    pub fn audit(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: Option<String>,
        status: AuditStatus,
    ) -> AuditEvent {
        let mut event = AuditEvent::new(action, resource_type, status)
            .with_actor(self.subject.id.clone());
        if let Some(id) = resource_id {
            event = event.with_resource_id(id);
        }
        if let Some(ip) = self.source_ip {
            event = event.with_source(ip.to_string());
        }
        if let Some(agent) = &self.user_agent {
            event = event.with_user_agent(agent.clone());
        }
        if let Some(correlation) = &self.correlation_id {
            event = event.with_correlation_id(correlation.clone());
        }
        event
    }
}
