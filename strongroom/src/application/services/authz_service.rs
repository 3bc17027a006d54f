// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Authorization Engine
//!
//! Produces the Allow/Deny/NotApplicable decision that precedes every
//! engine call, combining RBAC (role → permission union) and ABAC (policy
//! expressions) with deny-overrides. NotApplicable is enforced as Deny.
//!
//! ## Caching
//!
//! Decisions cache by (subject id, action, resource fingerprint) with a
//! short TTL. Any mutation of roles, permissions, or policies invalidates
//! the entire cache — invalidation is rare and coarse beats subtle
//! staleness in an authorization path. The cache is one of the two pieces
//! of global mutable state in the system and is cleared on seal.
//!
//! ## Failure semantics
//!
//! A storage failure during evaluation degrades to NotApplicable, never to
//! Allow. Denials are recorded in the audit log with status `denied`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use strongroom_domain::entities::access_control::PolicyEffect;
use strongroom_domain::entities::{AccessPolicy, AuditStatus, Permission, Role};
use strongroom_domain::repositories::{AccessControlRepository, AuditRepository};
use strongroom_domain::services::policy::{
    self, Condition, Decision, RequestContext, ResourceSelector, SubjectSelector,
};
use strongroom_domain::VaultError;

use crate::application::context::Caller;

/// Default decision-cache TTL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    decision: Decision,
    expires: Instant,
}

/// TTL cache over decisions; cleared wholesale on any model mutation.
struct DecisionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DecisionCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(ctx: &RequestContext) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            ctx.subject.id,
            ctx.action,
            ctx.resource.pattern_target()
        )
    }

    fn get(&self, ctx: &RequestContext) -> Option<Decision> {
        let entries = self.entries.read();
        entries
            .get(&Self::key(ctx))
            .filter(|entry| entry.expires > Instant::now())
            .map(|entry| entry.decision)
    }

    fn put(&self, ctx: &RequestContext, decision: Decision) {
        self.entries.write().insert(
            Self::key(ctx),
            CacheEntry {
                decision,
                expires: Instant::now() + self.ttl,
            },
        );
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// The authorization engine.
pub struct AuthorizationService {
    access: Arc<dyn AccessControlRepository>,
    audit: Arc<dyn AuditRepository>,
    cache: DecisionCache,
}

impl AuthorizationService {
    pub fn new(access: Arc<dyn AccessControlRepository>, audit: Arc<dyn AuditRepository>) -> Self {
        Self::with_cache_ttl(access, audit, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(
        access: Arc<dyn AccessControlRepository>,
        audit: Arc<dyn AuditRepository>,
        ttl: Duration,
    ) -> Self {
        Self {
            access,
            audit,
            cache: DecisionCache::new(ttl),
        }
    }

    /// Empties the decision cache. Called on every access-model mutation
    /// and on seal.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evaluates a request, consulting the cache first. Storage failures
    /// degrade to NotApplicable.
    pub async fn decide(&self, ctx: &RequestContext) -> Decision {
        if let Some(cached) = self.cache.get(ctx) {
            return cached;
        }

        let decision = match self.evaluate(ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "authorization evaluation failed, failing closed");
                Decision::NotApplicable
            }
        };
        self.cache.put(ctx, decision);
        decision
    }

    async fn evaluate(&self, ctx: &RequestContext) -> Result<Decision, VaultError> {
        let policies = self.access.list_policies().await?;
        let abac = policy::evaluate_policies(&policies, ctx);
        // A policy Deny short-circuits; RBAC cannot override it.
        if abac == Decision::Deny {
            return Ok(Decision::Deny);
        }
        let permissions = self
            .access
            .permissions_for_roles(&ctx.subject.roles)
            .await?;
        let rbac = policy::evaluate_permissions(&permissions, ctx);
        Ok(policy::combine(abac, rbac))
    }

    /// Enforces a decision: anything but Allow records a denied audit entry
    /// and fails with `Unauthorized`.
    pub async fn enforce(&self, caller: &Caller, ctx: &RequestContext) -> Result<(), VaultError> {
        match self.decide(ctx).await {
            Decision::Allow => Ok(()),
            decision => {
                debug!(
                    subject = %ctx.subject.id,
                    action = %ctx.action,
                    resource = %ctx.resource.pattern_target(),
                    ?decision,
                    "authorization denied"
                );
                let event = caller.audit(
                    &ctx.action,
                    &ctx.resource.resource_type,
                    ctx.resource.id.clone(),
                    AuditStatus::Denied,
                );
                // The denial itself must land in the log even though the
                // operation never runs.
                self.audit.append(event).await?;
                Err(VaultError::Unauthorized)
            }
        }
    }

    // --- Access-model administration ---

    pub async fn create_role(
        &self,
        caller: &Caller,
        name: &str,
        description: Option<String>,
        priority: i32,
    ) -> Result<Role, VaultError> {
        let ctx = caller.request("create", "role", Some(name.to_string()));
        self.enforce(caller, &ctx).await?;

        let role = Role::new(name.to_string(), description, priority, chrono::Utc::now())?;
        let audit = caller
            .audit("create", "role", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "name": name, "priority": priority }));
        self.access.create_role(&role, audit).await?;
        self.clear_cache();
        Ok(role)
    }

    pub async fn delete_role(&self, caller: &Caller, name: &str) -> Result<(), VaultError> {
        let ctx = caller.request("delete", "role", Some(name.to_string()));
        self.enforce(caller, &ctx).await?;

        let role = self
            .access
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("role '{name}'")))?;
        role.ensure_deletable()?;

        let audit = caller.audit("delete", "role", Some(name.to_string()), AuditStatus::Success);
        self.access.delete_role(role.id, audit).await?;
        self.clear_cache();
        Ok(())
    }

    pub async fn create_permission(
        &self,
        caller: &Caller,
        resource: &str,
        action: &str,
        description: Option<String>,
    ) -> Result<Permission, VaultError> {
        let ctx = caller.request("create", "permission", Some(format!("{resource}:{action}")));
        self.enforce(caller, &ctx).await?;

        let permission = Permission::new(
            resource.to_string(),
            action.to_string(),
            description,
            chrono::Utc::now(),
        )?;
        let audit = caller
            .audit(
                "create",
                "permission",
                Some(format!("{resource}:{action}")),
                AuditStatus::Success,
            )
            .with_new_value(serde_json::json!({ "resource": resource, "action": action }));
        self.access.create_permission(&permission, audit).await?;
        self.clear_cache();
        Ok(permission)
    }

    pub async fn grant_permission(
        &self,
        caller: &Caller,
        role_name: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), VaultError> {
        let ctx = caller.request("grant", "role", Some(role_name.to_string()));
        self.enforce(caller, &ctx).await?;

        let role = self
            .access
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("role '{role_name}'")))?;
        let permission = self
            .access
            .find_permission(resource, action)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("permission ({resource}, {action})")))?;

        let audit = caller
            .audit("grant", "role", Some(role_name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "resource": resource, "action": action }));
        self.access
            .grant_permission(role.id, permission.id, audit)
            .await?;
        self.clear_cache();
        Ok(())
    }

    pub async fn revoke_permission(
        &self,
        caller: &Caller,
        role_name: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), VaultError> {
        let ctx = caller.request("revoke", "role", Some(role_name.to_string()));
        self.enforce(caller, &ctx).await?;

        let role = self
            .access
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("role '{role_name}'")))?;
        let permission = self
            .access
            .find_permission(resource, action)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("permission ({resource}, {action})")))?;

        let audit = caller
            .audit("revoke", "role", Some(role_name.to_string()), AuditStatus::Success)
            .with_old_value(serde_json::json!({ "resource": resource, "action": action }));
        self.access
            .revoke_permission(role.id, permission.id, audit)
            .await?;
        self.clear_cache();
        Ok(())
    }

    pub async fn save_policy(
        &self,
        caller: &Caller,
        policy: AccessPolicy,
    ) -> Result<(), VaultError> {
        let ctx = caller.request("write", "policy", Some(policy.name.clone()));
        self.enforce(caller, &ctx).await?;

        let audit = caller
            .audit("write", "policy", Some(policy.name.clone()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "name": policy.name,
                "effect": match policy.effect { PolicyEffect::Allow => "allow", PolicyEffect::Deny => "deny" },
                "priority": policy.priority,
                "enabled": policy.enabled,
            }));
        self.access.save_policy(&policy, audit).await?;
        self.clear_cache();
        Ok(())
    }

    pub async fn delete_policy(&self, caller: &Caller, name: &str) -> Result<(), VaultError> {
        let ctx = caller.request("delete", "policy", Some(name.to_string()));
        self.enforce(caller, &ctx).await?;

        let policy = self
            .access
            .find_policy_by_name(name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("policy '{name}'")))?;
        let audit = caller.audit("delete", "policy", Some(name.to_string()), AuditStatus::Success);
        self.access.delete_policy(policy.id, audit).await?;
        self.clear_cache();
        Ok(())
    }

    /// Seeds the system roles on first start: `admin` with the wildcard
    /// permission and `auditor` with audit read/verify. Idempotent.
    pub async fn ensure_system_roles(&self) -> Result<(), VaultError> {
        let now = chrono::Utc::now();
        let system = Caller::system();

        if self.access.find_role_by_name("admin").await?.is_none() {
            let mut role = Role::new("admin".into(), Some("Full access".into()), 1000, now)?;
            role.is_system = true;
            let audit = system.audit("create", "role", Some("admin".into()), AuditStatus::Success);
            self.access.create_role(&role, audit).await?;
        }
        if self.access.find_role_by_name("auditor").await?.is_none() {
            let mut role = Role::new("auditor".into(), Some("Audit readout".into()), 500, now)?;
            role.is_system = true;
            let audit = system.audit("create", "role", Some("auditor".into()), AuditStatus::Success);
            self.access.create_role(&role, audit).await?;
        }

        for (resource, action, grantee) in [
            ("*", "*", "admin"),
            ("audit", "read", "auditor"),
            ("audit", "verify", "auditor"),
        ] {
            let permission = match self.access.find_permission(resource, action).await? {
                Some(p) => p,
                None => {
                    let p = Permission::new(resource.into(), action.into(), None, now)?;
                    let audit = system.audit(
                        "create",
                        "permission",
                        Some(format!("{resource}:{action}")),
                        AuditStatus::Success,
                    );
                    self.access.create_permission(&p, audit).await?;
                    p
                }
            };
            if let Some(role) = self.access.find_role_by_name(grantee).await? {
                let audit = system.audit(
                    "grant",
                    "role",
                    Some(grantee.to_string()),
                    AuditStatus::Success,
                );
                self.access
                    .grant_permission(role.id, permission.id, audit)
                    .await?;
            }
        }
        self.clear_cache();
        Ok(())
    }

    /// Convenience for building selector/condition-bearing policies from
    /// JSON documents (the form the transport layer stores them in).
    pub fn parse_policy_document(document: &str) -> Result<AccessPolicy, VaultError> {
        serde_json::from_str(document)
            .map_err(|e| VaultError::InvalidArgument(format!("malformed policy document: {e}")))
    }

    /// Builds a policy from parts, for embedding callers.
    #[allow(clippy::too_many_arguments)]
    pub fn build_policy(
        name: &str,
        effect: PolicyEffect,
        subject: SubjectSelector,
        resource: ResourceSelector,
        actions: Vec<String>,
        condition: Option<Condition>,
        priority: i32,
    ) -> AccessPolicy {
        let now = chrono::Utc::now();
        AccessPolicy {
            id: strongroom_domain::value_objects::PolicyId::new(),
            name: name.into(),
            effect,
            subject,
            resource,
            actions,
            condition,
            priority,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}
