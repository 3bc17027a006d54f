// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Policy Expression Engine
//!
//! The attribute-based half of authorization. Policies carry structured
//! selectors and an optional condition expression; both deserialize from
//! JSON into the typed trees in this module at load time, so request-path
//! evaluation never touches raw JSON documents.
//!
//! ## Expression language
//!
//! Conditions are a small tagged union: equality, set membership, prefix
//! match, CIDR containment for IP attributes, and `all`/`any`/`not`
//! combinators. Attributes are addressed by dotted path into the request
//! context: `subject.id`, `subject.roles`, `subject.attr.<key>`,
//! `resource.type`, `resource.id`, `action`, `request.ip`,
//! `request.user_agent`.
//!
//! ## Combination rule
//!
//! Deny-overrides. Policies are visited in descending priority; the first
//! applicable Deny ends evaluation. Otherwise any applicable Allow yields
//! Allow, and no applicable policy yields NotApplicable — which every call
//! site treats as Deny.
//!
//! ## Failure semantics
//!
//! An attribute fetch failure (unknown path, type mismatch) aborts
//! evaluation with `NotApplicable` rather than guessing — fail-closed.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

use crate::entities::access_control::{AccessPolicy, Permission, PolicyEffect};

/// The outcome of an authorization evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// No policy or permission applied. Callers treat this as Deny.
    NotApplicable,
}

/// Subject attributes assembled by the authorization service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectAttributes {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Free-form attributes referenced as `subject.attr.<key>`.
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

/// What the request is acting on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl ResourceDescriptor {
    /// The flattened `type/id` form RBAC resource patterns match against.
    pub fn pattern_target(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{}", self.resource_type, id),
            None => self.resource_type.clone(),
        }
    }
}

/// The full context a decision is made against.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub subject: SubjectAttributes,
    pub action: String,
    pub resource: ResourceDescriptor,
    pub source_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub time: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(subject: SubjectAttributes, action: impl Into<String>, resource: ResourceDescriptor) -> Self {
        Self {
            subject,
            action: action.into(),
            resource,
            source_ip: None,
            user_agent: None,
            time: Utc::now(),
        }
    }

    pub fn with_source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// Selects which subjects a policy applies to. Empty lists match everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectSelector {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl SubjectSelector {
    pub fn matches(&self, subject: &SubjectAttributes) -> bool {
        let id_ok = self.ids.is_empty() || self.ids.iter().any(|id| *id == subject.id);
        let role_ok = self.roles.is_empty()
            || self.roles.iter().any(|r| subject.roles.contains(r));
        let group_ok = self.groups.is_empty()
            || self.groups.iter().any(|g| subject.groups.contains(g));
        id_ok && role_ok && group_ok
    }
}

/// Selects which resources a policy applies to. Empty lists match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSelector {
    #[serde(default)]
    pub types: Vec<String>,
    /// Patterns matched against `type/id` with wildcard-suffix support.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ResourceSelector {
    pub fn matches(&self, resource: &ResourceDescriptor) -> bool {
        let type_ok =
            self.types.is_empty() || self.types.iter().any(|t| *t == resource.resource_type);
        let target = resource.pattern_target();
        let pattern_ok = self.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|p| Permission::pattern_matches(p, &target));
        type_ok && pattern_ok
    }
}

/// A condition expression node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Attribute equals the given JSON value.
    Eq { attr: String, value: Value },
    /// Attribute is a member of the given set (or, for list attributes,
    /// intersects it).
    In { attr: String, values: Vec<Value> },
    /// String attribute starts with the given prefix.
    Prefix { attr: String, prefix: String },
    /// IP attribute is contained in the given network.
    Cidr { attr: String, net: IpNet },
    /// Every child condition holds.
    All { conditions: Vec<Condition> },
    /// At least one child condition holds.
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

/// Raised when an attribute cannot be resolved against the context; maps to
/// `NotApplicable` at the policy level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeError(pub String);

fn fetch_attribute(ctx: &RequestContext, path: &str) -> Result<Value, AttributeError> {
    match path {
        "subject.id" => Ok(Value::String(ctx.subject.id.clone())),
        "subject.roles" => Ok(Value::Array(
            ctx.subject.roles.iter().cloned().map(Value::String).collect(),
        )),
        "subject.groups" => Ok(Value::Array(
            ctx.subject.groups.iter().cloned().map(Value::String).collect(),
        )),
        "action" => Ok(Value::String(ctx.action.clone())),
        "resource.type" => Ok(Value::String(ctx.resource.resource_type.clone())),
        "resource.id" => ctx
            .resource
            .id
            .clone()
            .map(Value::String)
            .ok_or_else(|| AttributeError("resource.id is absent".into())),
        "request.ip" => ctx
            .source_ip
            .map(|ip| Value::String(ip.to_string()))
            .ok_or_else(|| AttributeError("request.ip is absent".into())),
        "request.user_agent" => ctx
            .user_agent
            .clone()
            .map(Value::String)
            .ok_or_else(|| AttributeError("request.user_agent is absent".into())),
        other => match other.strip_prefix("subject.attr.") {
            Some(key) => ctx
                .subject
                .attributes
                .get(key)
                .cloned()
                .ok_or_else(|| AttributeError(format!("subject attribute '{key}' is absent"))),
            None => Err(AttributeError(format!("unknown attribute path '{other}'"))),
        },
    }
}

impl Condition {
    /// Evaluates the condition against a request context.
    pub fn evaluate(&self, ctx: &RequestContext) -> Result<bool, AttributeError> {
        match self {
            Condition::Eq { attr, value } => Ok(fetch_attribute(ctx, attr)? == *value),
            Condition::In { attr, values } => {
                let actual = fetch_attribute(ctx, attr)?;
                match &actual {
                    Value::Array(items) => Ok(items.iter().any(|i| values.contains(i))),
                    scalar => Ok(values.contains(scalar)),
                }
            }
            Condition::Prefix { attr, prefix } => {
                let actual = fetch_attribute(ctx, attr)?;
                match actual {
                    Value::String(s) => Ok(s.starts_with(prefix.as_str())),
                    _ => Err(AttributeError(format!(
                        "attribute '{attr}' is not a string"
                    ))),
                }
            }
            Condition::Cidr { attr, net } => {
                let actual = fetch_attribute(ctx, attr)?;
                let text = actual
                    .as_str()
                    .ok_or_else(|| AttributeError(format!("attribute '{attr}' is not a string")))?;
                let ip: IpAddr = text
                    .parse()
                    .map_err(|_| AttributeError(format!("attribute '{attr}' is not an IP")))?;
                Ok(net.contains(&ip))
            }
            Condition::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { condition } => Ok(!condition.evaluate(ctx)?),
        }
    }
}

/// Evaluates the ABAC policy set. `policies` need not be pre-sorted.
pub fn evaluate_policies(policies: &[AccessPolicy], ctx: &RequestContext) -> Decision {
    let mut ordered: Vec<&AccessPolicy> = policies.iter().filter(|p| p.enabled).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut any_allow = false;
    for policy in ordered {
        if !policy.applies_to_action(&ctx.action)
            || !policy.subject.matches(&ctx.subject)
            || !policy.resource.matches(&ctx.resource)
        {
            continue;
        }
        let condition_holds = match &policy.condition {
            None => true,
            Some(condition) => match condition.evaluate(ctx) {
                Ok(holds) => holds,
                // Fail closed: an unevaluable policy neither allows nor
                // denies, and the overall decision degrades to NotApplicable.
                Err(_) => return Decision::NotApplicable,
            },
        };
        if !condition_holds {
            continue;
        }
        match policy.effect {
            PolicyEffect::Deny => return Decision::Deny,
            PolicyEffect::Allow => any_allow = true,
        }
    }
    if any_allow {
        Decision::Allow
    } else {
        Decision::NotApplicable
    }
}

/// Evaluates the RBAC permission set against the flattened resource target.
pub fn evaluate_permissions(permissions: &[Permission], ctx: &RequestContext) -> Decision {
    let target = ctx.resource.pattern_target();
    if permissions.iter().any(|p| p.matches(&target, &ctx.action)) {
        Decision::Allow
    } else {
        Decision::NotApplicable
    }
}

/// Deny-overrides combination of the ABAC and RBAC halves.
pub fn combine(abac: Decision, rbac: Decision) -> Decision {
    match (abac, rbac) {
        (Decision::Deny, _) | (_, Decision::Deny) => Decision::Deny,
        (Decision::Allow, _) | (_, Decision::Allow) => Decision::Allow,
        _ => Decision::NotApplicable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::PolicyId;

    fn subject(id: &str, roles: &[&str]) -> SubjectAttributes {
        SubjectAttributes {
            id: id.into(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            groups: vec![],
            attributes: serde_json::Map::new(),
        }
    }

    fn ctx(action: &str, rtype: &str, rid: &str) -> RequestContext {
        RequestContext::new(
            subject("alice", &["dev"]),
            action,
            ResourceDescriptor {
                resource_type: rtype.into(),
                id: Some(rid.into()),
            },
        )
    }

    fn policy(effect: PolicyEffect, priority: i32) -> AccessPolicy {
        AccessPolicy {
            id: PolicyId::new(),
            name: format!("p{priority}"),
            effect,
            subject: SubjectSelector::default(),
            resource: ResourceSelector::default(),
            actions: vec!["*".into()],
            condition: None,
            priority,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deny_overrides_allow() {
        let policies = vec![policy(PolicyEffect::Allow, 100), policy(PolicyEffect::Deny, 1)];
        assert_eq!(
            evaluate_policies(&policies, &ctx("read", "secret", "app/db")),
            Decision::Deny
        );
    }

    #[test]
    fn disabled_policies_are_skipped() {
        let mut deny = policy(PolicyEffect::Deny, 10);
        deny.enabled = false;
        let policies = vec![policy(PolicyEffect::Allow, 0), deny];
        assert_eq!(
            evaluate_policies(&policies, &ctx("read", "secret", "x")),
            Decision::Allow
        );
    }

    #[test]
    fn no_applicable_policy_is_not_applicable() {
        let mut p = policy(PolicyEffect::Allow, 0);
        p.actions = vec!["write".into()];
        assert_eq!(
            evaluate_policies(&[p], &ctx("read", "secret", "x")),
            Decision::NotApplicable
        );
    }

    #[test]
    fn selector_matching() {
        let sel = SubjectSelector {
            ids: vec![],
            roles: vec!["dev".into()],
            groups: vec![],
        };
        assert!(sel.matches(&subject("alice", &["dev", "ops"])));
        assert!(!sel.matches(&subject("bob", &["ops"])));

        let res = ResourceSelector {
            types: vec!["secret".into()],
            patterns: vec!["secret/app/*".into()],
        };
        assert!(res.matches(&ResourceDescriptor {
            resource_type: "secret".into(),
            id: Some("app/db".into()),
        }));
        assert!(!res.matches(&ResourceDescriptor {
            resource_type: "secret".into(),
            id: Some("infra/db".into()),
        }));
    }

    #[test]
    fn condition_eq_and_combinators() {
        let c: Condition = serde_json::from_value(serde_json::json!({
            "op": "all",
            "conditions": [
                {"op": "eq", "attr": "subject.id", "value": "alice"},
                {"op": "not", "condition": {"op": "eq", "attr": "action", "value": "destroy"}}
            ]
        }))
        .unwrap();
        assert!(c.evaluate(&ctx("read", "secret", "x")).unwrap());

        let c2 = Condition::In {
            attr: "subject.roles".into(),
            values: vec![Value::String("ops".into()), Value::String("dev".into())],
        };
        assert!(c2.evaluate(&ctx("read", "secret", "x")).unwrap());
    }

    #[test]
    fn condition_prefix() {
        let c = Condition::Prefix {
            attr: "resource.id".into(),
            prefix: "app/".into(),
        };
        assert!(c.evaluate(&ctx("read", "secret", "app/db")).unwrap());
        assert!(!c.evaluate(&ctx("read", "secret", "infra/db")).unwrap());
    }

    #[test]
    fn condition_cidr() {
        let c = Condition::Cidr {
            attr: "request.ip".into(),
            net: "10.0.0.0/8".parse().unwrap(),
        };
        let inside = ctx("read", "secret", "x").with_source_ip("10.1.2.3".parse().unwrap());
        let outside = ctx("read", "secret", "x").with_source_ip("192.168.1.1".parse().unwrap());
        assert!(c.evaluate(&inside).unwrap());
        assert!(!c.evaluate(&outside).unwrap());

        // Absent IP is an attribute failure, not false.
        assert!(c.evaluate(&ctx("read", "secret", "x")).is_err());
    }

    #[test]
    fn attribute_failure_fails_closed() {
        let mut p = policy(PolicyEffect::Allow, 0);
        p.condition = Some(Condition::Eq {
            attr: "subject.attr.department".into(),
            value: Value::String("eng".into()),
        });
        assert_eq!(
            evaluate_policies(&[p], &ctx("read", "secret", "x")),
            Decision::NotApplicable
        );
    }

    #[test]
    fn rbac_and_combination() {
        let now = Utc::now();
        let perms = vec![Permission::new("secret/app/*".into(), "read".into(), None, now).unwrap()];
        let request = ctx("read", "secret", "app/db");
        assert_eq!(evaluate_permissions(&perms, &request), Decision::Allow);

        assert_eq!(
            combine(Decision::NotApplicable, Decision::Allow),
            Decision::Allow
        );
        assert_eq!(combine(Decision::Deny, Decision::Allow), Decision::Deny);
        assert_eq!(
            combine(Decision::NotApplicable, Decision::NotApplicable),
            Decision::NotApplicable
        );
    }

    #[test]
    fn policy_document_round_trip() {
        let p = AccessPolicy {
            id: PolicyId::new(),
            name: "office-hours".into(),
            effect: PolicyEffect::Deny,
            subject: SubjectSelector::default(),
            resource: ResourceSelector {
                types: vec!["secret".into()],
                patterns: vec![],
            },
            actions: vec!["read".into()],
            condition: Some(Condition::Cidr {
                attr: "request.ip".into(),
                net: "10.0.0.0/8".parse().unwrap(),
            }),
            priority: 50,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: AccessPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "office-hours");
        assert!(matches!(back.condition, Some(Condition::Cidr { .. })));
    }
}
