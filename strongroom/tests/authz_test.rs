// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Authorization engine integration tests: RBAC grants, ABAC policies,
//! deny-overrides, cache invalidation, and fail-closed semantics.

mod common;

use common::{admin_caller, caller_with_roles, initialize, test_vault};
use strongroom::application::services::{AuthorizationService, SecretData};
use strongroom_domain::entities::access_control::PolicyEffect;
use strongroom_domain::services::policy::{Condition, ResourceSelector, SubjectSelector};
use strongroom_domain::services::Decision;
use strongroom_domain::VaultError;

fn data() -> SecretData {
    let mut map = SecretData::new();
    map.insert("k".into(), serde_json::json!("v"));
    map
}

#[tokio::test]
async fn rbac_grant_allows_matching_paths_only() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();

    vault.kv.write(&admin, "app/db", &data(), None).await.unwrap();
    vault.kv.write(&admin, "infra/db", &data(), None).await.unwrap();

    vault.authz.create_role(&admin, "dev", None, 10).await.unwrap();
    vault
        .authz
        .create_permission(&admin, "secret/app/*", "read", None)
        .await
        .unwrap();
    vault
        .authz
        .grant_permission(&admin, "dev", "secret/app/*", "read")
        .await
        .unwrap();

    let dev = caller_with_roles("alice", &["dev"]);
    assert!(vault.kv.read(&dev, "app/db", None).await.is_ok());
    // Outside the pattern, and for a different action, the grant is silent.
    assert_eq!(
        vault.kv.read(&dev, "infra/db", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
    assert_eq!(
        vault.kv.write(&dev, "app/db", &data(), None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}

#[tokio::test]
async fn abac_deny_overrides_rbac_allow() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();

    vault.kv.write(&admin, "app/db", &data(), None).await.unwrap();
    vault.authz.create_role(&admin, "dev", None, 10).await.unwrap();
    vault
        .authz
        .create_permission(&admin, "secret/*", "read", None)
        .await
        .unwrap();
    vault
        .authz
        .grant_permission(&admin, "dev", "secret/*", "read")
        .await
        .unwrap();

    let dev = caller_with_roles("alice", &["dev"]);
    assert!(vault.kv.read(&dev, "app/db", None).await.is_ok());

    // A deny policy against the dev role wins over the RBAC allow.
    let deny = AuthorizationService::build_policy(
        "deny-dev-reads",
        PolicyEffect::Deny,
        SubjectSelector {
            ids: vec![],
            roles: vec!["dev".into()],
            groups: vec![],
        },
        ResourceSelector {
            types: vec!["secret".into()],
            patterns: vec![],
        },
        vec!["read".into()],
        None,
        100,
    );
    vault.authz.save_policy(&admin, deny).await.unwrap();

    assert_eq!(
        vault.kv.read(&dev, "app/db", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
    // The admin is untouched by the dev-scoped policy.
    assert!(vault.kv.read(&admin, "app/db", None).await.is_ok());

    // Dropping the policy restores the grant.
    vault.authz.delete_policy(&admin, "deny-dev-reads").await.unwrap();
    assert!(vault.kv.read(&dev, "app/db", None).await.is_ok());
}

#[tokio::test]
async fn abac_allow_works_without_rbac() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "team/docs", &data(), None).await.unwrap();

    let allow = AuthorizationService::build_policy(
        "allow-bob-docs",
        PolicyEffect::Allow,
        SubjectSelector {
            ids: vec!["bob".into()],
            roles: vec![],
            groups: vec![],
        },
        ResourceSelector {
            types: vec!["secret".into()],
            patterns: vec!["secret/team/*".into()],
        },
        vec!["read".into()],
        None,
        10,
    );
    vault.authz.save_policy(&admin, allow).await.unwrap();

    let bob = caller_with_roles("bob", &[]);
    assert!(vault.kv.read(&bob, "team/docs", None).await.is_ok());
    let eve = caller_with_roles("eve", &[]);
    assert_eq!(
        vault.kv.read(&eve, "team/docs", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}

#[tokio::test]
async fn cidr_condition_gates_by_source_ip() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "internal", &data(), None).await.unwrap();

    let allow = AuthorizationService::build_policy(
        "allow-office-network",
        PolicyEffect::Allow,
        SubjectSelector::default(),
        ResourceSelector {
            types: vec!["secret".into()],
            patterns: vec![],
        },
        vec!["read".into()],
        Some(Condition::Cidr {
            attr: "request.ip".into(),
            net: "10.0.0.0/8".parse().unwrap(),
        }),
        10,
    );
    vault.authz.save_policy(&admin, allow).await.unwrap();

    let inside = caller_with_roles("carol", &[]).with_source_ip("10.1.2.3".parse().unwrap());
    assert!(vault.kv.read(&inside, "internal", None).await.is_ok());

    let outside = caller_with_roles("carol", &[]).with_source_ip("203.0.113.9".parse().unwrap());
    assert_eq!(
        vault.kv.read(&outside, "internal", None).await.unwrap_err(),
        VaultError::Unauthorized
    );

    // No source IP at all: the condition cannot evaluate, so the policy
    // fails closed.
    let unknown = caller_with_roles("carol", &[]);
    assert_eq!(
        vault.kv.read(&unknown, "internal", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}

#[tokio::test]
async fn decision_cache_invalidates_on_model_changes() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "cached", &data(), None).await.unwrap();

    vault.authz.create_role(&admin, "reader", None, 0).await.unwrap();
    vault
        .authz
        .create_permission(&admin, "secret/*", "read", None)
        .await
        .unwrap();
    vault
        .authz
        .grant_permission(&admin, "reader", "secret/*", "read")
        .await
        .unwrap();

    let reader = caller_with_roles("dana", &["reader"]);
    // Prime the cache with an Allow.
    assert!(vault.kv.read(&reader, "cached", None).await.is_ok());

    // Revoking the grant must take effect immediately, TTL notwithstanding.
    vault
        .authz
        .revoke_permission(&admin, "reader", "secret/*", "read")
        .await
        .unwrap();
    assert_eq!(
        vault.kv.read(&reader, "cached", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}

#[tokio::test]
async fn system_roles_resist_deletion() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();

    assert!(matches!(
        vault.authz.delete_role(&admin, "admin").await,
        Err(VaultError::Unsupported(_))
    ));
    assert!(matches!(
        vault.authz.delete_role(&admin, "auditor").await,
        Err(VaultError::Unsupported(_))
    ));

    // Ordinary roles delete fine.
    vault.authz.create_role(&admin, "temp", None, 0).await.unwrap();
    vault.authz.delete_role(&admin, "temp").await.unwrap();
}

#[tokio::test]
async fn auditor_role_covers_audit_surface_only() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "x", &data(), None).await.unwrap();

    let auditor = caller_with_roles("auditor-1", &["auditor"]);
    let from = chrono::Utc::now() - chrono::Duration::hours(1);
    let to = chrono::Utc::now() + chrono::Duration::hours(1);
    assert!(vault.audit.verify(&auditor, from, to).await.unwrap().is_intact());
    assert!(vault.audit.list(&auditor, from, to).await.is_ok());

    // But no secret access.
    assert_eq!(
        vault.kv.read(&auditor, "x", None).await.unwrap_err(),
        VaultError::Unauthorized
    );
}

#[tokio::test]
async fn decide_reports_not_applicable_without_grants() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;

    let nobody = caller_with_roles("nobody", &[]);
    let ctx = nobody.request("read", "secret", Some("anything".into()));
    assert_eq!(vault.authz.decide(&ctx).await, Decision::NotApplicable);

    let admin = admin_caller();
    let ctx = admin.request("read", "secret", Some("anything".into()));
    assert_eq!(vault.authz.decide(&ctx).await, Decision::Allow);
}
