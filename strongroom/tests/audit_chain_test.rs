// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Audit log integration tests: chain construction, tamper detection,
//! redaction at append, retention, and the denied-operation trail.

mod common;

use chrono::{Duration, Utc};
use std::collections::HashMap;

use common::{admin_caller, caller_with_roles, initialize, test_vault};
use strongroom::application::services::SecretData;
use strongroom_domain::entities::AuditStatus;
use strongroom_domain::services::audit_hash::ChainFault;

fn window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
}

fn data(value: &str) -> SecretData {
    let mut map = SecretData::new();
    map.insert("k".into(), serde_json::json!(value));
    map
}

#[tokio::test]
async fn operations_build_a_verifiable_chain() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "a", &data("1"), None).await.unwrap();
    vault.kv.write(&caller, "a", &data("2"), None).await.unwrap();
    vault.kv.read(&caller, "a", None).await.unwrap();

    let (from, to) = window();
    let records = vault.audit.list(&caller, from, to).await.unwrap();
    // Seeding + writes + read all landed.
    assert!(records.len() >= 3);

    // Every previous_hash links to its predecessor; the head is empty.
    assert!(records[0].previous_hash.is_empty());
    for pair in records.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].current_hash);
    }

    let report = vault.audit.verify(&caller, from, to).await.unwrap();
    assert!(report.is_intact());
    assert_eq!(report.records_checked, records.len() as u64);
}

#[tokio::test]
async fn tampering_is_detected_at_the_record() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault.kv.write(&caller, "a", &data("1"), None).await.unwrap();
    vault.kv.write(&caller, "a", &data("2"), None).await.unwrap();
    vault.kv.read(&caller, "a", None).await.unwrap();

    let (from, to) = window();
    let records = vault.audit.list(&caller, from, to).await.unwrap();
    let victim = &records[records.len() / 2];

    // Edit a field directly in the store, bypassing the engine.
    sqlx::query("UPDATE audit_logs SET action = 'forged' WHERE id = ?")
        .bind(victim.id.to_string())
        .execute(&harness.pool)
        .await
        .unwrap();

    let report = vault.audit.verify(&caller, from, to).await.unwrap();
    let (failed_id, fault) = report.failure.expect("tampering must be detected");
    assert_eq!(failed_id, victim.id);
    assert_eq!(fault, ChainFault::HashMismatch);
    // Verification aborted at the offending record.
    assert!(report.records_checked < records.len() as u64);
}

#[tokio::test]
async fn kv_audit_records_carry_hashes_not_plaintext() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    vault
        .kv
        .write(&caller, "app/db", &data("super-secret-value"), None)
        .await
        .unwrap();
    vault.kv.read(&caller, "app/db", None).await.unwrap();

    let (from, to) = window();
    let records = vault.audit.list(&caller, from, to).await.unwrap();

    let write = records
        .iter()
        .find(|r| r.action == "write" && r.resource_id.as_deref() == Some("app/db"))
        .unwrap();
    let new_value = write.new_value.as_ref().unwrap();
    assert!(new_value.contains("\"version\":1"));
    assert!(new_value.contains("hash"));
    assert!(!new_value.contains("super-secret-value"));
    assert_eq!(write.old_value.as_deref(), Some("{\"version\":null}"));

    let read = records
        .iter()
        .find(|r| r.action == "read" && r.resource_id.as_deref() == Some("app/db"))
        .unwrap();
    assert_eq!(read.new_value.as_deref(), Some("{\"version\":1}"));
    assert_eq!(read.status, AuditStatus::Success);
}

#[tokio::test]
async fn sensitive_fields_are_redacted_at_append() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    // configure_database snapshots its parameters; the password field must
    // land redacted.
    vault
        .db_creds
        .configure_database(
            &caller,
            strongroom::application::services::DatabaseConfigParams {
                name: "db1".into(),
                plugin: strongroom_domain::entities::DatabasePlugin::Postgres,
                connection_url: "postgres://localhost/app".into(),
                admin_username: "root".into(),
                admin_password: "hunter2".into(),
                max_connections: 2,
                connect_timeout_secs: 5,
                options: HashMap::new(),
            },
        )
        .await
        .unwrap();

    let (from, to) = window();
    let records = vault.audit.list(&caller, from, to).await.unwrap();
    let configured = records
        .iter()
        .find(|r| r.resource_type == "database" && r.action == "write")
        .unwrap();
    let snapshot = configured.new_value.as_ref().unwrap();
    assert!(snapshot.contains("[REDACTED]"));
    assert!(!snapshot.contains("hunter2"));
    assert!(!snapshot.contains("present"), "password value is replaced entirely");
}

#[tokio::test]
async fn denied_operations_leave_a_trail() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let admin = admin_caller();
    vault.kv.write(&admin, "guarded", &data("v"), None).await.unwrap();

    let nobody = caller_with_roles("mallory", &[]);
    let _ = vault.kv.read(&nobody, "guarded", None).await;

    let (from, to) = window();
    let records = vault.audit.list(&admin, from, to).await.unwrap();
    let denial = records
        .iter()
        .find(|r| r.status == AuditStatus::Denied)
        .expect("denial must be audited");
    assert_eq!(denial.actor_id.as_deref(), Some("mallory"));
    assert_eq!(denial.action, "read");
    assert_eq!(denial.resource_id.as_deref(), Some("guarded"));

    // The denial chains like everything else.
    assert!(vault.audit.verify(&admin, from, to).await.unwrap().is_intact());
}

#[tokio::test]
async fn retention_cleanup_preserves_suffix_verifiability() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller();

    for i in 0..4 {
        vault
            .kv
            .write(&caller, &format!("p{i}"), &data("v"), None)
            .await
            .unwrap();
    }
    let (from, to) = window();
    let before = vault.audit.list(&caller, from, to).await.unwrap();

    // Age the first two records past a 1-day retention, then clean up.
    let old = (Utc::now() - Duration::days(2)).to_rfc3339();
    for record in &before[..2] {
        sqlx::query("UPDATE audit_logs SET created_at = ? WHERE id = ?")
            .bind(&old)
            .bind(record.id.to_string())
            .execute(&harness.pool)
            .await
            .unwrap();
    }
    let removed = vault.audit.cleanup(1).await.unwrap();
    assert_eq!(removed, 2);

    // The remaining suffix verifies from its floor; the cut is by design.
    let report = vault.audit.verify(&caller, from, to).await.unwrap();
    assert!(report.is_intact());
    assert_eq!(report.records_checked, (before.len() - 2) as u64);
}

#[tokio::test]
async fn correlation_ids_propagate_from_the_caller() {
    let harness = test_vault().await;
    let vault = &harness.vault;
    initialize(vault, 3, 2).await;
    let caller = admin_caller().with_correlation_id("req-42");

    vault.kv.write(&caller, "traced", &data("v"), None).await.unwrap();

    let (from, to) = window();
    let records = vault.audit.list(&admin_caller(), from, to).await.unwrap();
    let write = records
        .iter()
        .find(|r| r.resource_id.as_deref() == Some("traced"))
        .unwrap();
    assert_eq!(write.correlation_id, "req-42");

    // Absent a caller-supplied id, one is generated.
    assert!(!records[0].correlation_id.is_empty());
}
