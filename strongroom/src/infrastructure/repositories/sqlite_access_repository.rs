// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the access-control repository.
//!
//! Policy selectors, action lists, and condition expressions are stored as
//! JSON TEXT and parsed into the typed trees at load — the request path
//! never evaluates raw JSON.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;

use strongroom_domain::entities::access_control::PolicyEffect;
use strongroom_domain::entities::{AccessPolicy, AuditEvent, Permission, Role};
use strongroom_domain::repositories::AccessControlRepository;
use strongroom_domain::services::policy::{Condition, ResourceSelector, SubjectSelector};
use strongroom_domain::value_objects::{PermissionId, PolicyId, RoleId};
use strongroom_domain::VaultError;

use super::audit_chain::AuditChainWriter;
use super::row::{get_bool, get_i64, get_id, get_opt_string, get_string, get_ts, storage_err, ts, write_err};

pub struct SqliteAccessRepository {
    chain: Arc<AuditChainWriter>,
}

impl SqliteAccessRepository {
    pub fn new(chain: Arc<AuditChainWriter>) -> Self {
        Self { chain }
    }
}

fn map_role_row(row: &SqliteRow) -> Result<Role, VaultError> {
    Ok(Role {
        id: get_id(row, "id")?,
        name: get_string(row, "name")?,
        description: get_opt_string(row, "description")?,
        is_system: get_bool(row, "is_system")?,
        priority: get_i64(row, "priority")? as i32,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn map_permission_row(row: &SqliteRow) -> Result<Permission, VaultError> {
    Ok(Permission {
        id: get_id(row, "id")?,
        resource: get_string(row, "resource")?,
        action: get_string(row, "action")?,
        description: get_opt_string(row, "description")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, VaultError> {
    serde_json::from_str(text).map_err(|e| VaultError::Internal(format!("bad {what}: {e}")))
}

fn map_policy_row(row: &SqliteRow) -> Result<AccessPolicy, VaultError> {
    let effect = match get_string(row, "effect")?.as_str() {
        "allow" => PolicyEffect::Allow,
        "deny" => PolicyEffect::Deny,
        other => {
            return Err(VaultError::Internal(format!("bad policy effect '{other}'")));
        }
    };
    let subject: SubjectSelector = parse_json(&get_string(row, "subject_selector")?, "subject selector")?;
    let resource: ResourceSelector =
        parse_json(&get_string(row, "resource_selector")?, "resource selector")?;
    let actions: Vec<String> = parse_json(&get_string(row, "actions")?, "action list")?;
    let condition: Option<Condition> = get_opt_string(row, "condition_expr")?
        .map(|text| parse_json(&text, "condition"))
        .transpose()?;

    Ok(AccessPolicy {
        id: get_id(row, "id")?,
        name: get_string(row, "name")?,
        effect,
        subject,
        resource,
        actions,
        condition,
        priority: get_i64(row, "priority")? as i32,
        enabled: get_bool(row, "enabled")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn effect_str(effect: PolicyEffect) -> &'static str {
    match effect {
        PolicyEffect::Allow => "allow",
        PolicyEffect::Deny => "deny",
    }
}

#[async_trait]
impl AccessControlRepository for SqliteAccessRepository {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, VaultError> {
        let row = sqlx::query("SELECT * FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_role_row).transpose()
    }

    async fn list_roles(&self) -> Result<Vec<Role>, VaultError> {
        let rows = sqlx::query("SELECT * FROM roles ORDER BY priority DESC, name")
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_role_row).collect()
    }

    async fn create_role(&self, role: &Role, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO roles (id, name, description, is_system, priority, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.is_system as i64)
        .bind(role.priority as i64)
        .bind(ts(&role.created_at))
        .bind(ts(&role.updated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(|e| write_err(e, format!("role '{}'", role.name).as_str()))?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_role(&self, id: RoleId, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        let result = sqlx::query("DELETE FROM roles WHERE id = ? AND is_system = 0")
            .bind(id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("deletable role {id}")));
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn find_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<Option<Permission>, VaultError> {
        let row = sqlx::query("SELECT * FROM permissions WHERE resource = ? AND action = ?")
            .bind(resource)
            .bind(action)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_permission_row).transpose()
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, VaultError> {
        let rows = sqlx::query("SELECT * FROM permissions ORDER BY resource, action")
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_permission_row).collect()
    }

    async fn create_permission(
        &self,
        permission: &Permission,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO permissions (id, resource, action, description, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(permission.id.to_string())
        .bind(&permission.resource)
        .bind(&permission.action)
        .bind(&permission.description)
        .bind(ts(&permission.created_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(|e| {
            write_err(
                e,
                format!("permission ({}, {})", permission.resource, permission.action).as_str(),
            )
        })?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_permission(
        &self,
        id: PermissionId,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("permission {id}")));
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)",
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn permissions_for_roles(
        &self,
        role_names: &[String],
    ) -> Result<Vec<Permission>, VaultError> {
        if role_names.is_empty() {
            return Ok(Vec::new());
        }
        // Bind a placeholder per role name.
        let placeholders = vec!["?"; role_names.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT p.* FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             JOIN roles r ON r.id = rp.role_id \
             WHERE r.name IN ({placeholders}) \
             ORDER BY p.resource, p.action"
        );
        let mut query = sqlx::query(&sql);
        for name in role_names {
            query = query.bind(name);
        }
        let rows = query
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_permission_row).collect()
    }

    async fn find_policy_by_name(&self, name: &str) -> Result<Option<AccessPolicy>, VaultError> {
        let row = sqlx::query("SELECT * FROM access_policies WHERE name = ?")
            .bind(name)
            .fetch_optional(self.chain.pool())
            .await
            .map_err(storage_err)?;
        row.as_ref().map(map_policy_row).transpose()
    }

    async fn list_policies(&self) -> Result<Vec<AccessPolicy>, VaultError> {
        let rows = sqlx::query("SELECT * FROM access_policies ORDER BY priority DESC, name")
            .fetch_all(self.chain.pool())
            .await
            .map_err(storage_err)?;
        rows.iter().map(map_policy_row).collect()
    }

    async fn save_policy(
        &self,
        policy: &AccessPolicy,
        audit: AuditEvent,
    ) -> Result<(), VaultError> {
        policy.validate()?;
        let subject_json = serde_json::to_string(&policy.subject)
            .map_err(|e| VaultError::Internal(format!("subject serialization: {e}")))?;
        let resource_json = serde_json::to_string(&policy.resource)
            .map_err(|e| VaultError::Internal(format!("resource serialization: {e}")))?;
        let actions_json = serde_json::to_string(&policy.actions)
            .map_err(|e| VaultError::Internal(format!("actions serialization: {e}")))?;
        let condition_json = policy
            .condition
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| VaultError::Internal(format!("condition serialization: {e}")))?;

        let mut chain_tx = self.chain.begin().await?;
        sqlx::query(
            "INSERT INTO access_policies \
             (id, name, effect, subject_selector, resource_selector, actions, condition_expr, \
              priority, enabled, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
               effect = excluded.effect, \
               subject_selector = excluded.subject_selector, \
               resource_selector = excluded.resource_selector, \
               actions = excluded.actions, \
               condition_expr = excluded.condition_expr, \
               priority = excluded.priority, \
               enabled = excluded.enabled, \
               updated_at = excluded.updated_at",
        )
        .bind(policy.id.to_string())
        .bind(&policy.name)
        .bind(effect_str(policy.effect))
        .bind(&subject_json)
        .bind(&resource_json)
        .bind(&actions_json)
        .bind(&condition_json)
        .bind(policy.priority as i64)
        .bind(policy.enabled as i64)
        .bind(ts(&policy.created_at))
        .bind(ts(&policy.updated_at))
        .execute(&mut **chain_tx.tx())
        .await
        .map_err(storage_err)?;

        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }

    async fn delete_policy(&self, id: PolicyId, audit: AuditEvent) -> Result<(), VaultError> {
        let mut chain_tx = self.chain.begin().await?;
        let result = sqlx::query("DELETE FROM access_policies WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut **chain_tx.tx())
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("policy {id}")));
        }
        chain_tx.append(audit).await?;
        chain_tx.commit().await
    }
}
