// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KV Secrets Engine
//!
//! Versioned, path-addressed secret storage. Values are JSON maps encrypted
//! whole under the encryption service, with the normalized path as AEAD
//! associated data so a ciphertext cannot be replayed at another path.
//!
//! ## Write serialization
//!
//! Concurrent writers race on the repository's compare-and-set guard. When
//! the caller supplied a CAS expectation the conflict is theirs to see;
//! otherwise the engine re-reads and retries a bounded number of times, so
//! a successful write is always the unique holder of its version number.
//!
//! ## Audit shape
//!
//! Reads log `{version}`; writes log the previous version (or null) and
//! `{version, hash}` where `hash` is the SHA-256 of the plaintext JSON —
//! enough to prove *what* changed without ever logging the value.

use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use strongroom_domain::entities::{AuditStatus, Secret, SecretVersion};
use strongroom_domain::repositories::{AuditRepository, SecretRepository};
use strongroom_domain::services::EncryptionService;
use strongroom_domain::value_objects::SecretPath;
use strongroom_domain::VaultError;

use crate::application::context::Caller;
use crate::application::services::authz_service::AuthorizationService;

/// Bounded retries for engine-initiated CAS races (caller CAS never retries).
const WRITE_RETRIES: u32 = 3;

/// JSON object type stored at a path.
pub type SecretData = serde_json::Map<String, serde_json::Value>;

/// Metadata update parameters; `None` leaves a field unchanged.
#[derive(Debug, Default, Clone)]
pub struct MetadataUpdate {
    pub max_versions: Option<u32>,
    pub cas_required: Option<bool>,
    /// `Some(None)` clears the window, `Some(Some(secs))` sets it.
    pub delete_version_after_secs: Option<Option<u64>>,
    pub custom_metadata: Option<HashMap<String, String>>,
}

/// The versioned KV engine.
pub struct KvService {
    secrets: Arc<dyn SecretRepository>,
    encryption: Arc<dyn EncryptionService>,
    authz: Arc<AuthorizationService>,
    audit: Arc<dyn AuditRepository>,
}

impl KvService {
    pub fn new(
        secrets: Arc<dyn SecretRepository>,
        encryption: Arc<dyn EncryptionService>,
        authz: Arc<AuthorizationService>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            secrets,
            encryption,
            authz,
            audit,
        }
    }

    async fn enforce(
        &self,
        caller: &Caller,
        action: &str,
        path: &SecretPath,
    ) -> Result<(), VaultError> {
        let ctx = caller.request(action, "secret", Some(path.to_string()));
        self.authz.enforce(caller, &ctx).await
    }

    async fn audit_failure(
        &self,
        caller: &Caller,
        action: &str,
        path: &SecretPath,
        error: &VaultError,
    ) {
        let event = caller
            .audit(action, "secret", Some(path.to_string()), AuditStatus::Failure)
            .with_error(error.to_string());
        // Best effort; the primary error is already on its way out.
        let _ = self.audit.append(event).await;
    }

    /// Writes a new version at `path`, creating the secret on first write.
    /// Returns the version number assigned.
    pub async fn write(
        &self,
        caller: &Caller,
        path: &str,
        data: &SecretData,
        cas: Option<u32>,
    ) -> Result<u32, VaultError> {
        let path = SecretPath::new(path)?;
        self.enforce(caller, "write", &path).await?;

        let result = self.write_inner(caller, &path, data, cas).await;
        if let Err(e) = &result {
            self.audit_failure(caller, "write", &path, e).await;
        }
        result
    }

    async fn write_inner(
        &self,
        caller: &Caller,
        path: &SecretPath,
        data: &SecretData,
        cas: Option<u32>,
    ) -> Result<u32, VaultError> {
        let plaintext = serde_json::to_string(data)
            .map_err(|e| VaultError::InvalidArgument(format!("unserializable payload: {e}")))?;
        let plaintext_hash = hex::encode(Sha256::digest(plaintext.as_bytes()));

        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = chrono::Utc::now();
            let encrypted = self
                .encryption
                .encrypt_string(&plaintext, Some(path.as_str().as_bytes()))?;

            let outcome = match self.secrets.find_by_path(path).await? {
                None => {
                    // First write at this path. A CAS expectation other
                    // than 0 cannot match a nonexistent secret.
                    if let Some(expected) = cas {
                        if expected != 0 {
                            return Err(VaultError::Conflict(format!(
                                "check-and-set failed for '{path}': secret does not exist"
                            )));
                        }
                    }
                    let mut secret = Secret::new(path.clone(), now);
                    let version_number = secret.advance_version(now);
                    let version = SecretVersion::new(
                        secret.id,
                        version_number,
                        encrypted,
                        Some(caller.subject.id.clone()),
                        now,
                    );
                    let audit = caller
                        .audit("write", "secret", Some(path.to_string()), AuditStatus::Success)
                        .with_old_value(serde_json::json!({ "version": null }))
                        .with_new_value(serde_json::json!({
                            "version": version_number,
                            "hash": plaintext_hash,
                        }));
                    self.secrets
                        .create_with_version(&secret, &version, audit)
                        .await
                        .map(|_| version_number)
                }
                Some(mut secret) => {
                    secret.check_cas(cas)?;
                    let previous = secret.current_version;
                    let version_number = secret.advance_version(now);
                    let prune = secret.version_to_prune();
                    if let Some(pruned) = prune {
                        secret.raise_oldest(pruned + 1);
                    }
                    let version = SecretVersion::new(
                        secret.id,
                        version_number,
                        encrypted,
                        Some(caller.subject.id.clone()),
                        now,
                    );
                    let audit = caller
                        .audit("write", "secret", Some(path.to_string()), AuditStatus::Success)
                        .with_old_value(serde_json::json!({ "version": previous }))
                        .with_new_value(serde_json::json!({
                            "version": version_number,
                            "hash": plaintext_hash,
                        }));
                    self.secrets
                        .append_version(&secret, previous, &version, prune, audit)
                        .await
                        .map(|_| version_number)
                }
            };

            match outcome {
                Ok(version) => {
                    debug!(path = %path, version, "secret written");
                    return Ok(version);
                }
                // Engine-level race: retry only when the caller did not pin
                // a version themselves.
                Err(VaultError::Conflict(_)) if cas.is_none() && attempt <= WRITE_RETRIES => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads a version (default: current). Deleted, destroyed, aged-out,
    /// and out-of-range versions read as `NotFound`.
    pub async fn read(
        &self,
        caller: &Caller,
        path: &str,
        version: Option<u32>,
    ) -> Result<(SecretData, u32), VaultError> {
        let path = SecretPath::new(path)?;
        // Authorization precedes existence: a denied caller learns nothing
        // about whether the path exists.
        self.enforce(caller, "read", &path).await?;

        let result = self.read_inner(&path, version).await;
        match &result {
            Ok((_, resolved)) => {
                let event = caller
                    .audit("read", "secret", Some(path.to_string()), AuditStatus::Success)
                    .with_new_value(serde_json::json!({ "version": resolved }));
                self.audit.append(event).await?;
            }
            Err(e) => self.audit_failure(caller, "read", &path, e).await,
        }
        result
    }

    async fn read_inner(
        &self,
        path: &SecretPath,
        version: Option<u32>,
    ) -> Result<(SecretData, u32), VaultError> {
        let not_found = || VaultError::NotFound(format!("secret '{path}'"));
        let secret = self.secrets.find_by_path(path).await?.ok_or_else(not_found)?;

        let resolved = version.unwrap_or(secret.current_version);
        if !secret.version_in_range(resolved) {
            return Err(not_found());
        }
        let record = self
            .secrets
            .find_version(secret.id, resolved)
            .await?
            .ok_or_else(not_found)?;

        if record.is_destroyed()
            || record.is_deleted(secret.delete_version_after_secs, chrono::Utc::now())
        {
            return Err(not_found());
        }
        let payload = record.payload.as_deref().ok_or_else(not_found)?;
        let plaintext = self
            .encryption
            .decrypt_string(payload, Some(path.as_str().as_bytes()))?;
        let data: SecretData = serde_json::from_str(&plaintext)
            .map_err(|_| VaultError::InvalidCiphertext)?;
        Ok((data, resolved))
    }

    /// Soft-deletes the given versions. Already-deleted and destroyed
    /// versions are left untouched.
    pub async fn soft_delete(
        &self,
        caller: &Caller,
        path: &str,
        versions: &[u32],
    ) -> Result<(), VaultError> {
        self.version_lifecycle(caller, path, versions, "delete", |v, now| v.soft_delete(now))
            .await
    }

    /// Clears deletion marks on versions not yet destroyed.
    pub async fn undelete(
        &self,
        caller: &Caller,
        path: &str,
        versions: &[u32],
    ) -> Result<(), VaultError> {
        self.version_lifecycle(caller, path, versions, "undelete", |v, _| v.undelete())
            .await
    }

    /// Destroys versions: payloads wiped, irreversible.
    pub async fn destroy(
        &self,
        caller: &Caller,
        path: &str,
        versions: &[u32],
    ) -> Result<(), VaultError> {
        self.version_lifecycle(caller, path, versions, "destroy", |v, now| v.destroy(now))
            .await
    }

    async fn version_lifecycle(
        &self,
        caller: &Caller,
        path: &str,
        versions: &[u32],
        action: &str,
        transition: impl Fn(&mut SecretVersion, chrono::DateTime<chrono::Utc>),
    ) -> Result<(), VaultError> {
        let path = SecretPath::new(path)?;
        self.enforce(caller, action, &path).await?;

        if versions.is_empty() {
            return Err(VaultError::InvalidArgument("no versions given".into()));
        }

        let result = async {
            let secret = self
                .secrets
                .find_by_path(&path)
                .await?
                .ok_or_else(|| VaultError::NotFound(format!("secret '{path}'")))?;

            let now = chrono::Utc::now();
            let mut touched = Vec::new();
            for &number in versions {
                if let Some(mut record) = self.secrets.find_version(secret.id, number).await? {
                    let before = (record.deleted_at, record.destroyed_at, record.payload.is_some());
                    transition(&mut record, now);
                    let after = (record.deleted_at, record.destroyed_at, record.payload.is_some());
                    if before != after {
                        touched.push(record);
                    }
                }
            }
            if touched.is_empty() {
                // Idempotent no-op; still audited below.
                return Ok(Vec::new());
            }
            Ok(touched)
        }
        .await;

        match result {
            Ok(touched) => {
                let audit = caller
                    .audit(action, "secret", Some(path.to_string()), AuditStatus::Success)
                    .with_new_value(serde_json::json!({ "versions": versions }));
                if touched.is_empty() {
                    self.audit.append(audit).await?;
                } else {
                    self.secrets.update_versions(&touched, audit).await?;
                }
                Ok(())
            }
            Err(e) => {
                self.audit_failure(caller, action, &path, &e).await;
                Err(e)
            }
        }
    }

    /// Removes the secret and all versions. Terminal.
    pub async fn delete_metadata(&self, caller: &Caller, path: &str) -> Result<(), VaultError> {
        let path = SecretPath::new(path)?;
        self.enforce(caller, "delete", &path).await?;

        let secret = self
            .secrets
            .find_by_path(&path)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("secret '{path}'")))?;
        let audit = caller.audit(
            "delete_metadata",
            "secret",
            Some(path.to_string()),
            AuditStatus::Success,
        );
        self.secrets.delete_all(secret.id, audit).await
    }

    /// Lists immediate children under a prefix as directory-style entries
    /// (`leaf` or `subdir/`).
    pub async fn list(&self, caller: &Caller, prefix: &str) -> Result<Vec<String>, VaultError> {
        let normalized = prefix.trim_matches('/');
        let ctx = caller.request(
            "list",
            "secret",
            (!normalized.is_empty()).then(|| normalized.to_string()),
        );
        self.authz.enforce(caller, &ctx).await?;

        let paths = self.secrets.list_paths(normalized).await?;
        let mut entries = BTreeSet::new();
        for stored in &paths {
            if let Ok(stored_path) = SecretPath::new(stored) {
                if let Some(entry) = stored_path.child_entry_under(normalized) {
                    entries.insert(entry);
                }
            }
        }

        let event = caller
            .audit(
                "list",
                "secret",
                (!normalized.is_empty()).then(|| normalized.to_string()),
                AuditStatus::Success,
            )
            .with_new_value(serde_json::json!({ "entries": entries.len() }));
        self.audit.append(event).await?;
        Ok(entries.into_iter().collect())
    }

    /// Reads path-level metadata without touching version payloads.
    pub async fn read_metadata(&self, caller: &Caller, path: &str) -> Result<Secret, VaultError> {
        let path = SecretPath::new(path)?;
        self.enforce(caller, "read", &path).await?;

        let secret = self
            .secrets
            .find_by_path(&path)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("secret '{path}'")))?;

        let event = caller
            .audit(
                "read_metadata",
                "secret",
                Some(path.to_string()),
                AuditStatus::Success,
            )
            .with_new_value(serde_json::json!({ "current_version": secret.current_version }));
        self.audit.append(event).await?;
        Ok(secret)
    }

    /// Updates path-level metadata.
    pub async fn update_metadata(
        &self,
        caller: &Caller,
        path: &str,
        update: MetadataUpdate,
    ) -> Result<(), VaultError> {
        let path = SecretPath::new(path)?;
        self.enforce(caller, "write", &path).await?;

        let mut secret = self
            .secrets
            .find_by_path(&path)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("secret '{path}'")))?;

        let before = serde_json::json!({
            "max_versions": secret.max_versions,
            "cas_required": secret.cas_required,
            "delete_version_after_secs": secret.delete_version_after_secs,
        });
        if let Some(max_versions) = update.max_versions {
            if max_versions == 0 {
                return Err(VaultError::InvalidArgument(
                    "max_versions must be at least 1".into(),
                ));
            }
            secret.max_versions = max_versions;
        }
        if let Some(cas_required) = update.cas_required {
            secret.cas_required = cas_required;
        }
        if let Some(window) = update.delete_version_after_secs {
            secret.delete_version_after_secs = window;
        }
        if let Some(custom) = update.custom_metadata {
            secret.custom_metadata = custom;
        }
        secret.updated_at = chrono::Utc::now();

        let audit = caller
            .audit(
                "update_metadata",
                "secret",
                Some(path.to_string()),
                AuditStatus::Success,
            )
            .with_old_value(before)
            .with_new_value(serde_json::json!({
                "max_versions": secret.max_versions,
                "cas_required": secret.cas_required,
                "delete_version_after_secs": secret.delete_version_after_secs,
            }));
        self.secrets.update_metadata(&secret, audit).await
    }
}
