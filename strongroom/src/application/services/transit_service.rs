// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transit Engine
//!
//! Encryption-as-a-service over named, versioned keys: applications send
//! plaintext or ciphertext and key names; raw key material never leaves the
//! engine. Version material is wrapped under the master key (with the key
//! id and version as AEAD associated data) before it touches storage.
//!
//! Ciphertexts carry the producing key version in the `vault:v<N>:` prefix;
//! rotation therefore never re-encrypts existing data — old versions stay
//! decryptable until the minimum-decryption floor is raised past them, and
//! `rewrap` upgrades a ciphertext to the current version without the
//! plaintext ever leaving the engine.
//!
//! Symmetric types (AES-256-GCM, ChaCha20-Poly1305) serve
//! encrypt/decrypt/rewrap; asymmetric types (RSA, ECDSA, Ed25519) serve
//! sign/verify. Export is gated on the key's `exportable` flag and audited;
//! plaintext backup additionally requires `allow_plaintext_backup`.

use base64::engine::general_purpose;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use strongroom_domain::entities::{AuditStatus, TransitKey, TransitKeyVersion};
use strongroom_domain::repositories::{AuditRepository, TransitKeyRepository};
use strongroom_domain::services::EncryptionService;
use strongroom_domain::value_objects::{
    CiphertextEnvelope, TransitCiphertext, TransitKeyType, TRANSIT_PREFIX,
};
use strongroom_domain::VaultError;

use crate::application::context::Caller;
use crate::application::services::authz_service::AuthorizationService;
use crate::infrastructure::adapters::encryption::{
    open_aes256_gcm, open_chacha20_poly1305, seal_aes256_gcm, seal_chacha20_poly1305,
};
use crate::infrastructure::adapters::transit_crypto;

/// Configuration update; `None` leaves a field unchanged.
#[derive(Debug, Default, Clone)]
pub struct TransitConfigUpdate {
    pub min_decryption_version: Option<u32>,
    /// `Some(true)` pins minimum-encryption to the current version,
    /// `Some(false)` clears the pin.
    pub pin_min_encryption: Option<bool>,
    pub deletion_protected: Option<bool>,
    /// `Some(None)` disables auto-rotation.
    pub auto_rotate_interval_secs: Option<Option<u64>>,
}

/// A plaintext backup bundle (allow_plaintext_backup keys only).
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyBackup {
    pub name: String,
    pub key_type: TransitKeyType,
    pub latest_version: u32,
    pub min_decryption_version: u32,
    /// (version, base64 raw material) pairs.
    pub versions: Vec<(u32, String)>,
}

/// The transit engine.
pub struct TransitService {
    keys: Arc<dyn TransitKeyRepository>,
    encryption: Arc<dyn EncryptionService>,
    authz: Arc<AuthorizationService>,
    audit: Arc<dyn AuditRepository>,
}

impl TransitService {
    pub fn new(
        keys: Arc<dyn TransitKeyRepository>,
        encryption: Arc<dyn EncryptionService>,
        authz: Arc<AuthorizationService>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            keys,
            encryption,
            authz,
            audit,
        }
    }

    async fn enforce(&self, caller: &Caller, action: &str, name: &str) -> Result<(), VaultError> {
        let ctx = caller.request(action, "transit_key", Some(name.to_string()));
        self.authz.enforce(caller, &ctx).await
    }

    async fn load_key(&self, name: &str) -> Result<TransitKey, VaultError> {
        self.keys
            .find_by_name(name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("transit key '{name}'")))
    }

    /// AAD binding version material to its key and version.
    fn wrap_aad(key: &TransitKey, version: u32) -> Vec<u8> {
        format!("transit:{}:{}", key.id, version).into_bytes()
    }

    fn wrap_material(
        &self,
        key: &TransitKey,
        version: u32,
        material: &[u8],
    ) -> Result<String, VaultError> {
        Ok(self
            .encryption
            .encrypt(material, Some(&Self::wrap_aad(key, version)))?
            .to_base64())
    }

    async fn unwrap_material(
        &self,
        key: &TransitKey,
        version: u32,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let record = self
            .keys
            .find_version(key.id, version)
            .await?
            .ok_or(VaultError::InvalidCiphertext)?;
        if record.deleted_at.is_some() {
            return Err(VaultError::InvalidCiphertext);
        }
        let envelope = CiphertextEnvelope::from_base64(&record.wrapped_material)?;
        self.encryption
            .decrypt(&envelope, Some(&Self::wrap_aad(key, version)))
    }

    fn symmetric_key(material: &[u8]) -> Result<[u8; 32], VaultError> {
        material
            .try_into()
            .map_err(|_| VaultError::Internal("corrupt symmetric material".into()))
    }

    fn symmetric_seal(
        key_type: TransitKeyType,
        raw: &[u8; 32],
        plaintext: &[u8],
        context: Option<&[u8]>,
    ) -> Result<CiphertextEnvelope, VaultError> {
        match key_type {
            TransitKeyType::Aes256Gcm => seal_aes256_gcm(raw, plaintext, context),
            TransitKeyType::ChaCha20Poly1305 => seal_chacha20_poly1305(raw, plaintext, context),
            other => Err(VaultError::InvalidArgument(format!(
                "key type {other} does not support encryption"
            ))),
        }
    }

    fn symmetric_open(
        key_type: TransitKeyType,
        raw: &[u8; 32],
        envelope: &CiphertextEnvelope,
        context: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        match key_type {
            TransitKeyType::Aes256Gcm => open_aes256_gcm(raw, envelope, context),
            TransitKeyType::ChaCha20Poly1305 => open_chacha20_poly1305(raw, envelope, context),
            other => Err(VaultError::InvalidArgument(format!(
                "key type {other} does not support decryption"
            ))),
        }
    }

    // --- Key lifecycle ---

    pub async fn create_key(
        &self,
        caller: &Caller,
        name: &str,
        key_type: TransitKeyType,
        exportable: bool,
        allow_plaintext_backup: bool,
    ) -> Result<TransitKey, VaultError> {
        self.enforce(caller, "create", name).await?;

        let now = chrono::Utc::now();
        let key = TransitKey::new(
            name.to_string(),
            key_type,
            exportable,
            allow_plaintext_backup,
            now,
        )?;
        let material = transit_crypto::generate_material(key_type)?;
        let wrapped = self.wrap_material(&key, 1, &material)?;
        let version = TransitKeyVersion::new(key.id, 1, wrapped, now);

        let audit = caller
            .audit("create", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "type": key_type.as_str(),
                "exportable": exportable,
            }));
        self.keys.create(&key, &version, audit).await?;
        info!(key = name, key_type = %key_type, "transit key created");
        Ok(key)
    }

    pub async fn rotate(&self, caller: &Caller, name: &str) -> Result<u32, VaultError> {
        self.enforce(caller, "rotate", name).await?;
        self.rotate_internal(caller, name).await
    }

    async fn rotate_internal(&self, caller: &Caller, name: &str) -> Result<u32, VaultError> {
        let mut key = self.load_key(name).await?;
        let now = chrono::Utc::now();
        let new_version = key.rotate(now);
        let material = transit_crypto::generate_material(key.key_type)?;
        let wrapped = self.wrap_material(&key, new_version, &material)?;
        let version = TransitKeyVersion::new(key.id, new_version, wrapped, now);

        let audit = caller
            .audit("rotate", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_old_value(serde_json::json!({ "version": new_version - 1 }))
            .with_new_value(serde_json::json!({ "version": new_version }));
        self.keys.add_version(&key, &version, audit).await?;
        info!(key = name, version = new_version, "transit key rotated");
        Ok(new_version)
    }

    pub async fn update_config(
        &self,
        caller: &Caller,
        name: &str,
        update: TransitConfigUpdate,
    ) -> Result<TransitKey, VaultError> {
        self.enforce(caller, "update", name).await?;

        let mut key = self.load_key(name).await?;
        let before = serde_json::json!({
            "min_decryption_version": key.min_decryption_version,
            "min_encryption_version": key.min_encryption_version,
            "deletion_protected": key.deletion_protected,
        });
        key.update_config(
            update.min_decryption_version,
            update.pin_min_encryption,
            update.deletion_protected,
            update.auto_rotate_interval_secs,
            chrono::Utc::now(),
        )?;
        let audit = caller
            .audit("update", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_old_value(before)
            .with_new_value(serde_json::json!({
                "min_decryption_version": key.min_decryption_version,
                "min_encryption_version": key.min_encryption_version,
                "deletion_protected": key.deletion_protected,
            }));
        self.keys.update(&key, audit).await?;
        Ok(key)
    }

    /// Deletes a key and zeroizes all version material. Refused while
    /// deletion protection is on.
    pub async fn delete_key(&self, caller: &Caller, name: &str) -> Result<(), VaultError> {
        self.enforce(caller, "delete", name).await?;

        let key = self.load_key(name).await?;
        if key.deletion_protected {
            return Err(VaultError::Unsupported(format!(
                "transit key '{name}' is deletion-protected"
            )));
        }
        let audit = caller.audit("delete", "transit_key", Some(name.to_string()), AuditStatus::Success);
        self.keys.delete(key.id, audit).await
    }

    // --- Data operations ---

    /// Encrypts with the current version (or a caller-pinned version at or
    /// above the minimum-encryption floor). `context` is AEAD associated
    /// data and must be re-supplied on decrypt.
    pub async fn encrypt(
        &self,
        caller: &Caller,
        name: &str,
        plaintext: &[u8],
        context: Option<&[u8]>,
        pinned_version: Option<u32>,
    ) -> Result<String, VaultError> {
        self.enforce(caller, "encrypt", name).await?;

        let key = self.load_key(name).await?;
        if !key.key_type.supports_encryption() {
            return Err(VaultError::InvalidArgument(format!(
                "key type {} does not support encryption",
                key.key_type
            )));
        }
        let version = key.encryption_version(pinned_version)?;
        let material = self.unwrap_material(&key, version).await?;
        let raw = Self::symmetric_key(&material)?;

        let inner = Self::symmetric_seal(key.key_type, &raw, plaintext, context)?;
        let ciphertext = TransitCiphertext::new(version, inner).encode();

        let event = caller
            .audit("encrypt", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "version": version }));
        self.audit.append(event).await?;
        debug!(key = name, version, "transit encrypt");
        Ok(ciphertext)
    }

    /// Decrypts a `vault:v<N>:` ciphertext with the version it names.
    pub async fn decrypt(
        &self,
        caller: &Caller,
        name: &str,
        ciphertext: &str,
        context: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        self.enforce(caller, "decrypt", name).await?;
        let plaintext = self.decrypt_inner(name, ciphertext, context).await?;

        let event = caller
            .audit("decrypt", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "version": TransitCiphertext::parse(ciphertext)
                    .map(|tc| tc.key_version())
                    .unwrap_or(0),
            }));
        self.audit.append(event).await?;
        Ok(plaintext)
    }

    async fn decrypt_inner(
        &self,
        name: &str,
        ciphertext: &str,
        context: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let key = self.load_key(name).await?;
        if !key.key_type.supports_encryption() {
            return Err(VaultError::InvalidArgument(format!(
                "key type {} does not support decryption",
                key.key_type
            )));
        }
        let parsed = TransitCiphertext::parse(ciphertext)?;
        key.can_decrypt_version(parsed.key_version())?;
        let material = self.unwrap_material(&key, parsed.key_version()).await?;
        let raw = Self::symmetric_key(&material)?;

        Self::symmetric_open(key.key_type, &raw, parsed.inner(), context)
    }

    /// Re-encrypts an old-version ciphertext under the current version. The
    /// plaintext never leaves the engine.
    pub async fn rewrap(
        &self,
        caller: &Caller,
        name: &str,
        ciphertext: &str,
        context: Option<&[u8]>,
    ) -> Result<String, VaultError> {
        self.enforce(caller, "rewrap", name).await?;

        let key = self.load_key(name).await?;
        let old_version = TransitCiphertext::parse(ciphertext)?.key_version();
        let plaintext = self.decrypt_inner(name, ciphertext, context).await?;

        let current = key.encryption_version(None)?;
        let material = self.unwrap_material(&key, current).await?;
        let raw = Self::symmetric_key(&material)?;
        let inner = Self::symmetric_seal(key.key_type, &raw, &plaintext, context)?;
        let rewrapped = TransitCiphertext::new(current, inner).encode();

        let event = caller
            .audit("rewrap", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_old_value(serde_json::json!({ "version": old_version }))
            .with_new_value(serde_json::json!({ "version": current }));
        self.audit.append(event).await?;
        Ok(rewrapped)
    }

    /// Signs with an asymmetric key; output is `vault:v<N>:<base64 sig>`.
    pub async fn sign(
        &self,
        caller: &Caller,
        name: &str,
        data: &[u8],
        pinned_version: Option<u32>,
    ) -> Result<String, VaultError> {
        self.enforce(caller, "sign", name).await?;

        let key = self.load_key(name).await?;
        if !key.key_type.supports_signing() {
            return Err(VaultError::InvalidArgument(format!(
                "key type {} does not support signing",
                key.key_type
            )));
        }
        let version = key.encryption_version(pinned_version)?;
        let material = self.unwrap_material(&key, version).await?;
        let signature = transit_crypto::sign(key.key_type, &material, data)?;

        let event = caller
            .audit("sign", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "version": version }));
        self.audit.append(event).await?;
        Ok(format!(
            "{}{}:{}",
            TRANSIT_PREFIX,
            version,
            general_purpose::STANDARD.encode(signature)
        ))
    }

    /// Verifies a `vault:v<N>:` signature. Malformed signatures verify
    /// false rather than erroring.
    pub async fn verify(
        &self,
        caller: &Caller,
        name: &str,
        data: &[u8],
        signature: &str,
    ) -> Result<bool, VaultError> {
        self.enforce(caller, "verify", name).await?;

        let key = self.load_key(name).await?;
        if !key.key_type.supports_signing() {
            return Err(VaultError::InvalidArgument(format!(
                "key type {} does not support verification",
                key.key_type
            )));
        }

        let verified = match parse_signature(signature) {
            Some((version, sig_bytes)) if version >= 1 && version <= key.latest_version => {
                let material = self.unwrap_material(&key, version).await?;
                transit_crypto::verify(key.key_type, &material, data, &sig_bytes)?
            }
            _ => false,
        };

        let event = caller
            .audit("verify", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "verified": verified }));
        self.audit.append(event).await?;
        Ok(verified)
    }

    /// Exports raw material for one version (or all). Requires the
    /// exportable flag; heavily audited.
    pub async fn export(
        &self,
        caller: &Caller,
        name: &str,
        version: Option<u32>,
    ) -> Result<Vec<(u32, String)>, VaultError> {
        self.enforce(caller, "export", name).await?;

        let key = self.load_key(name).await?;
        if !key.exportable {
            return Err(VaultError::Unsupported(format!(
                "transit key '{name}' is not exportable"
            )));
        }

        let versions: Vec<u32> = match version {
            Some(v) => vec![v],
            None => (key.min_decryption_version..=key.latest_version).collect(),
        };
        let mut exported = Vec::with_capacity(versions.len());
        for v in versions {
            key.can_decrypt_version(v)?;
            let material = self.unwrap_material(&key, v).await?;
            exported.push((v, general_purpose::STANDARD.encode(&*material)));
        }

        let event = caller
            .audit("export", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "versions": exported.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
            }));
        self.audit.append(event).await?;
        info!(key = name, "transit key material exported");
        Ok(exported)
    }

    /// Produces a plaintext backup bundle. Requires both `exportable` and
    /// `allow_plaintext_backup`.
    pub async fn backup(&self, caller: &Caller, name: &str) -> Result<String, VaultError> {
        self.enforce(caller, "backup", name).await?;

        let key = self.load_key(name).await?;
        if !key.exportable || !key.allow_plaintext_backup {
            return Err(VaultError::Unsupported(format!(
                "transit key '{name}' does not allow plaintext backup"
            )));
        }

        let mut versions = Vec::new();
        for v in 1..=key.latest_version {
            let material = self.unwrap_material(&key, v).await?;
            versions.push((v, general_purpose::STANDARD.encode(&*material)));
        }
        let bundle = KeyBackup {
            name: key.name.clone(),
            key_type: key.key_type,
            latest_version: key.latest_version,
            min_decryption_version: key.min_decryption_version,
            versions,
        };
        let encoded = general_purpose::STANDARD.encode(
            serde_json::to_vec(&bundle)
                .map_err(|e| VaultError::Internal(format!("backup serialization: {e}")))?,
        );

        let event = caller
            .audit("backup", "transit_key", Some(name.to_string()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "versions": bundle.latest_version }));
        self.audit.append(event).await?;
        Ok(encoded)
    }

    /// Restores a backup bundle as a new key. Fails with `Conflict` if the
    /// name is taken.
    pub async fn restore(&self, caller: &Caller, bundle: &str) -> Result<TransitKey, VaultError> {
        let decoded = general_purpose::STANDARD
            .decode(bundle)
            .map_err(|_| VaultError::InvalidArgument("malformed backup bundle".into()))?;
        let backup: KeyBackup = serde_json::from_slice(&decoded)
            .map_err(|_| VaultError::InvalidArgument("malformed backup bundle".into()))?;

        self.enforce(caller, "restore", &backup.name).await?;
        if self.keys.find_by_name(&backup.name).await?.is_some() {
            return Err(VaultError::Conflict(format!(
                "transit key '{}' already exists",
                backup.name
            )));
        }

        let now = chrono::Utc::now();
        let mut key = TransitKey::new(backup.name.clone(), backup.key_type, true, true, now)?;
        key.latest_version = backup.latest_version;
        key.min_decryption_version = backup.min_decryption_version;

        let mut versions = backup.versions.iter();
        let Some((first_number, first_material)) = versions.next() else {
            return Err(VaultError::InvalidArgument("backup bundle has no versions".into()));
        };
        let first = self.restored_version(&key, *first_number, first_material, now)?;
        let audit = caller
            .audit("restore", "transit_key", Some(backup.name.clone()), AuditStatus::Success)
            .with_new_value(serde_json::json!({ "versions": backup.latest_version }));
        self.keys.create(&key, &first, audit).await?;

        for (number, material) in versions {
            let record = self.restored_version(&key, *number, material, now)?;
            let audit = caller.audit(
                "restore",
                "transit_key",
                Some(backup.name.clone()),
                AuditStatus::Success,
            );
            self.keys.add_version(&key, &record, audit).await?;
        }
        Ok(key)
    }

    fn restored_version(
        &self,
        key: &TransitKey,
        number: u32,
        material_b64: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<TransitKeyVersion, VaultError> {
        let material = Zeroizing::new(
            general_purpose::STANDARD
                .decode(material_b64)
                .map_err(|_| VaultError::InvalidArgument("malformed backup material".into()))?,
        );
        let wrapped = self.wrap_material(key, number, &material)?;
        Ok(TransitKeyVersion::new(key.id, number, wrapped, now))
    }

    /// One pass of the auto-rotation sweep; returns the keys rotated.
    pub async fn run_auto_rotation(&self) -> Result<Vec<String>, VaultError> {
        let now = chrono::Utc::now();
        let system = Caller::system();
        let mut rotated = Vec::new();
        for key in self.keys.list_all().await? {
            if key.rotation_due(now) {
                self.rotate_internal(&system, &key.name).await?;
                rotated.push(key.name);
            }
        }
        Ok(rotated)
    }

    /// Spawns the background auto-rotation sweeper.
    pub fn spawn_auto_rotation(
        self: &Arc<Self>,
        token: strongroom_bootstrap::CancellationToken,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("transit auto-rotation sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match service.run_auto_rotation().await {
                            Ok(rotated) if !rotated.is_empty() => {
                                info!(count = rotated.len(), "auto-rotated transit keys");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!(error = %e, "auto-rotation pass failed"),
                        }
                    }
                }
            }
        })
    }
}

fn parse_signature(text: &str) -> Option<(u32, Vec<u8>)> {
    let rest = text.strip_prefix(TRANSIT_PREFIX)?;
    let (version, payload) = rest.split_once(':')?;
    let version: u32 = version.parse().ok()?;
    let bytes = general_purpose::STANDARD.decode(payload).ok()?;
    Some((version, bytes))
}
