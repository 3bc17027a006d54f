// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Service Port
//!
//! The AEAD primitive every higher layer encrypts through. The service owns
//! no key material: each call fetches the master key from its
//! [`MasterKeyProvider`](crate::services::MasterKeyProvider) and fails with
//! `Sealed` while the vault is sealed.
//!
//! ## Contracts
//!
//! - Encrypt produces the envelope of
//!   [`CiphertextEnvelope`](crate::value_objects::CiphertextEnvelope) with a
//!   fresh 96-bit random nonce per call; nonces never repeat under one key.
//! - Decrypt failure modes are exactly: `InvalidCiphertext` (integrity or
//!   unknown version byte) and `Sealed`. There is deliberately no way to
//!   probe which key a ciphertext was produced under — all authentication
//!   failures are indistinguishable.
//! - Decrypted plaintext is returned in a zeroizing buffer; callers that
//!   convert it to long-lived state own the copy.
//!
//! The concrete implementation (AES-256-GCM over the `aes-gcm` crate) lives
//! in the infrastructure layer; the domain defines only this port so engine
//! logic and tests can swap it.

use zeroize::Zeroizing;

use crate::value_objects::CiphertextEnvelope;
use crate::VaultError;

/// Authenticated encryption used by every engine.
pub trait EncryptionService: Send + Sync {
    /// Encrypts `plaintext` with optional additional authenticated data.
    fn encrypt(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<CiphertextEnvelope, VaultError>;

    /// Decrypts an envelope previously produced by [`Self::encrypt`]. The
    /// same `aad` must be supplied or authentication fails.
    fn decrypt(
        &self,
        envelope: &CiphertextEnvelope,
        aad: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError>;

    /// Convenience: encrypts UTF-8 text to the base64 envelope form used by
    /// TEXT columns.
    fn encrypt_string(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<String, VaultError> {
        Ok(self.encrypt(plaintext.as_bytes(), aad)?.to_base64())
    }

    /// Convenience: decrypts a base64 envelope back to UTF-8 text. Non-UTF-8
    /// plaintext surfaces as `InvalidCiphertext` — the envelope was not
    /// produced by [`Self::encrypt_string`].
    fn decrypt_string(&self, encoded: &str, aad: Option<&[u8]>) -> Result<String, VaultError> {
        let envelope = CiphertextEnvelope::from_base64(encoded)?;
        let plaintext = self.decrypt(&envelope, aad)?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| VaultError::InvalidCiphertext)
    }
}
