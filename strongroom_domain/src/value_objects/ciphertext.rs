// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ciphertext Wire Formats
//!
//! Two envelope shapes, both bit-exact per the external interface contract:
//!
//! - [`CiphertextEnvelope`] — the AEAD envelope produced by the encryption
//!   service: `{version:u8 | nonce:12 | ciphertext:N | tag:16}`,
//!   base64-encoded when stored as text. Version byte `0x01` is AES-256-GCM.
//! - [`TransitCiphertext`] — the transit engine's versioned wrapper:
//!   `vault:v<key-version>:<base64 inner bytes>`, where the prefix records
//!   which transit key version produced the inner envelope.
//!
//! Parsing failures of either form are uniformly [`VaultError::InvalidCiphertext`];
//! the decoder never reveals *why* a ciphertext was rejected.

use base64::engine::general_purpose;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::VaultError;

/// Envelope version byte for AES-256-GCM.
pub const ENVELOPE_VERSION_AES256_GCM: u8 = 0x01;

/// AEAD nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Prefix carried by every transit ciphertext.
pub const TRANSIT_PREFIX: &str = "vault:v";

/// A parsed AEAD ciphertext envelope.
///
/// `ciphertext` holds the encrypted payload with the 16-byte tag appended,
/// exactly as the AEAD in-place API produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextEnvelope {
    version: u8,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl CiphertextEnvelope {
    /// Assembles an envelope from freshly produced AEAD output.
    pub fn new(version: u8, nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self {
            version,
            nonce,
            ciphertext,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext bytes including the trailing tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serializes to the binary wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len());
        out.push(self.version);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the binary wire form. The shortest valid envelope carries an
    /// empty plaintext: version byte, nonce, and a bare tag.
    pub fn from_bytes(data: &[u8]) -> Result<Self, VaultError> {
        if data.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(VaultError::InvalidCiphertext);
        }
        let version = data[0];
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[1..1 + NONCE_LEN]);
        Ok(Self {
            version,
            nonce,
            ciphertext: data[1 + NONCE_LEN..].to_vec(),
        })
    }

    /// Base64 form used for TEXT storage.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| VaultError::InvalidCiphertext)?;
        Self::from_bytes(&bytes)
    }
}

/// A transit ciphertext: key version prefix plus inner envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitCiphertext {
    key_version: u32,
    inner: CiphertextEnvelope,
}

impl TransitCiphertext {
    pub fn new(key_version: u32, inner: CiphertextEnvelope) -> Self {
        Self { key_version, inner }
    }

    /// The transit key version that produced this ciphertext.
    pub fn key_version(&self) -> u32 {
        self.key_version
    }

    pub fn inner(&self) -> &CiphertextEnvelope {
        &self.inner
    }

    /// Encodes to the `vault:v<N>:<base64>` textual form.
    pub fn encode(&self) -> String {
        format!(
            "{}{}:{}",
            TRANSIT_PREFIX,
            self.key_version,
            self.inner.to_base64()
        )
    }

    /// Parses the textual form.
    pub fn parse(text: &str) -> Result<Self, VaultError> {
        let rest = text
            .strip_prefix(TRANSIT_PREFIX)
            .ok_or(VaultError::InvalidCiphertext)?;
        let (version_str, payload) = rest.split_once(':').ok_or(VaultError::InvalidCiphertext)?;
        let key_version: u32 = version_str
            .parse()
            .map_err(|_| VaultError::InvalidCiphertext)?;
        if key_version == 0 {
            return Err(VaultError::InvalidCiphertext);
        }
        let inner = CiphertextEnvelope::from_base64(payload)?;
        Ok(Self { key_version, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CiphertextEnvelope {
        CiphertextEnvelope::new(
            ENVELOPE_VERSION_AES256_GCM,
            [7u8; NONCE_LEN],
            vec![0xAB; TAG_LEN + 5],
        )
    }

    #[test]
    fn binary_round_trip() {
        let env = sample();
        let bytes = env.to_bytes();
        assert_eq!(bytes[0], ENVELOPE_VERSION_AES256_GCM);
        assert_eq!(CiphertextEnvelope::from_bytes(&bytes).unwrap(), env);
    }

    #[test]
    fn base64_round_trip() {
        let env = sample();
        assert_eq!(CiphertextEnvelope::from_base64(&env.to_base64()).unwrap(), env);
    }

    #[test]
    fn rejects_truncated() {
        let mut bytes = sample().to_bytes();
        bytes.truncate(1 + NONCE_LEN + TAG_LEN - 1);
        assert_eq!(
            CiphertextEnvelope::from_bytes(&bytes),
            Err(VaultError::InvalidCiphertext)
        );
        assert_eq!(
            CiphertextEnvelope::from_base64("@@not-base64@@"),
            Err(VaultError::InvalidCiphertext)
        );
    }

    #[test]
    fn transit_encode_parse() {
        let tc = TransitCiphertext::new(3, sample());
        let text = tc.encode();
        assert!(text.starts_with("vault:v3:"));
        assert_eq!(TransitCiphertext::parse(&text).unwrap(), tc);
    }

    #[test]
    fn transit_rejects_malformed() {
        assert!(TransitCiphertext::parse("vault:vX:abcd").is_err());
        assert!(TransitCiphertext::parse("vault:v0:abcd").is_err());
        assert!(TransitCiphertext::parse("v1:abcd").is_err());
        assert!(TransitCiphertext::parse("vault:v1").is_err());
    }
}
