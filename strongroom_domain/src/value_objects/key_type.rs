// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Transit key-type enumeration and its capability table.
//!
//! Symmetric types serve encrypt/decrypt/rewrap; asymmetric types serve
//! sign/verify. The engine consults [`TransitKeyType`] before dispatching an
//! operation and rejects mismatches with `InvalidArgument` rather than
//! letting a cipher construction fail deeper down.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::VaultError;

/// Named key types supported by the transit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitKeyType {
    #[serde(rename = "aes256-gcm96")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
    #[serde(rename = "rsa-2048")]
    Rsa2048,
    #[serde(rename = "rsa-3072")]
    Rsa3072,
    #[serde(rename = "rsa-4096")]
    Rsa4096,
    #[serde(rename = "ecdsa-p256")]
    EcdsaP256,
    #[serde(rename = "ecdsa-p384")]
    EcdsaP384,
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl TransitKeyType {
    /// Whether the type supports encrypt/decrypt/rewrap.
    pub fn supports_encryption(&self) -> bool {
        matches!(self, Self::Aes256Gcm | Self::ChaCha20Poly1305)
    }

    /// Whether the type supports sign/verify.
    pub fn supports_signing(&self) -> bool {
        !self.supports_encryption()
    }

    /// Raw key length for symmetric types; None for asymmetric types whose
    /// material is a serialized private key.
    pub fn symmetric_key_len(&self) -> Option<usize> {
        match self {
            Self::Aes256Gcm | Self::ChaCha20Poly1305 => Some(32),
            _ => None,
        }
    }

    /// RSA modulus bits, where applicable.
    pub fn rsa_bits(&self) -> Option<usize> {
        match self {
            Self::Rsa2048 => Some(2048),
            Self::Rsa3072 => Some(3072),
            Self::Rsa4096 => Some(4096),
            _ => None,
        }
    }

    pub const ALL: [TransitKeyType; 8] = [
        Self::Aes256Gcm,
        Self::ChaCha20Poly1305,
        Self::Rsa2048,
        Self::Rsa3072,
        Self::Rsa4096,
        Self::EcdsaP256,
        Self::EcdsaP384,
        Self::Ed25519,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes256-gcm96",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
            Self::Rsa2048 => "rsa-2048",
            Self::Rsa3072 => "rsa-3072",
            Self::Rsa4096 => "rsa-4096",
            Self::EcdsaP256 => "ecdsa-p256",
            Self::EcdsaP384 => "ecdsa-p384",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl Display for TransitKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransitKeyType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| VaultError::InvalidArgument(format!("unknown transit key type '{s}'")))
    }
}
