// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Environment KEK Provider
//!
//! Sources the key-encryption-key from the runtime environment at startup:
//! `STRONGROOM_KEK` must hold a base64 string decoding to exactly 32 bytes.
//! Anything else — unset, undecodable, wrong length — is a fatal startup
//! error, not a recoverable condition: the process must not come up able to
//! initialize but unable to unseal.
//!
//! The variable is read once; the decoded bytes live in a zeroize-on-drop
//! cell and are handed out as fresh [`Kek`] copies through the
//! [`KekProvider`] port. An HSM integration is a later implementation of
//! the same port.

use base64::engine::general_purpose;
use base64::Engine as _;
use zeroize::Zeroize;

use strongroom_domain::services::{Kek, KekProvider, KEY_LEN};
use strongroom_domain::VaultError;

/// Environment variable holding the base64 KEK.
pub const KEK_ENV_VAR: &str = "STRONGROOM_KEK";

/// KEK provider backed by a one-time environment read.
pub struct EnvKekProvider {
    kek: Kek,
}

impl EnvKekProvider {
    /// Reads and validates `STRONGROOM_KEK`. Call once at startup; a `Err`
    /// here must abort the process.
    pub fn from_env() -> Result<Self, VaultError> {
        let encoded = std::env::var(KEK_ENV_VAR).map_err(|_| {
            VaultError::InvalidArgument(format!("{KEK_ENV_VAR} is not set"))
        })?;
        Self::from_base64(&encoded)
    }

    /// Validates a base64-encoded KEK (separated from the env read for
    /// tests and for deployments that inject the value differently).
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let mut decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| {
                VaultError::InvalidArgument(format!("{KEK_ENV_VAR} is not valid base64"))
            })?;
        if decoded.len() != KEY_LEN {
            decoded.zeroize();
            return Err(VaultError::InvalidArgument(format!(
                "{KEK_ENV_VAR} must decode to {KEY_LEN} bytes"
            )));
        }
        let kek = Kek::from_slice(&decoded)?;
        decoded.zeroize();
        Ok(Self { kek })
    }
}

impl KekProvider for EnvKekProvider {
    fn kek(&self) -> Result<Kek, VaultError> {
        Ok(self.kek.clone())
    }
}
