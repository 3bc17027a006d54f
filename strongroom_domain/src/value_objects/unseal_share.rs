// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unseal Share Value Object
//!
//! A single Shamir share in the bit-exact wire format: 33 bytes, where byte
//! 0 is the x-coordinate (1–255, never 0) and bytes 1..=32 are the y-values
//! for the 32 master-key byte positions. Shares travel base64-encoded and
//! are zeroized on drop — a share is key material.

use base64::engine::general_purpose;
use base64::Engine as _;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::VaultError;

/// Wire length of one share: 1 header byte + 32 payload bytes.
pub const SHARE_LEN: usize = 33;

/// A validated 33-byte Shamir share. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UnsealShare {
    bytes: [u8; SHARE_LEN],
}

impl UnsealShare {
    /// Validates raw share bytes: exact length and non-zero x-coordinate.
    pub fn from_bytes(data: &[u8]) -> Result<Self, VaultError> {
        if data.len() != SHARE_LEN {
            return Err(VaultError::InvalidShare(format!(
                "share must be {} bytes, got {}",
                SHARE_LEN,
                data.len()
            )));
        }
        if data[0] == 0 {
            return Err(VaultError::InvalidShare(
                "share x-coordinate cannot be zero".into(),
            ));
        }
        let mut bytes = [0u8; SHARE_LEN];
        bytes.copy_from_slice(data);
        Ok(Self { bytes })
    }

    /// Decodes the base64 exchange form.
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let mut decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::InvalidShare(format!("share is not valid base64: {e}")))?;
        let share = Self::from_bytes(&decoded);
        decoded.zeroize();
        share
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.bytes)
    }

    /// The x-coordinate header byte (1–255).
    pub fn x(&self) -> u8 {
        self.bytes[0]
    }

    /// The 32 y-value payload bytes.
    pub fn y(&self) -> &[u8] {
        &self.bytes[1..]
    }

    pub fn as_bytes(&self) -> &[u8; SHARE_LEN] {
        &self.bytes
    }
}

// Debug must never print share bytes.
impl std::fmt::Debug for UnsealShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsealShare").field("x", &self.x()).finish_non_exhaustive()
    }
}
