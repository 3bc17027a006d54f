// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Material and Provider Ports
//!
//! The two root keys of the system as zeroize-on-drop newtypes, and the
//! ports through which they reach consumers:
//!
//! - The **KEK** is a 32-byte secret sourced from the runtime environment at
//!   startup; it wraps the master key at rest. [`KekProvider`] is the
//!   substitution point for a future HSM.
//! - The **master key** exists in memory only while unsealed; the seal
//!   controller owns the single cell and hands out short-lived copies via
//!   [`MasterKeyProvider`]. Every copy wipes itself on drop.
//!
//! Neither type implements `Debug` output of its bytes, `Display`,
//! `Serialize`, or any other path that could move key bytes toward a log or
//! a disk.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::VaultError;

/// Length of both root keys.
pub const KEY_LEN: usize = 32;

macro_rules! opaque_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; KEY_LEN]);

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self(bytes)
            }

            /// Validates length and copies; the caller should zeroize its
            /// own buffer afterwards.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
                if bytes.len() != KEY_LEN {
                    return Err(VaultError::InvalidArgument(format!(
                        "{} must be {} bytes, got {}",
                        stringify!($name),
                        KEY_LEN,
                        bytes.len()
                    )));
                }
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(bytes);
                Ok(Self(key))
            }

            pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(..)"))
            }
        }
    };
}

opaque_key!(
    /// The 32-byte root for all data encryption. Present in memory only
    /// while unsealed.
    MasterKey
);

opaque_key!(
    /// The key-encryption-key wrapping the master key at rest.
    Kek
);

/// Supplies the master key to the encryption service.
///
/// Implemented by the seal controller; fails with [`VaultError::Sealed`]
/// while sealed. Callers fetch per operation and drop immediately — nothing
/// outside the controller retains a master key.
pub trait MasterKeyProvider: Send + Sync {
    fn master_key(&self) -> Result<MasterKey, VaultError>;

    fn is_sealed(&self) -> bool;
}

/// Supplies the process-wide KEK.
///
/// The shipped implementation reads the environment at startup; an HSM
/// integration is a later substitution behind this same port.
pub trait KekProvider: Send + Sync {
    fn kek(&self) -> Result<Kek, VaultError>;
}
