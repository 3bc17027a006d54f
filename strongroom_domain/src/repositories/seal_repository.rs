// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the singleton seal configuration.

use async_trait::async_trait;

use crate::entities::SealConfiguration;
use crate::VaultError;

/// Stores the single seal-configuration row.
#[async_trait]
pub trait SealRepository: Send + Sync {
    /// Loads the configuration, or None when the store is uninitialized.
    async fn load(&self) -> Result<Option<SealConfiguration>, VaultError>;

    /// Persists the initial configuration exactly once. A second call fails
    /// with [`VaultError::AlreadyInitialized`].
    async fn initialize(&self, config: &SealConfiguration) -> Result<(), VaultError>;
}
