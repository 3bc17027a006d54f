// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application layer - engine orchestration over the domain ports.

pub mod context;
pub mod services;
pub mod vault;

pub use context::Caller;
pub use vault::Vault;
