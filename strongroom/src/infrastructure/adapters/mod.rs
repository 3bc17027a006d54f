// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure adapters - concrete implementations of domain ports.

pub mod encryption;
pub mod transit_crypto;

pub use encryption::AesGcmEncryption;
