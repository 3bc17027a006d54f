// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tracing Initialization
//!
//! One-call setup of the tracing subscriber for services embedding the
//! engines. Filtering follows the conventional `RUST_LOG` environment
//! variable, defaulting to `info` for this workspace's crates and `warn`
//! for everything else.
//!
//! Engine code logs operation outcomes and ids only; secret material never
//! appears in log fields by construction (key types do not implement
//! `Display`, and payloads are encrypted before they reach any logged
//! struct).

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn,strongroom=info,strongroom_domain=info,strongroom_bootstrap=info";

/// Initializes the global tracing subscriber. Returns an error string if a
/// subscriber is already installed (embedding applications may own it).
pub fn init_tracing() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| format!("tracing subscriber already set: {e}"))
}
