// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap crate sits **outside** the layered architecture (domain,
//! application, infrastructure) and provides the composition-root utilities
//! a deployment wires together before any engine runs:
//!
//! - **KEK acquisition** — reads the key-encryption-key from the process
//!   environment exactly once at startup. Absence or wrong length is a
//!   fatal error; nothing else in the tree knows where the KEK came from.
//! - **Logging** — tracing-subscriber initialization with `RUST_LOG`-style
//!   filtering.
//! - **Shutdown coordination** — a cancellation token shared with the
//!   background sweepers (lease revocation, audit retention, transit
//!   auto-rotation) so they drain cleanly on SIGINT/SIGTERM.
//!
//! The transport layer (out of scope for this repository) is expected to
//! call [`kek::EnvKekProvider::from_env`], [`logger::init_tracing`], and
//! construct a [`shutdown::ShutdownCoordinator`] in its `main`, then hand
//! the pieces to the engine constructors in the `strongroom` crate.

pub mod kek;
pub mod logger;
pub mod shutdown;

pub use kek::{EnvKekProvider, KEK_ENV_VAR};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
