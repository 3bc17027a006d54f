// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single, closed error taxonomy for the secrets-management domain. Every
//! public engine operation returns one of these kinds; the transport layer
//! (out of scope here) maps them to wire status codes.
//!
//! ## Design Principles
//!
//! - **Closed set**: collaborators match exhaustively; adding a variant is a
//!   breaking change and is treated as one.
//! - **Oracle safety**: cryptographic failures carry no detail. A wrong KEK,
//!   a truncated envelope, and a forged tag all surface as the same
//!   [`VaultError::InvalidCiphertext`] / [`VaultError::VerificationFailed`]
//!   so callers cannot probe key material.
//! - **Existence hiding**: read paths gated by policy fail with
//!   [`VaultError::Unauthorized`] rather than [`VaultError::NotFound`] when
//!   the caller would not have been allowed a successful read.
//! - **No panics**: the domain and infrastructure layers propagate with `?`;
//!   `unwrap`/`expect` are confined to tests.
//!
//! ## Recoverable vs. terminal
//!
//! `ConnectorError` is the one retry-able kind: background sweepers retry it
//! with exponential backoff. Everything else reflects either caller error
//! (`InvalidArgument`, `Conflict`, `InvalidShare`) or a state the caller
//! must change first (`Sealed`, `NotInitialized`).

use thiserror::Error;

/// Domain-specific errors for the secrets-management core.
///
/// The closed set of failure kinds defined by the system design. Variants
/// that carry a `String` include operator-facing context; variants that
/// carry nothing are deliberately opaque (see the module docs on oracle
/// safety).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// A cryptographic operation was attempted while the vault is sealed.
    #[error("vault is sealed")]
    Sealed,

    /// Initialize was called on an already-initialized store.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// An operation requiring initialization ran against a fresh store.
    #[error("vault is not initialized")]
    NotInitialized,

    /// Unseal share rejected: wrong length, zero x-coordinate, or duplicate.
    #[error("invalid unseal share: {0}")]
    InvalidShare(String),

    /// The unseal threshold was reached but the recovered master key did not
    /// match the stored verification token. Deliberately does not
    /// distinguish a wrong KEK from corrupted ciphertext.
    #[error("unseal verification failed")]
    VerificationFailed,

    /// Entity missing: secret path, transit key, lease, role, or policy.
    #[error("not found: {0}")]
    NotFound(String),

    /// State conflict, e.g. a check-and-set version mismatch or a duplicate
    /// unique name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The authorization decision was Deny or NotApplicable.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed input that failed validation before reaching storage.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Decryption authentication failure. Uniform for all causes.
    #[error("invalid ciphertext")]
    InvalidCiphertext,

    /// An external database operation failed; wraps the connector-specific
    /// cause as text.
    #[error("connector error: {0}")]
    ConnectorError(String),

    /// The operation is deliberately not supported by this design.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Truly unexpected failure. Logged with full context at the site,
    /// surfaced without details.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Stable kind name used by collaborators for status-code mapping and by
    /// telemetry for counters. One name per variant, never message text.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::Sealed => "sealed",
            VaultError::AlreadyInitialized => "already_initialized",
            VaultError::NotInitialized => "not_initialized",
            VaultError::InvalidShare(_) => "invalid_share",
            VaultError::VerificationFailed => "verification_failed",
            VaultError::NotFound(_) => "not_found",
            VaultError::Conflict(_) => "conflict",
            VaultError::Unauthorized => "unauthorized",
            VaultError::InvalidArgument(_) => "invalid_argument",
            VaultError::InvalidCiphertext => "invalid_ciphertext",
            VaultError::ConnectorError(_) => "connector_error",
            VaultError::Unsupported(_) => "unsupported",
            VaultError::Internal(_) => "internal",
        }
    }

    /// Whether background tasks may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::ConnectorError(_))
    }

    /// Shorthand for an [`VaultError::Internal`] wrapping a storage failure.
    pub fn storage(context: impl std::fmt::Display) -> Self {
        VaultError::Internal(format!("storage: {context}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(VaultError::Sealed.kind(), "sealed");
        assert_eq!(VaultError::Unauthorized.kind(), "unauthorized");
        assert_eq!(VaultError::InvalidCiphertext.kind(), "invalid_ciphertext");
        assert_eq!(
            VaultError::Conflict("cas mismatch".into()).kind(),
            "conflict"
        );
    }

    #[test]
    fn only_connector_errors_retry() {
        assert!(VaultError::ConnectorError("timeout".into()).is_retryable());
        assert!(!VaultError::Sealed.is_retryable());
        assert!(!VaultError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn opaque_variants_have_fixed_messages() {
        assert_eq!(VaultError::InvalidCiphertext.to_string(), "invalid ciphertext");
        assert_eq!(
            VaultError::VerificationFailed.to_string(),
            "unseal verification failed"
        );
    }
}
