// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secret Path Value Object
//!
//! Case-sensitive, slash-delimited addressing for the KV engine. Paths are
//! normalized once at the boundary: leading and trailing slashes are
//! stripped, and the normalized form is what gets persisted, audited, and
//! matched against policy resource patterns.
//!
//! ## Validation Rules
//!
//! - Non-empty after normalization.
//! - No empty interior segments (`a//b` is rejected rather than collapsed,
//!   so two spellings can never address the same secret).
//! - No ASCII control characters.
//! - At most 512 bytes, matching the TEXT index width in storage.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::VaultError;

const MAX_PATH_BYTES: usize = 512;

/// A normalized, validated KV path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretPath(String);

impl SecretPath {
    /// Normalizes and validates a raw path string.
    pub fn new(raw: &str) -> Result<Self, VaultError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(VaultError::InvalidArgument(
                "secret path cannot be empty".into(),
            ));
        }
        if trimmed.len() > MAX_PATH_BYTES {
            return Err(VaultError::InvalidArgument(format!(
                "secret path exceeds {} bytes",
                MAX_PATH_BYTES
            )));
        }
        if trimmed.split('/').any(str::is_empty) {
            return Err(VaultError::InvalidArgument(format!(
                "secret path '{}' contains an empty segment",
                trimmed
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(VaultError::InvalidArgument(
                "secret path contains control characters".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path's slash-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Whether `self` sits directly under `prefix` (used by List).
    ///
    /// `a/b/c` is under `a/b`; `a/b/c/d` is not an *immediate* child but
    /// contributes the directory entry `c/`.
    pub fn child_entry_under(&self, prefix: &str) -> Option<String> {
        let prefix = prefix.trim_matches('/');
        let rest = if prefix.is_empty() {
            self.0.as_str()
        } else {
            self.0.strip_prefix(prefix)?.strip_prefix('/')?
        };
        match rest.split_once('/') {
            Some((head, _)) => Some(format!("{head}/")),
            None => Some(rest.to_string()),
        }
    }
}

impl Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecretPath {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for SecretPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_surrounding_slashes() {
        assert_eq!(SecretPath::new("/a/b/").unwrap().as_str(), "a/b");
        assert_eq!(SecretPath::new("a").unwrap().as_str(), "a");
    }

    #[test]
    fn rejects_empty_and_degenerate() {
        assert!(SecretPath::new("").is_err());
        assert!(SecretPath::new("///").is_err());
        assert!(SecretPath::new("a//b").is_err());
        assert!(SecretPath::new("a/\x07/b").is_err());
    }

    #[test]
    fn paths_are_case_sensitive() {
        assert_ne!(
            SecretPath::new("App/Db").unwrap(),
            SecretPath::new("app/db").unwrap()
        );
    }

    #[test]
    fn list_entries() {
        let leaf = SecretPath::new("app/db/password").unwrap();
        assert_eq!(leaf.child_entry_under("app"), Some("db/".into()));
        assert_eq!(leaf.child_entry_under("app/db"), Some("password".into()));
        assert_eq!(leaf.child_entry_under("other"), None);
        assert_eq!(leaf.child_entry_under(""), Some("app/".into()));
    }
}
