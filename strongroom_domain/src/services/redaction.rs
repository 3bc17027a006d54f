// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sensitive-Field Redaction
//!
//! Scrubs value snapshots before they enter the audit log. Any JSON object
//! property whose key matches the sensitive set (case-insensitive exact
//! match) has its value replaced with `[REDACTED]`; arrays and nested
//! objects are walked recursively. Redaction happens exactly once, at audit
//! append — export paths read back already-redacted records.

use serde_json::Value;

/// Replacement literal for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are always redacted, compared case-insensitively.
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "access_key",
    "secret_key",
    "private_key",
    "encryption_key",
    "master_key",
    "credential",
    "credentials",
    "authorization",
    "client_secret",
    "cvv",
    "pin",
    "ssn",
    "credit_card",
    "card_number",
    "social_security",
];

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

/// Returns a copy of `value` with every sensitive property replaced.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    if is_sensitive(key) {
                        (key.clone(), Value::String(REDACTED.into()))
                    } else {
                        (key.clone(), redact(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        scalar => scalar.clone(),
    }
}

/// Redacts and serializes compactly for TEXT storage.
pub fn redact_to_string(value: &Value) -> String {
    redact(value).to_string()
}
