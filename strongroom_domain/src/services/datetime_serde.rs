// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DateTime Serde Module
//!
//! RFC3339 (de)serialization for `DateTime<Utc>` fields across the system.
//! All timestamps are UTC with millisecond precision and a `Z` suffix —
//! the same textual form the store persists and the audit canonicalization
//! hashes, so one formatting rule serves all three.
//!
//! Use with `#[serde(with = "datetime_serde")]`, or
//! `#[serde(with = "datetime_serde::option")]` for optional fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{self, Deserialize, Deserializer, Serializer};

/// Formats a timestamp in the canonical textual form:
/// `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_rfc3339_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses the canonical textual form back into a UTC timestamp.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_rfc3339_millis(dt))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_rfc3339(&s).map_err(serde::de::Error::custom)
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_some(&format_rfc3339_millis(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => parse_rfc3339(&s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
