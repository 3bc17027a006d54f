// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Hash Chaining
//!
//! The integrity layer of the audit log. Each record's `current_hash` is the
//! base64-encoded SHA-256 of its canonical serialization (which ends with
//! the previous record's hash), so editing any persisted field — or
//! reordering records — breaks the chain at the first affected record.
//!
//! Retention cleanup deliberately breaks the chain at the oldest retained
//! record; [`verify_chain`] therefore takes the records in order and only
//! checks linkage *between* the records it is given.

use sha2::{Digest, Sha256};

use crate::entities::AuditRecord;
use crate::value_objects::AuditRecordId;

/// Computes the hash a record should carry, from its canonical form.
pub fn compute_hash(record: &AuditRecord) -> String {
    use base64::engine::general_purpose;
    use base64::Engine as _;

    let digest = Sha256::digest(record.canonical_string().as_bytes());
    general_purpose::STANDARD.encode(digest)
}

/// Why verification stopped at a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFault {
    /// The stored `current_hash` does not match the recomputed value — a
    /// field of this record was modified.
    HashMismatch,
    /// The stored `previous_hash` does not equal the predecessor's
    /// `current_hash` — a record was altered, inserted, or removed.
    BrokenLink,
}

/// Result of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub records_checked: u64,
    /// The first offending record, if any. Verification aborts there.
    pub failure: Option<(AuditRecordId, ChainFault)>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.failure.is_none()
    }
}

/// Walks records in creation order, recomputing every hash and checking
/// every link. The first record's `previous_hash` is taken as given (it is
/// the empty string for a virgin log, or whatever retention left behind).
pub fn verify_chain<'a>(records: impl IntoIterator<Item = &'a AuditRecord>) -> ChainReport {
    let mut checked = 0u64;
    let mut previous: Option<&AuditRecord> = None;

    for record in records {
        if let Some(prev) = previous {
            if record.previous_hash != prev.current_hash {
                return ChainReport {
                    records_checked: checked,
                    failure: Some((record.id, ChainFault::BrokenLink)),
                };
            }
        }
        if compute_hash(record) != record.current_hash {
            return ChainReport {
                records_checked: checked,
                failure: Some((record.id, ChainFault::HashMismatch)),
            };
        }
        checked += 1;
        previous = Some(record);
    }

    ChainReport {
        records_checked: checked,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::AuditStatus;
    use chrono::Utc;

    fn chained_records(n: usize) -> Vec<AuditRecord> {
        let mut records = Vec::with_capacity(n);
        let mut previous_hash = String::new();
        for i in 0..n {
            let mut record = AuditRecord {
                id: AuditRecordId::new(),
                actor_id: Some("alice".into()),
                action: format!("op-{i}"),
                resource_type: "secret".into(),
                resource_id: Some(format!("path/{i}")),
                old_value: None,
                new_value: Some(format!("{{\"version\":{i}}}")),
                source_addr: None,
                user_agent: None,
                status: AuditStatus::Success,
                error: None,
                correlation_id: format!("c-{i}"),
                created_at: Utc::now(),
                previous_hash: previous_hash.clone(),
                current_hash: String::new(),
            };
            record.current_hash = compute_hash(&record);
            previous_hash = record.current_hash.clone();
            records.push(record);
        }
        records
    }

    #[test]
    fn intact_chain_verifies() {
        let records = chained_records(5);
        let report = verify_chain(&records);
        assert!(report.is_intact());
        assert_eq!(report.records_checked, 5);
    }

    #[test]
    fn empty_chain_is_intact() {
        assert!(verify_chain([].iter()).is_intact());
    }

    #[test]
    fn tampered_field_is_detected_at_the_record() {
        let mut records = chained_records(3);
        records[1].action = "tampered".into();
        let report = verify_chain(&records);
        assert_eq!(
            report.failure,
            Some((records[1].id, ChainFault::HashMismatch))
        );
        assert_eq!(report.records_checked, 1);
    }

    #[test]
    fn relinked_record_is_detected() {
        let mut records = chained_records(3);
        // Recompute record 1's hash after tampering so the hash itself is
        // consistent, leaving only the link to record 2 broken.
        records[1].action = "tampered".into();
        records[1].current_hash = compute_hash(&records[1]);
        let report = verify_chain(&records);
        assert_eq!(report.failure, Some((records[2].id, ChainFault::BrokenLink)));
    }

    #[test]
    fn removal_breaks_the_link() {
        let mut records = chained_records(4);
        records.remove(1);
        let report = verify_chain(&records);
        assert_eq!(report.failure, Some((records[1].id, ChainFault::BrokenLink)));
    }

    #[test]
    fn chain_after_retention_cut_verifies_from_floor() {
        let records = chained_records(6);
        // Retention removed the first three; the suffix still verifies.
        let report = verify_chain(&records[3..]);
        assert!(report.is_intact());
        assert_eq!(report.records_checked, 3);
    }
}
