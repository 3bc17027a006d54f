// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Log Service
//!
//! Readout, integrity verification, and retention over the hash-chained
//! audit log. Appends happen inside the repositories (coupled to mutations)
//! or via the engines' standalone events — this service is the operator
//! surface.
//!
//! Verification recomputes every hash in a window and checks the linkage;
//! the first mismatch aborts the walk and reports the offending record id.
//! Retention cleanup deliberately breaks the chain at the oldest retained
//! record, so verification is parameterized by the window it is given.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use strongroom_bootstrap::CancellationToken;
use strongroom_domain::entities::{AuditRecord, AuditStatus};
use strongroom_domain::repositories::AuditRepository;
use strongroom_domain::services::audit_hash::{self, ChainFault};
use strongroom_domain::value_objects::AuditRecordId;
use strongroom_domain::VaultError;

use crate::application::context::Caller;
use crate::application::services::authz_service::AuthorizationService;

/// Default retention: 2555 days (≈ 7 years).
pub const DEFAULT_RETENTION_DAYS: i64 = 2555;

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub records_checked: u64,
    /// First offending record, if the chain is broken.
    pub failure: Option<(AuditRecordId, ChainFault)>,
}

impl VerificationReport {
    pub fn is_intact(&self) -> bool {
        self.failure.is_none()
    }
}

/// The audit-log service.
pub struct AuditService {
    audit: Arc<dyn AuditRepository>,
    authz: Arc<AuthorizationService>,
}

impl AuditService {
    pub fn new(audit: Arc<dyn AuditRepository>, authz: Arc<AuthorizationService>) -> Self {
        Self { audit, authz }
    }

    /// Reads back records in a window. Values are already redacted; this is
    /// a plain readout.
    pub async fn list(
        &self,
        caller: &Caller,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, VaultError> {
        let ctx = caller.request("read", "audit", None);
        self.authz.enforce(caller, &ctx).await?;
        self.audit.list_range(from, to).await
    }

    /// Verifies hash and linkage for every record in the window.
    pub async fn verify(
        &self,
        caller: &Caller,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<VerificationReport, VaultError> {
        let ctx = caller.request("verify", "audit", None);
        self.authz.enforce(caller, &ctx).await?;

        let records = self.audit.list_range(from, to).await?;
        let report = audit_hash::verify_chain(&records);
        let result = VerificationReport {
            records_checked: report.records_checked,
            failure: report.failure,
        };

        let event = caller
            .audit("verify", "audit", None, AuditStatus::Success)
            .with_new_value(serde_json::json!({
                "records_checked": result.records_checked,
                "intact": result.is_intact(),
            }));
        self.audit.append(event).await?;

        if let Some((id, fault)) = &result.failure {
            warn!(record = %id, ?fault, "audit chain verification failed");
        }
        Ok(result)
    }

    /// One retention pass: removes records older than the retention window.
    pub async fn cleanup(&self, retention_days: i64) -> Result<u64, VaultError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let removed = self.audit.delete_older_than(cutoff).await?;
        if removed > 0 {
            info!(removed, retention_days, "audit retention cleanup");
        }
        Ok(removed)
    }

    /// Spawns the background retention sweeper.
    pub fn spawn_retention_sweeper(
        self: &Arc<Self>,
        token: CancellationToken,
        retention_days: i64,
        interval: StdDuration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("audit retention sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = service.cleanup(retention_days).await {
                            warn!(error = %e, "audit retention pass failed");
                        }
                    }
                }
            }
        })
    }
}
