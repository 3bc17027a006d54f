// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Cancellation plumbing for the background sweepers. The lease-revocation
//! sweeper, audit-retention cleaner, and transit auto-rotation pass each
//! hold a [`CancellationToken`]; on SIGINT/SIGTERM the coordinator cancels
//! them and waits out a bounded grace period so an in-flight connector
//! revocation can finish rather than leaving a dynamic user half-removed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Default grace period granted to draining tasks.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Clone-able cancellation signal handed to background tasks.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves when the token is cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                break;
            }
            notified.await;
        }
    }
}

/// Owns the process shutdown sequence.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
        }
    }

    /// The token to hand to background tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels all holders of the token.
    pub fn initiate(&self) {
        info!("shutdown initiated");
        self.token.cancel();
    }

    /// Waits for SIGINT (and SIGTERM on unix), then cancels and sleeps out
    /// the grace period so draining tasks can finish.
    pub async fn run_until_signal(&self) {
        wait_for_signal().await;
        self.initiate();
        tokio::time::sleep(self.grace_period).await;
        info!("grace period elapsed, exiting");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}; falling back to ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_cancellation_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(10));
        let token = coordinator.token();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.initiate();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn cancel_before_wait_resolves_immediately() {
        let coordinator = ShutdownCoordinator::default();
        let token = coordinator.token();
        coordinator.initiate();
        // Must not hang.
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn tokens_share_state() {
        let coordinator = ShutdownCoordinator::default();
        let a = coordinator.token();
        let b = coordinator.token();
        assert!(!a.is_cancelled());
        b.cancel();
        assert!(a.is_cancelled());
    }
}
