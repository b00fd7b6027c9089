// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters updated by the bridge tasks.
#[derive(Debug, Default)]
pub struct BridgeStats {
    connect_attempts: AtomicU64,
    connects: AtomicU64,
    wirings: AtomicU64,
    notifications: AtomicU64,
    notifications_dropped: AtomicU64,
    echoes_suppressed: AtomicU64,
    coercion_errors: AtomicU64,
    writes: AtomicU64,
    writes_failed: AtomicU64,
    bulk_bad: AtomicU64,
    rescan_requests: AtomicU64,
    reprocess_requests: AtomicU64,
    resolution_failures: AtomicU64,
}

impl BridgeStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful connection.
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed subscription wiring.
    pub fn record_wiring(&self) {
        self.wirings.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dispatched notification.
    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a notification dropped as stale or unknown.
    pub fn record_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a suppressed echo.
    pub fn record_echo_suppressed(&self) {
        self.echoes_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a conversion failure.
    pub fn record_coercion_error(&self) {
        self.coercion_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a write and its outcome.
    pub fn record_write(&self, success: bool) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.writes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a bulk bad propagation.
    pub fn record_bulk_bad(&self) {
        self.bulk_bad.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rescan request sent to the host.
    pub fn record_rescan(&self) {
        self.rescan_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a reprocess request sent to the host.
    pub fn record_reprocess(&self) {
        self.reprocess_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records items that failed to resolve.
    pub fn record_resolution_failures(&self, count: u64) {
        self.resolution_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            wirings: self.wirings.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            echoes_suppressed: self.echoes_suppressed.load(Ordering::Relaxed),
            coercion_errors: self.coercion_errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            bulk_bad: self.bulk_bad.load(Ordering::Relaxed),
            rescan_requests: self.rescan_requests.load(Ordering::Relaxed),
            reprocess_requests: self.reprocess_requests.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Connection attempts.
    pub connect_attempts: u64,
    /// Successful connections.
    pub connects: u64,
    /// Subscription wirings completed.
    pub wirings: u64,
    /// Notifications dispatched.
    pub notifications: u64,
    /// Notifications dropped.
    pub notifications_dropped: u64,
    /// Echoes suppressed.
    pub echoes_suppressed: u64,
    /// Conversion failures.
    pub coercion_errors: u64,
    /// Writes attempted.
    pub writes: u64,
    /// Writes failed.
    pub writes_failed: u64,
    /// Bulk bad propagations.
    pub bulk_bad: u64,
    /// Rescan requests sent.
    pub rescan_requests: u64,
    /// Reprocess requests sent.
    pub reprocess_requests: u64,
    /// Items that failed to resolve.
    pub resolution_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = BridgeStats::new();
        stats.record_write(true);
        stats.record_write(false);
        stats.record_notification();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.writes, 2);
        assert_eq!(snapshot.writes_failed, 1);
        assert_eq!(snapshot.notifications, 1);
        assert_eq!(snapshot.connects, 0);
    }
}
