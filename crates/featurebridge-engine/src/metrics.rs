// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-feature dispatch counters.
//
// Purely observational. Counters are lock-free atomics; the map that owns
// them is only write-locked when a feature is seen for the first time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use featurebridge_core::FeatureKey;

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Ran immediately against a live implementation.
    Dispatched,
    /// Stored because no implementation was live.
    Queued,
    /// Ran from the queue when an implementation registered.
    Replayed,
    /// Dropped unexecuted because it outlived the expiry.
    Expired,
    /// Dropped unexecuted to keep the queue within bounds.
    Evicted,
    /// Discarded by an explicit queue clear or reset.
    Cleared,
    /// Panicked while running.
    Failed,
}

#[derive(Debug, Default)]
pub struct FeatureCounters {
    dispatched: AtomicU64,
    queued: AtomicU64,
    replayed: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
    cleared: AtomicU64,
    failed: AtomicU64,
}

impl FeatureCounters {
    pub fn add(&self, counter: Counter, n: usize) {
        if n == 0 {
            return;
        }
        let slot = match counter {
            Counter::Dispatched => &self.dispatched,
            Counter::Queued => &self.queued,
            Counter::Replayed => &self.replayed,
            Counter::Expired => &self.expired,
            Counter::Evicted => &self.evicted,
            Counter::Cleared => &self.cleared,
            Counter::Failed => &self.failed,
        };
        slot.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeatureMetrics {
        FeatureMetrics {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of one feature's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMetrics {
    pub dispatched: u64,
    pub queued: u64,
    pub replayed: u64,
    pub expired: u64,
    pub evicted: u64,
    pub cleared: u64,
    pub failed: u64,
}

/// Counters for every feature an engine has seen.
#[derive(Debug, Default)]
pub struct Metrics {
    features: RwLock<HashMap<FeatureKey, Arc<FeatureCounters>>>,
}

impl Metrics {
    /// Counters for `key`, created on first use.
    pub fn counters(&self, key: FeatureKey) -> Arc<FeatureCounters> {
        if let Some(existing) = self.features.read().get(&key) {
            return Arc::clone(existing);
        }
        Arc::clone(self.features.write().entry(key).or_default())
    }

    pub fn snapshot_for(&self, key: &FeatureKey) -> FeatureMetrics {
        self.features
            .read()
            .get(key)
            .map(|counters| counters.snapshot())
            .unwrap_or_default()
    }

    /// Every feature's counters keyed by feature name.
    pub fn snapshot_all(&self) -> BTreeMap<String, FeatureMetrics> {
        self.features
            .read()
            .iter()
            .map(|(key, counters)| (key.name().to_string(), counters.snapshot()))
            .collect()
    }

    /// Forget all counters. Counters already handed out keep counting but
    /// are no longer reported.
    pub fn reset(&self) {
        self.features.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    trait Toast {}
    trait Dialog {}

    #[test]
    fn counters_accumulate_per_feature() {
        let metrics = Metrics::default();
        let toast = FeatureKey::of::<dyn Toast>();

        metrics.counters(toast).add(Counter::Queued, 3);
        metrics.counters(toast).add(Counter::Replayed, 2);
        metrics.counters(toast).add(Counter::Expired, 1);
        metrics.counters(toast).add(Counter::Failed, 0);

        let snap = metrics.snapshot_for(&toast);
        assert_eq!(snap.queued, 3);
        assert_eq!(snap.replayed, 2);
        assert_eq!(snap.expired, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(metrics.snapshot_for(&FeatureKey::of::<dyn Dialog>()), FeatureMetrics::default());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::default());
        let key = FeatureKey::of::<dyn Toast>();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.counters(key).add(Counter::Dispatched, 1);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }
        assert_eq!(metrics.snapshot_for(&key).dispatched, 1_000);
    }

    #[test]
    fn reset_forgets_everything() {
        let metrics = Metrics::default();
        let key = FeatureKey::of::<dyn Toast>();
        metrics.counters(key).add(Counter::Cleared, 4);
        metrics.reset();

        assert!(metrics.snapshot_all().is_empty());
        assert_eq!(metrics.snapshot_for(&key).cleared, 0);
    }
}
