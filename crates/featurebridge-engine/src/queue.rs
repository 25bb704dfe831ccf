// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded, time-expiring queue of actions waiting for a feature
// implementation.
//
// Ordering rules:
//   - plain dispatch appends (FIFO) and evicts the front on overflow;
//   - priority dispatch evicts the lowest priority on overflow (earliest
//     inserted among equals), appends, then stable-sorts descending.
//
// Removed actions are handed back to the caller instead of being dropped in
// place, so captured state is released after the engine lock is gone.

use std::any::Any;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use featurebridge_core::Priority;

/// Callback run against a feature implementation.
pub type FeatureAction<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// A deferred invocation waiting for its feature to be registered.
pub struct QueuedAction {
    /// A boxed `FeatureAction<T>` for the queue's feature type.
    payload: Box<dyn Any + Send>,
    created: Instant,
    enqueued_at: DateTime<Utc>,
    priority: Priority,
    /// Insertion order within the owning engine.
    seq: u64,
}

impl QueuedAction {
    pub fn new<T: ?Sized + 'static>(action: FeatureAction<T>, priority: Priority, seq: u64) -> Self {
        Self {
            payload: Box::new(action),
            created: Instant::now(),
            enqueued_at: Utc::now(),
            priority,
            seq,
        }
    }

    /// An action is expired once its age reaches `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }

    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Recover the typed callback. `None` if `T` is not the type it was
    /// queued for.
    pub fn into_action<T: ?Sized + 'static>(self) -> Option<FeatureAction<T>> {
        self.payload.downcast::<FeatureAction<T>>().ok().map(|boxed| *boxed)
    }
}

impl std::fmt::Debug for QueuedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedAction")
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("age", &self.age())
            .finish()
    }
}

/// Pending actions for a single feature.
#[derive(Debug, Default)]
pub struct PendingQueue {
    actions: Vec<QueuedAction>,
}

impl PendingQueue {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remove every action whose age has reached `ttl`.
    pub fn sweep_expired(&mut self, ttl: Duration) -> Vec<QueuedAction> {
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.actions)
            .into_iter()
            .partition(|action| action.is_expired(ttl));
        self.actions = live;
        expired
    }

    /// Append in FIFO order, evicting from the front while full.
    pub fn push_back(&mut self, action: QueuedAction, max_len: usize) -> Vec<QueuedAction> {
        let mut evicted = Vec::new();
        while !self.actions.is_empty() && self.actions.len() >= max_len {
            evicted.push(self.actions.remove(0));
        }
        self.actions.push(action);
        evicted
    }

    /// Insert by priority, evicting the lowest-priority action while full.
    pub fn push_prioritized(&mut self, action: QueuedAction, max_len: usize) -> Vec<QueuedAction> {
        let mut evicted = Vec::new();
        while self.actions.len() >= max_len {
            let Some(lowest) = self.lowest_priority_index() else {
                break;
            };
            evicted.push(self.actions.remove(lowest));
        }
        self.actions.push(action);
        self.actions.sort_by(|a, b| b.priority.cmp(&a.priority));
        evicted
    }

    /// Take every pending action, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<QueuedAction> {
        std::mem::take(&mut self.actions)
    }

    /// Age of the longest-waiting action.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.actions.iter().map(QueuedAction::age).max()
    }

    pub fn priorities(&self) -> Vec<Priority> {
        self.actions.iter().map(QueuedAction::priority).collect()
    }

    fn lowest_priority_index(&self) -> Option<usize> {
        self.actions
            .iter()
            .enumerate()
            .min_by_key(|(_, action)| (action.priority, action.seq))
            .map(|(index, _)| index)
    }
}
