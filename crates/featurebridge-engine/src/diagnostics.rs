// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only diagnostics snapshot of an engine instance.
//
// Taking a snapshot sweeps expired queue entries (and counts them) but never
// touches registrations. Dead weak handles are left in place and simply not
// reported. The sweep and the registry read share one lock acquisition, so
// a concurrent `register` cannot land between them.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use featurebridge_core::error::Result;
use featurebridge_core::{EngineConfig, InstanceId};

use crate::engine::{FeatureBridge, sweep_queues};

/// Point-in-time view of one engine instance.
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub scope: String,
    pub instance_id: InstanceId,
    pub captured_at: DateTime<Utc>,
    /// Features with a live implementation.
    pub registered_count: usize,
    pub registered_features: Vec<String>,
    /// Pending actions per feature, after the expiry sweep. Empty queues are
    /// omitted.
    pub pending: BTreeMap<String, usize>,
    pub total_pending: usize,
    /// Actions dropped as expired while taking this snapshot.
    pub expired_during_snapshot: usize,
    /// Age in milliseconds of the longest-waiting action per feature.
    pub oldest_pending_ms: BTreeMap<String, u64>,
    pub config: EngineConfig,
    pub executor: String,
}

impl DebugInfo {
    /// Pretty-printed JSON for log shipping or bug reports.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Feature bridge [{}] ===", self.scope)?;
        writeln!(f, "instance:   {}", self.instance_id)?;
        writeln!(f, "captured:   {}", self.captured_at.to_rfc3339())?;
        writeln!(f, "executor:   {}", self.executor)?;
        writeln!(
            f,
            "config:     max_queue_size={} action_expiry_ms={} debug_mode={}",
            self.config.max_queue_size,
            self.config.action_expiry_ms(),
            self.config.debug_mode
        )?;

        writeln!(f, "registered: {}", self.registered_count)?;
        for name in &self.registered_features {
            writeln!(f, "  - {name}")?;
        }

        writeln!(f, "pending:    {}", self.total_pending)?;
        for (name, count) in &self.pending {
            let mut line = format!("  - {name}: {count}");
            if let Some(age) = self.oldest_pending_ms.get(name) {
                let _ = write!(line, " (oldest {age} ms)");
            }
            writeln!(f, "{line}")?;
        }

        write!(f, "expired during snapshot: {}", self.expired_during_snapshot)
    }
}

impl FeatureBridge {
    /// Snapshot registrations, queues and configuration.
    pub fn debug_info(&self) -> DebugInfo {
        let (sweep, garbage, registered, config) = self.state.with_lock(|state| {
            let (sweep, garbage) = sweep_queues(state);
            let names: Vec<String> = state
                .registry
                .borrow()
                .live_features()
                .iter()
                .map(|key| key.name().to_string())
                .collect();
            (sweep, garbage, names, state.config.get())
        });
        drop(garbage);
        self.record_expired(&sweep);

        let mut pending = BTreeMap::new();
        let mut oldest_pending_ms = BTreeMap::new();
        for queue in &sweep.queues {
            pending.insert(queue.key.name().to_string(), queue.pending);
            if let Some(age) = queue.oldest {
                let ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX);
                oldest_pending_ms.insert(queue.key.name().to_string(), ms);
            }
        }

        DebugInfo {
            scope: self.scope.clone(),
            instance_id: self.id,
            captured_at: Utc::now(),
            registered_count: registered.len(),
            registered_features: registered,
            total_pending: pending.values().sum(),
            pending,
            expired_during_snapshot: sweep.expired.iter().map(|(_, count)| count).sum(),
            oldest_pending_ms,
            config,
            executor: self.executor_name(),
        }
    }

    /// Human-readable report of [`debug_info`](Self::debug_info).
    pub fn dump(&self) -> String {
        self.debug_info().to_string()
    }
}
