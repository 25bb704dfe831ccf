// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-instance engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Default upper bound on pending actions per feature.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default maximum age of a pending action (5 minutes).
pub const DEFAULT_ACTION_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Queue bounds and logging switch for one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of pending actions kept per feature.
    pub max_queue_size: usize,
    /// Pending actions older than this are dropped unexecuted.
    #[serde(rename = "action_expiry_ms", with = "duration_ms")]
    pub action_expiry: Duration,
    /// Emit debug-level lifecycle logs for this instance.
    pub debug_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            action_expiry: DEFAULT_ACTION_EXPIRY,
            debug_mode: false,
        }
    }
}

impl EngineConfig {
    /// Reject values that would make the queue unusable.
    ///
    /// Invalid values are never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(BridgeError::InvalidQueueSize(self.max_queue_size));
        }
        if self.action_expiry.is_zero() {
            return Err(BridgeError::InvalidExpiry);
        }
        Ok(())
    }

    /// Expiry in whole milliseconds, as shown in diagnostics.
    pub fn action_expiry_ms(&self) -> u64 {
        u64::try_from(self.action_expiry.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Serialize a `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_queue_size, 100);
        assert_eq!(config.action_expiry, Duration::from_secs(300));
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let config = EngineConfig {
            max_queue_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::InvalidQueueSize(0))));
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let config = EngineConfig {
            action_expiry: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::InvalidExpiry)));
    }

    #[test]
    fn expiry_serializes_as_milliseconds() {
        let config = EngineConfig {
            max_queue_size: 5,
            action_expiry: Duration::from_millis(1500),
            debug_mode: true,
        };
        let json = serde_json::to_value(config).expect("serialize");
        assert_eq!(json["action_expiry_ms"], 1500);
        assert_eq!(json["max_queue_size"], 5);

        let back: EngineConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, config);
    }
}
