// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Instance isolation: factory and builder for independent engines.
//
// Every built engine owns its own registry, queues, lock and configuration.
// Scope names label instances in logs; a repeated name is allowed and only
// warned about when the builder has debug mode on.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use featurebridge_core::error::{BridgeError, Result};
use featurebridge_core::EngineConfig;
use featurebridge_platform::{MainThreadExecutor, main_thread_executor};

use crate::engine::FeatureBridge;

/// Scope names handed out so far in this process.
static SCOPE_NAMES: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Record `scope` as used. Returns `false` if it was already taken.
pub(crate) fn claim_scope_name(scope: &str) -> bool {
    SCOPE_NAMES.lock().insert(scope.to_string())
}

/// Fluent configuration for a named [`FeatureBridge`].
#[must_use]
pub struct FeatureBridgeBuilder {
    scope: String,
    config: EngineConfig,
    executor: Option<Arc<dyn MainThreadExecutor>>,
}

impl FeatureBridgeBuilder {
    fn new(scope: String) -> Self {
        Self {
            scope,
            config: EngineConfig::default(),
            executor: None,
        }
    }

    pub fn max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.config.max_queue_size = max_queue_size;
        self
    }

    pub fn action_expiry(mut self, expiry: Duration) -> Self {
        self.config.action_expiry = expiry;
        self
    }

    pub fn action_expiry_ms(self, expiry_ms: u64) -> Self {
        self.action_expiry(Duration::from_millis(expiry_ms))
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    /// Run callbacks through `executor` instead of the platform default.
    pub fn executor(mut self, executor: Arc<dyn MainThreadExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Validate and build.
    ///
    /// Fails on a blank scope name, a zero queue size or a zero expiry.
    pub fn build(self) -> Result<FeatureBridge> {
        if self.scope.trim().is_empty() {
            return Err(BridgeError::BlankScopeName);
        }
        self.config.validate()?;

        let fresh = claim_scope_name(&self.scope);
        if !fresh && self.config.debug_mode {
            warn!(scope = %self.scope, "scope name already in use; instances stay independent");
        }

        let executor = self.executor.unwrap_or_else(main_thread_executor);
        let bridge = FeatureBridge::from_parts(self.scope, self.config, executor);
        if self.config.debug_mode {
            debug!(
                scope = %bridge.scope(),
                instance = %bridge.instance_id(),
                max_queue_size = self.config.max_queue_size,
                action_expiry_ms = self.config.action_expiry_ms(),
                "feature bridge instance created"
            );
        }
        Ok(bridge)
    }
}

impl FeatureBridge {
    /// New independent instance with default configuration.
    pub fn create(scope: impl Into<String>) -> Result<Self> {
        Self::builder(scope).build()
    }

    pub fn builder(scope: impl Into<String>) -> FeatureBridgeBuilder {
        FeatureBridgeBuilder::new(scope.into())
    }
}
