// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide default instance.
//
// A thin wrapper over one pre-built `FeatureBridge`, for callers that do not
// need isolation. Unlike named instances its configuration stays mutable.
// Lives for the whole process; `reset()` is there for test isolation.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use tracing::debug;

use featurebridge_core::error::{BridgeError, Result};
use featurebridge_core::{EngineConfig, Priority};
use featurebridge_platform::{MainThreadExecutor, main_thread_executor};

use crate::builder::claim_scope_name;
use crate::diagnostics::DebugInfo;
use crate::engine::FeatureBridge;
use crate::metrics::FeatureMetrics;

/// Scope name of the default instance.
pub const GLOBAL_SCOPE: &str = "global";

static GLOBAL: LazyLock<FeatureBridge> = LazyLock::new(|| {
    claim_scope_name(GLOBAL_SCOPE);
    FeatureBridge::from_parts(GLOBAL_SCOPE.to_string(), EngineConfig::default(), main_thread_executor())
});

/// The default instance.
pub fn global() -> &'static FeatureBridge {
    &GLOBAL
}

pub fn register<T: ?Sized + Send + Sync + 'static>(implementation: &Arc<T>) {
    global().register(implementation);
}

pub fn unregister<T: ?Sized + 'static>() {
    global().unregister::<T>();
}

pub fn is_registered<T: ?Sized + 'static>() -> bool {
    global().is_registered::<T>()
}

pub fn dispatch<T: ?Sized + Send + Sync + 'static>(action: impl FnOnce(&T) + Send + 'static) {
    global().dispatch::<T>(action);
}

pub fn dispatch_with_priority<T: ?Sized + Send + Sync + 'static>(
    priority: Priority,
    action: impl FnOnce(&T) + Send + 'static,
) {
    global().dispatch_with_priority::<T>(priority, action);
}

pub fn clear_queue<T: ?Sized + 'static>() -> usize {
    global().clear_queue::<T>()
}

pub fn pending_count<T: ?Sized + 'static>() -> usize {
    global().pending_count::<T>()
}

pub fn metrics_for<T: ?Sized + 'static>() -> FeatureMetrics {
    global().metrics_for::<T>()
}

pub fn debug_info() -> DebugInfo {
    global().debug_info()
}

pub fn dump() -> String {
    global().dump()
}

/// Clear registrations, queues and metrics, and restore the default
/// configuration and executor.
pub fn reset() {
    global().reset();
    global().update_config(|config| *config = EngineConfig::default());
    global().set_executor(main_thread_executor());
}

// -- Mutable defaults ---------------------------------------------------------

pub fn config() -> EngineConfig {
    global().config()
}

/// Change the queue bound. Queues already above it shrink on their next push.
pub fn set_max_queue_size(max_queue_size: usize) -> Result<()> {
    if max_queue_size == 0 {
        return Err(BridgeError::InvalidQueueSize(max_queue_size));
    }
    global().update_config(|config| config.max_queue_size = max_queue_size);
    log_config_change();
    Ok(())
}

/// Change the expiry. Zero is accepted here and expires every queued action
/// on its next sweep.
pub fn set_action_expiry(expiry: Duration) {
    global().update_config(|config| config.action_expiry = expiry);
    log_config_change();
}

pub fn set_debug_mode(enabled: bool) {
    global().update_config(|config| config.debug_mode = enabled);
    log_config_change();
}

/// Route the default instance's callbacks through `executor`.
///
/// Hosts with a real UI thread call this once at startup.
pub fn install_executor(executor: Arc<dyn MainThreadExecutor>) {
    global().set_executor(executor);
}

fn log_config_change() {
    let config = global().config();
    if config.debug_mode {
        debug!(
            scope = GLOBAL_SCOPE,
            max_queue_size = config.max_queue_size,
            action_expiry_ms = config.action_expiry_ms(),
            "global configuration changed"
        );
    }
}
