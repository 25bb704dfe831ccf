// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature bridge engine — weak-reference feature registry with sticky,
// bounded, expiring replay queues.
//
// Shared application logic dispatches to a feature interface
// (`dyn ToastFeature`, `dyn Navigator`, ...) without holding the platform
// object that implements it. Platform code registers implementations as they
// appear; actions dispatched before that are queued and replayed on the main
// thread. Named instances keep unrelated modules apart; `global` offers one
// shared default instance.

pub mod builder;
pub mod diagnostics;
pub mod engine;
pub mod global;
pub mod metrics;
pub mod queue;
pub mod registry;

pub use builder::FeatureBridgeBuilder;
pub use diagnostics::DebugInfo;
pub use engine::FeatureBridge;
pub use metrics::FeatureMetrics;
pub use queue::{FeatureAction, QueuedAction};

pub use featurebridge_core::{BridgeError, EngineConfig, FeatureKey, InstanceId, Priority};
pub use featurebridge_platform::{HeadlessExecutor, MainLoop, MainLoopHandle, MainThreadExecutor};
