// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature bridge — platform shims.
//
// Weak handles, the reentrant engine lock and main-thread executors. Hosts
// embedding the engine in a native UI (UIKit, Android Looper, a winit event
// loop) wrap their own dispatch primitive in a `MainThreadExecutor` and hand
// it to the engine builder; everything else falls back to the headless
// executor.

pub mod lock;
pub mod main_loop;
pub mod stub;
pub mod traits;
pub mod weak;

use std::sync::Arc;

pub use lock::FeatureLock;
pub use main_loop::{MainLoop, MainLoopHandle};
pub use stub::HeadlessExecutor;
pub use traits::{MainTask, MainThreadExecutor};
pub use weak::WeakHandle;

/// Default executor for engines that were not given one explicitly.
///
/// RETURNS: the headless executor, which runs every task synchronously on
/// the calling thread.
pub fn main_thread_executor() -> Arc<dyn MainThreadExecutor> {
    Arc::new(HeadlessExecutor)
}
