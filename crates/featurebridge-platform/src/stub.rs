// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless executor for desktop/CI builds with no main-thread concept.
//
// Every thread counts as main, so every task runs synchronously on the
// caller's thread.

use crate::traits::{MainTask, MainThreadExecutor};

/// Synchronous executor used when no platform main thread exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessExecutor;

impl MainThreadExecutor for HeadlessExecutor {
    fn run_on_main(&self, task: MainTask) {
        task();
    }

    fn is_main_thread(&self) -> bool {
        true
    }

    fn platform_name(&self) -> &str {
        "headless"
    }
}
