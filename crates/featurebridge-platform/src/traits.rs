// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for main-thread confinement.
//
// Feature callbacks touch UI objects, so every invocation is funnelled onto
// the single thread the host platform designates as "main".

/// A unit of work posted to the main thread.
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work on the host's designated main thread.
///
/// Implementations must run `task` inline when the caller already is the
/// main thread; tests and synchronous callers rely on that. Posting from any
/// other thread must not block the caller, and posted tasks run in the order
/// they were posted.
pub trait MainThreadExecutor: Send + Sync {
    /// Run `task` on the main thread.
    fn run_on_main(&self, task: MainTask);

    /// Whether the calling thread is the main thread.
    fn is_main_thread(&self) -> bool;

    /// Human-readable executor name (e.g. "headless", "main-loop").
    fn platform_name(&self) -> &str;
}
