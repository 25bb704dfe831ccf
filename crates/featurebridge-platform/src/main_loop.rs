// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Channel-backed main loop for hosts that own their UI thread.
//
// The thread that creates the `MainLoop` becomes main. Other threads post
// tasks through a `MainLoopHandle`; the host drains them from its event loop
// with `run_pending` or `run_until`. Tasks posted from the main thread itself
// run inline.

use std::sync::mpsc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::traits::{MainTask, MainThreadExecutor};

/// Receiving end of the main-thread task queue. Lives on the main thread.
pub struct MainLoop {
    rx: mpsc::Receiver<MainTask>,
    handle: MainLoopHandle,
}

/// Cloneable posting side of a [`MainLoop`].
#[derive(Clone)]
pub struct MainLoopHandle {
    tx: mpsc::Sender<MainTask>,
    main: ThreadId,
}

impl MainLoop {
    /// Designate the calling thread as main.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let main = thread::current().id();
        debug!(?main, "main loop created");
        Self {
            rx,
            handle: MainLoopHandle { tx, main },
        }
    }

    pub fn handle(&self) -> MainLoopHandle {
        self.handle.clone()
    }

    /// Run every task posted so far, in posting order. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Keep draining until `done` holds or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining.min(Duration::from_millis(10))) {
                Ok(task) => task(),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                // Unreachable while `self.handle` holds a sender.
                Err(mpsc::RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadExecutor for MainLoopHandle {
    fn run_on_main(&self, task: MainTask) {
        if self.is_main_thread() {
            task();
            return;
        }
        if self.tx.send(task).is_err() {
            warn!("main loop is gone; dropping posted task");
        }
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main
    }

    fn platform_name(&self) -> &str {
        "main-loop"
    }
}
