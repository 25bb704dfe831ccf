// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reentrant lock guarding engine state.
//
// A replayed callback may dispatch again from the thread that is already
// inside the engine, so the mutex must allow same-thread re-acquisition.
// `parking_lot::ReentrantMutex` only hands out shared access, so guarded
// state keeps its mutable parts in `Cell`/`RefCell` and borrows them briefly.
// A `RefCell` borrow must end before the body re-enters the lock.

use parking_lot::ReentrantMutex;

/// Reentrant mutex with closure-scoped access.
pub struct FeatureLock<T> {
    inner: ReentrantMutex<T>,
}

impl<T> FeatureLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ReentrantMutex::new(value),
        }
    }

    /// Run `body` with exclusive access against other threads.
    ///
    /// Blocks until no other thread holds the lock. The calling thread may
    /// already hold it; nested `with_lock` calls on the same thread enter
    /// immediately.
    pub fn with_lock<R>(&self, body: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock();
        body(&guard)
    }

    /// Whether the calling thread currently holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.inner.is_owned_by_current_thread()
    }
}

impl<T: Default> Default for FeatureLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
