// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Weak reference to a platform feature implementation.
//
// The handle never extends the lifetime of the referent: once the owning
// screen/controller drops its last `Arc`, `get()` returns `None`.

use std::sync::{Arc, Weak};

/// Non-owning handle to a feature implementation.
pub struct WeakHandle<T: ?Sized> {
    inner: Option<Weak<T>>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// Downgrade `value` without taking ownership of it.
    pub fn new(value: &Arc<T>) -> Self {
        Self {
            inner: Some(Arc::downgrade(value)),
        }
    }

    /// Resolve the handle. Returns `None` once the referent has been dropped
    /// or the handle was cleared.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.as_ref().and_then(Weak::upgrade)
    }

    /// Whether `get()` would currently succeed.
    pub fn is_alive(&self) -> bool {
        self.inner.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Drop the reference. Every later `get()` returns `None`.
    pub fn clear(&mut self) {
        self.inner = None;
    }
}

impl<T: ?Sized> std::fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
