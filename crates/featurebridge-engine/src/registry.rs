// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature registry: at most one weak handle per feature type.
//
// Entries whose implementation has been dropped stay in the map until they
// are unregistered, overwritten or reset. Every read discounts them.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use featurebridge_core::FeatureKey;
use featurebridge_platform::WeakHandle;

/// Type-erased view over a `WeakHandle<T>`.
trait ErasedHandle: Send {
    fn is_alive(&self) -> bool;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
}

impl<T: ?Sized + Send + Sync + 'static> ErasedHandle for WeakHandle<T> {
    fn is_alive(&self) -> bool {
        WeakHandle::is_alive(self)
    }

    fn clear(&mut self) {
        WeakHandle::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct Registry {
    handles: HashMap<FeatureKey, Box<dyn ErasedHandle>>,
}

impl Registry {
    /// Store a fresh handle for `T`, clearing whichever handle it replaces.
    ///
    /// Returns whether the replaced handle was still live.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, implementation: &Arc<T>) -> bool {
        let handle: Box<dyn ErasedHandle> = Box::new(WeakHandle::new(implementation));
        match self.handles.insert(FeatureKey::of::<T>(), handle) {
            Some(mut previous) => {
                let was_live = previous.is_alive();
                previous.clear();
                was_live
            }
            None => false,
        }
    }

    /// The live implementation of `T`, if any.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.handles
            .get(&FeatureKey::of::<T>())?
            .as_any()
            .downcast_ref::<WeakHandle<T>>()?
            .get()
    }

    /// Clear and drop the handle for `key`. Returns whether one existed.
    pub fn remove(&mut self, key: &FeatureKey) -> bool {
        match self.handles.remove(key) {
            Some(mut handle) => {
                handle.clear();
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self, key: &FeatureKey) -> bool {
        self.handles.get(key).is_some_and(|handle| handle.is_alive())
    }

    /// Features whose handle currently resolves, sorted by name.
    pub fn live_features(&self) -> Vec<FeatureKey> {
        let mut live: Vec<FeatureKey> = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.is_alive())
            .map(|(key, _)| *key)
            .collect();
        live.sort_by_key(|key| key.name());
        live
    }

    /// Number of map entries, dead ones included.
    pub fn entry_count(&self) -> usize {
        self.handles.len()
    }

    pub fn clear(&mut self) {
        for handle in self.handles.values_mut() {
            handle.clear();
        }
        self.handles.clear();
    }
}
