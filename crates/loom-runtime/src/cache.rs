//! Runtime value cache
//!
//! Generated code cannot close over live values, so generators store them
//! here and bake the identifier into the emitted source as a string literal.
//! Entries are never updated or evicted: an identifier stays resolvable for
//! the lifetime of the cache, which is what lets a generated type call back
//! into its callable or hooks long after the generating call returned.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use loom_sdk::{Activator, CachedValue, Callable, HostError, HostResult, Hook, ObjectRef, ValueSource};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::error::RuntimeError;

static GLOBAL: Lazy<Arc<ValueCache>> = Lazy::new(|| Arc::new(ValueCache::new()));

/// Thread-safe identifier to value store.
#[derive(Default)]
pub struct ValueCache {
    values: DashMap<Uuid, CachedValue>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used when no cache is injected.
    pub fn global() -> Arc<ValueCache> {
        GLOBAL.clone()
    }

    /// Store `value` under a fresh identifier.
    pub fn add(&self, value: CachedValue) -> Uuid {
        self.add_with(value, Uuid::new_v4)
    }

    /// Store `value` under the first identifier from `next_id` not yet taken.
    fn add_with(&self, value: CachedValue, mut next_id: impl FnMut() -> Uuid) -> Uuid {
        loop {
            let id = next_id();
            if let Entry::Vacant(slot) = self.values.entry(id) {
                tracing::trace!(%id, kind = value.kind(), "Cached value");
                slot.insert(value);
                return id;
            }
        }
    }

    pub fn add_callable(&self, callable: Callable) -> Uuid {
        self.add(CachedValue::Callable(callable))
    }

    pub fn add_instance(&self, instance: ObjectRef) -> Uuid {
        self.add(CachedValue::Instance(instance))
    }

    pub fn add_factory(&self, factory: Activator) -> Uuid {
        self.add(CachedValue::Factory(factory))
    }

    pub fn add_hook(&self, hook: Hook) -> Uuid {
        self.add(CachedValue::Hook(hook))
    }

    /// Fetch the value stored under `id`.
    pub fn get(&self, id: &Uuid) -> Result<CachedValue, RuntimeError> {
        self.values
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(RuntimeError::NotFound(*id))
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueSource for ValueCache {
    fn lookup(&self, id: &Uuid) -> HostResult<CachedValue> {
        self.values
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(HostError::NotFound(*id))
    }
}

impl std::fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCache").field("len", &self.values.len()).finish()
    }
}
