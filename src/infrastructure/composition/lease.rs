//! Reference-counted handles to composed models

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;

use super::cache::CacheTable;
use crate::domain::CompositionKey;

/// How a lease was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseOrigin {
    /// The model was already composed
    Hit,
    /// The caller waited on a build started by another caller
    Joined,
    /// The caller started the build
    Built,
}

impl LeaseOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Joined => "joined",
            Self::Built => "built",
        }
    }
}

/// One unit of an entry's reference count.
///
/// Dropping the handle returns the reference. A handle whose entry has since been
/// replaced (different generation) or removed releases nothing.
pub(super) struct EntryRef<M> {
    table: Weak<Mutex<CacheTable<M>>>,
    key: CompositionKey,
    generation: u64,
}

impl<M> EntryRef<M> {
    pub(super) fn new(table: &Arc<Mutex<CacheTable<M>>>, key: CompositionKey, generation: u64) -> Self {
        Self {
            table: Arc::downgrade(table),
            key,
            generation,
        }
    }

    pub(super) fn key(&self) -> &CompositionKey {
        &self.key
    }
}

impl<M> Drop for EntryRef<M> {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };

        let mut guard = match table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.release(&self.key, self.generation);
    }
}

/// A caller's hold on a composed model.
///
/// While any lease on an entry is alive, the entry cannot be evicted. Dropping the
/// lease releases it; [`CompositionCache::release`](super::CompositionCache::release)
/// does the same explicitly.
pub struct CompositionLease<M> {
    model: Arc<M>,
    origin: LeaseOrigin,
    entry: EntryRef<M>,
}

impl<M> CompositionLease<M> {
    pub(super) fn new(model: Arc<M>, origin: LeaseOrigin, entry: EntryRef<M>) -> Self {
        Self {
            model,
            origin,
            entry,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Shared handle to the model, valid beyond the lease
    pub fn shared(&self) -> Arc<M> {
        Arc::clone(&self.model)
    }

    pub fn key(&self) -> &CompositionKey {
        self.entry.key()
    }

    pub fn origin(&self) -> LeaseOrigin {
        self.origin
    }
}

impl<M> Deref for CompositionLease<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> fmt::Debug for CompositionLease<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionLease")
            .field("key", self.entry.key())
            .field("generation", &self.entry.generation)
            .field("origin", &self.origin)
            .finish()
    }
}
