//! Single-flight composition cache with LRU and idle-TTL eviction

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::CompositionCacheConfig;
use super::lease::{CompositionLease, EntryRef, LeaseOrigin};
use crate::domain::{Composer, CompositionKey, DomainError};
use crate::infrastructure::observability::{self, CacheEvent};

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionState {
    Building,
    Ready,
    /// Published to waiters only; failed entries are removed from the table
    Failed,
}

/// Value broadcast to everyone waiting on a build
enum BuildStatus<M> {
    Building,
    Ready(Arc<M>),
    Failed(DomainError),
}

impl<M> Clone for BuildStatus<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Building => Self::Building,
            Self::Ready(model) => Self::Ready(Arc::clone(model)),
            Self::Failed(error) => Self::Failed(error.clone()),
        }
    }
}

impl<M> BuildStatus<M> {
    fn state(&self) -> CompositionState {
        match self {
            Self::Building => CompositionState::Building,
            Self::Ready(_) => CompositionState::Ready,
            Self::Failed(_) => CompositionState::Failed,
        }
    }
}

enum Slot<M> {
    Building(watch::Receiver<BuildStatus<M>>),
    Ready(Arc<M>),
}

struct CacheEntry<M> {
    generation: u64,
    slot: Slot<M>,
    created_at: Instant,
    last_used_at: Instant,
    ref_count: usize,
    /// Base-model entries are never evicted and do not count against capacity
    pinned: bool,
    /// Invalidated while referenced; removed once the last reference is released
    stale: bool,
}

impl<M> CacheEntry<M> {
    fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Ready(_))
    }

    fn is_idle(&self) -> bool {
        self.ref_count == 0 && self.is_ready()
    }

    fn is_evictable(&self) -> bool {
        self.is_idle() && !self.pinned
    }

    fn state(&self) -> CompositionState {
        match self.slot {
            Slot::Building(_) => CompositionState::Building,
            Slot::Ready(_) => CompositionState::Ready,
        }
    }
}

/// An invalidated entry that was replaced while leases on it were still live.
/// It keeps its capacity slot until the last lease is returned.
struct RetiredEntry {
    key: CompositionKey,
    ref_count: usize,
    pinned: bool,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    joins: u64,
    failures: u64,
    timeouts: u64,
    capacity_rejections: u64,
    lru_evictions: u64,
    ttl_evictions: u64,
    invalidations: u64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub capacity_rejections: u64,
    pub lru_evictions: u64,
    pub ttl_evictions: u64,
    pub invalidations: u64,
    pub entries: usize,
    /// Replaced entries still held by leases
    pub retired_entries: usize,
    pub building_entries: usize,
    pub pinned_entries: usize,
    pub capacity: usize,
}

/// Snapshot of a single cache entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub digest: String,
    pub state: CompositionState,
    pub ref_count: usize,
    pub pinned: bool,
    pub stale: bool,
    pub age_ms: u64,
    pub idle_ms: u64,
}

/// Table guarded by the cache mutex. Never held across an await point.
pub(super) struct CacheTable<M> {
    entries: HashMap<CompositionKey, CacheEntry<M>>,
    /// Keyed by generation, which is unique across keys
    retired: HashMap<u64, RetiredEntry>,
    next_generation: u64,
    counters: Counters,
}

impl<M> CacheTable<M> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            retired: HashMap::new(),
            next_generation: 0,
            counters: Counters::default(),
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Number of entries counted against capacity
    fn occupied(&self) -> usize {
        self.entries.values().filter(|e| !e.pinned).count()
            + self.retired.values().filter(|r| !r.pinned).count()
    }

    /// Return one reference taken under `generation`
    pub(super) fn release(&mut self, key: &CompositionKey, generation: u64) {
        let Some(entry) = self
            .entries
            .get_mut(key)
            .filter(|entry| entry.generation == generation)
        else {
            self.release_retired(generation);
            return;
        };

        entry.ref_count = entry.ref_count.saturating_sub(1);

        if entry.stale && entry.is_idle() {
            self.entries.remove(key);
            self.record_invalidation(key);
        }
    }

    fn release_retired(&mut self, generation: u64) {
        let Some(retired) = self.retired.get_mut(&generation) else {
            return;
        };

        retired.ref_count = retired.ref_count.saturating_sub(1);

        if retired.ref_count == 0 {
            if let Some(retired) = self.retired.remove(&generation) {
                self.record_invalidation(&retired.key);
            }
        }
    }

    /// Move a stale ready entry out of the way of its replacement.
    /// Leased entries stay counted against capacity until released.
    fn retire(&mut self, key: &CompositionKey) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };

        if entry.ref_count == 0 {
            self.record_invalidation(key);
            return;
        }

        debug!(key = %key, generation = entry.generation, "Retired stale composition");
        self.retired.insert(
            entry.generation,
            RetiredEntry {
                key: key.clone(),
                ref_count: entry.ref_count,
                pinned: entry.pinned,
            },
        );
    }

    /// Evict the least recently used idle entry if the table is full
    fn make_room(&mut self, capacity: usize) -> Result<(), DomainError> {
        if self.occupied() < capacity {
            return Ok(());
        }

        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_evictable())
            .min_by_key(|(_, entry)| entry.last_used_at)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                self.counters.lru_evictions += 1;
                observability::record_cache_event(CacheEvent::LruEviction);
                debug!(key = %key, "Evicted least recently used composition");
                Ok(())
            }
            None => {
                self.counters.capacity_rejections += 1;
                observability::record_cache_event(CacheEvent::CapacityRejected);
                Err(DomainError::capacity_exceeded(capacity))
            }
        }
    }

    fn finish_build(&mut self, key: &CompositionKey, generation: u64, status: &BuildStatus<M>) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };

        if entry.generation != generation {
            return;
        }

        let remove = match status {
            BuildStatus::Ready(model) => {
                entry.slot = Slot::Ready(Arc::clone(model));
                entry.last_used_at = Instant::now();
                entry.stale && entry.ref_count == 0
            }
            BuildStatus::Failed(_) => {
                self.counters.failures += 1;
                observability::record_cache_event(CacheEvent::Failure);
                true
            }
            BuildStatus::Building => false,
        };

        if remove {
            self.entries.remove(key);
        }

        observability::set_cache_entries(self.entries.len());
    }

    /// Remove now if idle, otherwise mark stale
    fn invalidate(&mut self, key: &CompositionKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        if entry.is_idle() {
            self.entries.remove(key);
            self.record_invalidation(key);
        } else {
            entry.stale = true;
        }

        true
    }

    fn record_invalidation(&mut self, key: &CompositionKey) {
        self.counters.invalidations += 1;
        observability::record_cache_event(CacheEvent::Invalidation);
        observability::set_cache_entries(self.entries.len());
        debug!(key = %key, "Removed invalidated composition");
    }

    fn sweep(&mut self, ttl: Duration, now: Instant) -> usize {
        let expired: Vec<CompositionKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.is_evictable() && now.saturating_duration_since(entry.last_used_at) >= ttl
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            observability::record_cache_event(CacheEvent::TtlEviction);
        }

        self.counters.ttl_evictions += expired.len() as u64;

        if !expired.is_empty() {
            observability::set_cache_entries(self.entries.len());
        }

        expired.len()
    }

    fn stats(&self, capacity: usize) -> CacheStats {
        let c = &self.counters;

        CacheStats {
            hits: c.hits,
            misses: c.misses,
            joins: c.joins,
            failures: c.failures,
            timeouts: c.timeouts,
            capacity_rejections: c.capacity_rejections,
            lru_evictions: c.lru_evictions,
            ttl_evictions: c.ttl_evictions,
            invalidations: c.invalidations,
            entries: self.entries.len(),
            retired_entries: self.retired.len(),
            building_entries: self.entries.values().filter(|e| !e.is_ready()).count(),
            pinned_entries: self.entries.values().filter(|e| e.pinned).count(),
            capacity,
        }
    }
}

fn lock_table<M>(table: &Mutex<CacheTable<M>>) -> MutexGuard<'_, CacheTable<M>> {
    match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Composition cache lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Outcome of the synchronous part of a lookup
enum Acquired<M> {
    Ready(CompositionLease<M>),
    Pending {
        rx: watch::Receiver<BuildStatus<M>>,
        entry: EntryRef<M>,
        origin: LeaseOrigin,
    },
    /// An invalidated build is still running; wait for it, then look up again
    Superseded(watch::Receiver<BuildStatus<M>>),
}

/// Cache of composed models keyed by canonical composition.
///
/// Concurrent requests for the same key share one build. Builds run on their own
/// task, so a caller that gives up waiting does not cancel the build for others.
/// Entries are evicted least-recently-used first when the cache is full and swept
/// after sitting idle for the configured TTL; entries still referenced by a lease
/// are never evicted.
pub struct CompositionCache<C: Composer> {
    composer: Arc<C>,
    config: CompositionCacheConfig,
    table: Arc<Mutex<CacheTable<C::Model>>>,
}

impl<C: Composer> CompositionCache<C> {
    pub fn new(composer: Arc<C>, config: CompositionCacheConfig) -> Self {
        info!(
            capacity = config.capacity,
            ttl_secs = config.ttl.as_secs_f64(),
            "Composition cache created"
        );

        Self {
            composer,
            config,
            table: Arc::new(Mutex::new(CacheTable::new())),
        }
    }

    pub fn config(&self) -> &CompositionCacheConfig {
        &self.config
    }

    /// Return the composed model for `key`, building it if necessary.
    ///
    /// The returned lease holds one reference on the entry until dropped.
    pub async fn get_or_build(
        &self,
        key: &CompositionKey,
    ) -> Result<CompositionLease<C::Model>, DomainError> {
        let deadline = tokio::time::Instant::now() + self.config.wait_timeout;

        loop {
            match self.acquire(key)? {
                Acquired::Ready(lease) => return Ok(lease),
                Acquired::Pending { rx, entry, origin } => {
                    return self.await_build(rx, entry, origin, deadline).await;
                }
                Acquired::Superseded(mut rx) => {
                    let waited = tokio::time::timeout_at(
                        deadline,
                        rx.wait_for(|status| !matches!(status, BuildStatus::Building)),
                    )
                    .await
                    .map(|finished| finished.is_ok());

                    match waited {
                        Ok(true) => continue,
                        Ok(false) => {
                            return Err(DomainError::composition_failure(
                                key.short_digest(),
                                "build task ended without publishing a result",
                            ));
                        }
                        Err(_) => return Err(self.timed_out(key)),
                    }
                }
            }
        }
    }

    /// Give a lease back explicitly; equivalent to dropping it
    pub fn release(&self, lease: CompositionLease<C::Model>) {
        drop(lease);
    }

    fn acquire(&self, key: &CompositionKey) -> Result<Acquired<C::Model>, DomainError> {
        let mut guard = lock_table(&self.table);
        let table = &mut *guard;
        let now = Instant::now();

        let stale_build = table
            .entries
            .get(key)
            .filter(|entry| entry.stale)
            .map(|entry| match &entry.slot {
                Slot::Building(rx) => Some(rx.clone()),
                Slot::Ready(_) => None,
            });

        match stale_build {
            Some(Some(rx)) => return Ok(Acquired::Superseded(rx)),
            Some(None) => table.retire(key),
            None => {}
        }

        if let Some(entry) = table.entries.get_mut(key) {
            entry.ref_count += 1;
            let entry_ref = EntryRef::new(&self.table, key.clone(), entry.generation);

            return match &entry.slot {
                Slot::Ready(model) => {
                    entry.last_used_at = now;
                    table.counters.hits += 1;
                    observability::record_cache_event(CacheEvent::Hit);

                    Ok(Acquired::Ready(CompositionLease::new(
                        Arc::clone(model),
                        LeaseOrigin::Hit,
                        entry_ref,
                    )))
                }
                Slot::Building(rx) => {
                    table.counters.joins += 1;
                    observability::record_cache_event(CacheEvent::Join);

                    Ok(Acquired::Pending {
                        rx: rx.clone(),
                        entry: entry_ref,
                        origin: LeaseOrigin::Joined,
                    })
                }
            };
        }

        if !key.is_base() {
            table.make_room(self.config.capacity)?;
        }

        let generation = table.next_generation();
        let (tx, rx) = watch::channel(BuildStatus::Building);

        table.entries.insert(
            key.clone(),
            CacheEntry {
                generation,
                slot: Slot::Building(rx.clone()),
                created_at: now,
                last_used_at: now,
                ref_count: 1,
                pinned: key.is_base(),
                stale: false,
            },
        );
        table.counters.misses += 1;
        observability::record_cache_event(CacheEvent::Miss);
        observability::set_cache_entries(table.entries.len());

        debug!(key = %key, generation, "Starting composition build");
        self.spawn_build(key.clone(), generation, tx);

        Ok(Acquired::Pending {
            rx,
            entry: EntryRef::new(&self.table, key.clone(), generation),
            origin: LeaseOrigin::Built,
        })
    }

    fn spawn_build(
        &self,
        key: CompositionKey,
        generation: u64,
        tx: watch::Sender<BuildStatus<C::Model>>,
    ) {
        let composer = Arc::clone(&self.composer);
        let table_ref = Arc::downgrade(&self.table);

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = AssertUnwindSafe(composer.compose(key.base_model_id(), key.adapters()))
                .catch_unwind()
                .await;

            let status = match outcome {
                Ok(Ok(model)) => BuildStatus::Ready(Arc::new(model)),
                Ok(Err(e)) => BuildStatus::Failed(as_composition_failure(&key, e)),
                Err(payload) => BuildStatus::Failed(DomainError::composition_failure(
                    key.short_digest(),
                    format!("composer panicked: {}", panic_message(payload.as_ref())),
                )),
            };

            let elapsed = started.elapsed();
            observability::record_build_duration(elapsed, matches!(status, BuildStatus::Ready(_)));

            if let Some(table) = table_ref.upgrade() {
                lock_table(&table).finish_build(&key, generation, &status);
            }

            match &status {
                BuildStatus::Failed(e) => {
                    warn!(key = %key, error = %e, "Composition build failed");
                }
                _ => {
                    info!(
                        key = %key,
                        state = ?status.state(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Composition build finished"
                    );
                }
            }

            tx.send_replace(status);
        });
    }

    async fn await_build(
        &self,
        mut rx: watch::Receiver<BuildStatus<C::Model>>,
        entry: EntryRef<C::Model>,
        origin: LeaseOrigin,
        deadline: tokio::time::Instant,
    ) -> Result<CompositionLease<C::Model>, DomainError> {
        let waited = tokio::time::timeout_at(
            deadline,
            rx.wait_for(|status| !matches!(status, BuildStatus::Building)),
        )
        .await;

        let status = match waited {
            Ok(Ok(status)) => (*status).clone(),
            Ok(Err(_)) => BuildStatus::Failed(DomainError::composition_failure(
                entry.key().short_digest(),
                "build task ended without publishing a result",
            )),
            Err(_) => return Err(self.timed_out(entry.key())),
        };

        match status {
            BuildStatus::Ready(model) => Ok(CompositionLease::new(model, origin, entry)),
            BuildStatus::Failed(e) => Err(e),
            BuildStatus::Building => Err(DomainError::internal(
                "composition wait returned before the build finished",
            )),
        }
    }

    fn timed_out(&self, key: &CompositionKey) -> DomainError {
        lock_table(&self.table).counters.timeouts += 1;
        observability::record_cache_event(CacheEvent::Timeout);

        DomainError::composition_timeout(
            key.short_digest(),
            self.config.wait_timeout.as_millis() as u64,
        )
    }

    /// Evict every idle entry unused for longer than the TTL
    pub fn sweep_expired(&self) -> usize {
        let swept = lock_table(&self.table).sweep(self.config.ttl, Instant::now());

        if swept > 0 {
            debug!(swept, "Swept idle compositions");
        }

        swept
    }

    /// Run [`sweep_expired`](Self::sweep_expired) periodically until the cache is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(cache) = cache.upgrade() else {
                    debug!("Composition cache dropped, stopping sweeper");
                    break;
                };

                cache.sweep_expired();
            }
        })
    }

    /// Drop the entry for `key`. Referenced entries are removed on last release.
    pub fn invalidate(&self, key: &CompositionKey) -> bool {
        lock_table(&self.table).invalidate(key)
    }

    /// Invalidate every composition that includes `adapter_id`
    pub fn invalidate_adapter(&self, adapter_id: &str) -> usize {
        let mut table = lock_table(&self.table);

        let keys: Vec<CompositionKey> = table
            .entries
            .keys()
            .filter(|key| key.contains_adapter(adapter_id))
            .cloned()
            .collect();

        for key in &keys {
            table.invalidate(key);
        }

        if !keys.is_empty() {
            info!(adapter_id, count = keys.len(), "Invalidated compositions for adapter");
        }

        keys.len()
    }

    /// Whether a ready model is cached for `key`
    pub fn contains(&self, key: &CompositionKey) -> bool {
        lock_table(&self.table)
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_ready() && !entry.stale)
    }

    pub fn len(&self) -> usize {
        lock_table(&self.table).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        lock_table(&self.table).stats(self.config.capacity)
    }

    /// Snapshot of every entry, most recently used first
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let table = lock_table(&self.table);
        let now = Instant::now();

        let mut rows: Vec<(Instant, CacheEntryInfo)> = table
            .entries
            .iter()
            .map(|(key, entry)| {
                let info = CacheEntryInfo {
                    key: key.to_string(),
                    digest: key.digest().to_string(),
                    state: entry.state(),
                    ref_count: entry.ref_count,
                    pinned: entry.pinned,
                    stale: entry.stale,
                    age_ms: now.saturating_duration_since(entry.created_at).as_millis() as u64,
                    idle_ms: now.saturating_duration_since(entry.last_used_at).as_millis() as u64,
                };
                (entry.last_used_at, info)
            })
            .collect();

        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, info)| info).collect()
    }
}

impl<C: Composer> fmt::Debug for CompositionCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionCache")
            .field("composer", &self.composer)
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

fn as_composition_failure(key: &CompositionKey, error: DomainError) -> DomainError {
    match error {
        DomainError::CompositionFailure { .. } => error,
        other => DomainError::composition_failure(key.short_digest(), other.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
