//! In-memory per-adapter request aggregation

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::reservoir::LatencyReservoir;
use crate::domain::{AdapterStats, DomainError, LatencyStats, RankingMetric};
use crate::infrastructure::observability;

/// Tenant tag that absorbs requests once an adapter has seen too many distinct tenants
pub const OTHER_TENANTS: &str = "_other";

/// Configuration for the metrics aggregator
#[derive(Debug, Clone)]
pub struct MetricsAggregatorConfig {
    /// Latency samples kept per adapter
    pub latency_window: usize,
    /// Distinct tenant tags tracked per adapter
    pub max_tenants_per_adapter: usize,
}

impl Default for MetricsAggregatorConfig {
    fn default() -> Self {
        Self {
            latency_window: 1024,
            max_tenants_per_adapter: 1000,
        }
    }
}

impl MetricsAggregatorConfig {
    pub fn with_latency_window(mut self, window: usize) -> Self {
        self.latency_window = window;
        self
    }

    pub fn with_max_tenants(mut self, max_tenants: usize) -> Self {
        self.max_tenants_per_adapter = max_tenants;
        self
    }
}

#[derive(Debug)]
struct AdapterState {
    request_count: u64,
    success_count: u64,
    latencies: LatencyReservoir,
    tenants: HashMap<String, u64>,
    last_updated: DateTime<Utc>,
}

impl AdapterState {
    fn new(latency_window: usize) -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            latencies: LatencyReservoir::new(latency_window),
            tenants: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    fn record(&mut self, tenant: &str, latency_ms: u64, success: bool, max_tenants: usize) {
        self.request_count += 1;
        if success {
            self.success_count += 1;
        }
        self.latencies.push(latency_ms);

        let tenant = if self.tenants.contains_key(tenant) || self.tenants.len() < max_tenants {
            tenant
        } else {
            OTHER_TENANTS
        };
        *self.tenants.entry(tenant.to_string()).or_insert(0) += 1;

        self.last_updated = Utc::now();
    }

    fn snapshot(&self, adapter_id: &str) -> AdapterStats {
        let success_rate = if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        };

        AdapterStats {
            adapter_id: adapter_id.to_string(),
            request_count: self.request_count,
            success_count: self.success_count,
            success_rate,
            latency: LatencyStats::from_samples(self.latencies.samples().to_vec()),
            tenant_requests: self
                .tenants
                .iter()
                .map(|(tenant, count)| (tenant.clone(), *count))
                .collect::<BTreeMap<_, _>>(),
            last_updated: self.last_updated,
        }
    }
}

type StateMap = HashMap<String, Arc<Mutex<AdapterState>>>;

/// Rolling per-adapter counters and latency windows.
///
/// The adapter map lock is only taken for writing the first time an adapter is
/// seen; after that each adapter is synchronized on its own mutex so requests for
/// different adapters do not contend.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    adapters: RwLock<StateMap>,
    config: MetricsAggregatorConfig,
}

impl MetricsAggregator {
    pub fn new(config: MetricsAggregatorConfig) -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Record one request served by `adapter_id`. Never fails.
    pub fn record_request(&self, adapter_id: &str, tenant: &str, latency_ms: u64, success: bool) {
        let state = self.state_for(adapter_id);
        lock_state(&state).record(
            tenant,
            latency_ms,
            success,
            self.config.max_tenants_per_adapter,
        );

        observability::record_adapter_request(
            adapter_id,
            success,
            Duration::from_millis(latency_ms),
        );
        debug!(adapter_id, tenant, latency_ms, success, "Recorded adapter request");
    }

    /// Snapshot for one adapter, `None` if it has never been seen
    pub fn get_adapter_metrics(&self, adapter_id: &str) -> Option<AdapterStats> {
        let state = read_map(&self.adapters).get(adapter_id).cloned()?;
        let stats = lock_state(&state).snapshot(adapter_id);
        Some(stats)
    }

    /// Best `limit` adapters by `metric`
    pub fn get_top_adapters(&self, metric: RankingMetric, limit: usize) -> Vec<AdapterStats> {
        let mut all = self.all_adapter_metrics();
        all.sort_by(|a, b| metric.compare(a, b));
        all.truncate(limit);
        all
    }

    /// [`get_top_adapters`](Self::get_top_adapters) with the metric given by name
    pub fn get_top_adapters_by_name(
        &self,
        metric: &str,
        limit: usize,
    ) -> Result<Vec<AdapterStats>, DomainError> {
        let metric: RankingMetric = metric.parse()?;
        Ok(self.get_top_adapters(metric, limit))
    }

    /// Snapshot of every adapter, sorted by adapter id
    pub fn all_adapter_metrics(&self) -> Vec<AdapterStats> {
        let states: Vec<(String, Arc<Mutex<AdapterState>>)> = read_map(&self.adapters)
            .iter()
            .map(|(id, state)| (id.clone(), Arc::clone(state)))
            .collect();

        let mut stats: Vec<AdapterStats> = states
            .iter()
            .map(|(id, state)| lock_state(state).snapshot(id))
            .collect();

        stats.sort_by(|a, b| a.adapter_id.cmp(&b.adapter_id));
        stats
    }

    pub fn adapter_count(&self) -> usize {
        read_map(&self.adapters).len()
    }

    fn state_for(&self, adapter_id: &str) -> Arc<Mutex<AdapterState>> {
        if let Some(state) = read_map(&self.adapters).get(adapter_id) {
            return Arc::clone(state);
        }

        let mut adapters = write_map(&self.adapters);
        let state = adapters
            .entry(adapter_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AdapterState::new(self.config.latency_window))));

        Arc::clone(state)
    }
}

fn read_map(map: &RwLock<StateMap>) -> RwLockReadGuard<'_, StateMap> {
    map.read().unwrap_or_else(|poisoned| {
        warn!("Adapter metrics map lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_map(map: &RwLock<StateMap>) -> RwLockWriteGuard<'_, StateMap> {
    map.write().unwrap_or_else(|poisoned| {
        warn!("Adapter metrics map lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn lock_state(state: &Mutex<AdapterState>) -> MutexGuard<'_, AdapterState> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!("Adapter state lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(MetricsAggregatorConfig::default())
    }

    #[test]
    fn test_unknown_adapter_has_no_metrics() {
        assert!(aggregator().get_adapter_metrics("missing").is_none());
    }

    #[test]
    fn test_success_rate_and_counts() {
        let agg = aggregator();
        agg.record_request("a", "tenant-1", 10, true);
        agg.record_request("a", "tenant-1", 20, true);
        agg.record_request("a", "tenant-2", 30, false);
        agg.record_request("a", "tenant-2", 40, true);

        let stats = agg.get_adapter_metrics("a").unwrap();
        assert_eq!(stats.request_count, 4);
        assert_eq!(stats.success_count, 3);
        assert_eq!(stats.failure_count(), 1);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(stats.tenant_requests.get("tenant-1"), Some(&2));
        assert_eq!(stats.tenant_requests.get("tenant-2"), Some(&2));
    }

    #[test]
    fn test_percentiles_from_window() {
        let agg = aggregator();
        for latency in 1..=100 {
            agg.record_request("a", "t", latency, true);
        }

        let latency = agg.get_adapter_metrics("a").unwrap().latency;
        assert_eq!(latency.samples, 100);
        assert_eq!(latency.p50_ms, 50);
        assert_eq!(latency.p95_ms, 95);
        assert_eq!(latency.p99_ms, 99);
        assert_eq!(latency.min_ms, 1);
        assert_eq!(latency.max_ms, 100);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let agg = MetricsAggregator::new(MetricsAggregatorConfig::default().with_latency_window(10));
        for latency in 1..=50 {
            agg.record_request("a", "t", latency, true);
        }

        let stats = agg.get_adapter_metrics("a").unwrap();
        assert_eq!(stats.request_count, 50);
        assert_eq!(stats.latency.samples, 10);
        assert_eq!(stats.latency.min_ms, 41);
    }

    #[test]
    fn test_tenant_cardinality_is_bounded() {
        let agg = MetricsAggregator::new(MetricsAggregatorConfig::default().with_max_tenants(2));
        agg.record_request("a", "t1", 1, true);
        agg.record_request("a", "t2", 1, true);
        agg.record_request("a", "t3", 1, true);
        agg.record_request("a", "t4", 1, true);
        agg.record_request("a", "t1", 1, true);

        let tenants = agg.get_adapter_metrics("a").unwrap().tenant_requests;
        assert_eq!(tenants.get("t1"), Some(&2));
        assert_eq!(tenants.get("t2"), Some(&1));
        assert_eq!(tenants.get(OTHER_TENANTS), Some(&2));
    }

    #[test]
    fn test_top_adapters_by_success_rate_with_tie_breaks() {
        let agg = aggregator();

        // a: 100%, 2 requests
        agg.record_request("a", "t", 5, true);
        agg.record_request("a", "t", 5, true);
        // b: 100%, 4 requests -> ahead of a on request count
        for _ in 0..4 {
            agg.record_request("b", "t", 5, true);
        }
        // c: 50%
        agg.record_request("c", "t", 5, true);
        agg.record_request("c", "t", 5, false);
        // d: 100%, 2 requests -> same as a, id breaks the tie
        agg.record_request("d", "t", 5, true);
        agg.record_request("d", "t", 5, true);
        // e: 0%
        agg.record_request("e", "t", 5, false);
        // f: 75%
        for success in [true, true, true, false] {
            agg.record_request("f", "t", 5, success);
        }

        let top: Vec<String> = agg
            .get_top_adapters_by_name("success_rate", 5)
            .unwrap()
            .into_iter()
            .map(|s| s.adapter_id)
            .collect();

        assert_eq!(top, vec!["b", "a", "d", "f", "c"]);
    }

    #[test]
    fn test_top_adapters_by_inverse_latency() {
        let agg = aggregator();
        agg.record_request("slow", "t", 500, true);
        agg.record_request("fast", "t", 5, true);
        agg.record_request("medium", "t", 50, true);

        let top: Vec<String> = agg
            .get_top_adapters(RankingMetric::InverseLatency, 10)
            .into_iter()
            .map(|s| s.adapter_id)
            .collect();

        assert_eq!(top, vec!["fast", "medium", "slow"]);
    }

    #[test]
    fn test_unknown_ranking_metric_is_rejected() {
        let err = aggregator().get_top_adapters_by_name("vibes", 3).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument { .. }));
    }

    #[test]
    fn test_all_adapter_metrics_sorted_by_id() {
        let agg = aggregator();
        agg.record_request("zeta", "t", 1, true);
        agg.record_request("alpha", "t", 1, true);

        let ids: Vec<String> = agg
            .all_adapter_metrics()
            .into_iter()
            .map(|s| s.adapter_id)
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert_eq!(agg.adapter_count(), 2);
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let agg = Arc::new(aggregator());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let adapter = if i % 2 == 0 { "shared" } else { "other" };
                    agg.record_request(adapter, &format!("tenant-{worker}"), i, i % 3 != 0);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let shared = agg.get_adapter_metrics("shared").unwrap();
        let other = agg.get_adapter_metrics("other").unwrap();
        assert_eq!(shared.request_count + other.request_count, 4000);
        assert_eq!(shared.request_count, 2000);
        assert_eq!(shared.tenant_requests.len(), 8);
    }
}
