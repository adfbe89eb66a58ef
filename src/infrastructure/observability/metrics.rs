//! Prometheus metrics infrastructure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

static LABEL_LIMIT: AtomicUsize = AtomicUsize::new(64);

/// Prometheus metrics handle for rendering the exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    LABEL_LIMIT.store(config.max_label_length.max(1), Ordering::Relaxed);

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("adapter_serving_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Composition cache events counted under `composition_cache_events_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    Join,
    Failure,
    Timeout,
    CapacityRejected,
    LruEviction,
    TtlEviction,
    Invalidation,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Join => "join",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::CapacityRejected => "capacity_rejected",
            Self::LruEviction => "lru_eviction",
            Self::TtlEviction => "ttl_eviction",
            Self::Invalidation => "invalidation",
        }
    }
}

/// Record one served request for an adapter
pub fn record_adapter_request(adapter_id: &str, success: bool, duration: Duration) {
    let labels = [
        ("adapter", truncate_label(adapter_id)),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("adapter_requests_total", &labels).increment(1);
    histogram!("adapter_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if !success {
        counter!("adapter_errors_total", &labels).increment(1);
    }
}

pub fn record_cache_event(event: CacheEvent) {
    counter!("composition_cache_events_total", "event" => event.as_str()).increment(1);
}

/// Record how long a composition build took
pub fn record_build_duration(duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    histogram!("composition_build_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

pub fn set_cache_entries(count: usize) {
    gauge!("composition_cache_entries").set(count as f64);
}

/// Count a request that failed before reaching the base model
pub fn record_composition_error(kind: &'static str) {
    counter!("composition_errors_total", "kind" => kind).increment(1);
}

pub fn record_assignment(experiment_id: &str, variant_id: &str) {
    let labels = [
        ("experiment", truncate_label(experiment_id)),
        ("variant", truncate_label(variant_id)),
    ];

    counter!("experiment_assignments_total", &labels).increment(1);
}

/// Limit label length to keep series names bounded
fn truncate_label(value: &str) -> String {
    let limit = LABEL_LIMIT.load(Ordering::Relaxed);

    match value.char_indices().nth(limit) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
