//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::{MetricsConfig, ObservabilityConfig};
pub use metrics::{
    init_metrics, record_adapter_request, record_assignment, record_build_duration,
    record_cache_event, record_composition_error, set_cache_entries, CacheEvent,
    PrometheusMetrics,
};
