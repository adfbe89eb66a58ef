//! Per-adapter metrics aggregation

mod aggregator;
mod reservoir;

pub use aggregator::{MetricsAggregator, MetricsAggregatorConfig, OTHER_TENANTS};
pub use reservoir::LatencyReservoir;
