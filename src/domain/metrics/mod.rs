//! Adapter telemetry domain types

mod stats;

pub use stats::{AdapterStats, LatencyStats, RankingMetric};
