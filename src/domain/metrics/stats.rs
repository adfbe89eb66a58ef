//! Per-adapter statistics snapshots

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

// ============================================================================
// LatencyStats
// ============================================================================

/// Latency statistics computed from a sample window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of samples the statistics were computed from
    pub samples: usize,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    /// 50th percentile (median) latency
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

impl LatencyStats {
    /// Calculate latency statistics from a list of samples
    pub fn from_samples(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_unstable();
        let len = samples.len();
        let sum: u64 = samples.iter().sum();

        Self {
            samples: len,
            avg_ms: sum as f64 / len as f64,
            min_ms: samples[0],
            max_ms: samples[len - 1],
            p50_ms: percentile(&samples, 50.0),
            p95_ms: percentile(&samples, 95.0),
            p99_ms: percentile(&samples, 99.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted_samples: &[u64], p: f64) -> u64 {
    if sorted_samples.is_empty() {
        return 0;
    }

    let rank = (p / 100.0 * sorted_samples.len() as f64).ceil() as usize;
    sorted_samples[rank.clamp(1, sorted_samples.len()) - 1]
}

// ============================================================================
// AdapterStats
// ============================================================================

/// Point-in-time view of one adapter's aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStats {
    pub adapter_id: String,
    pub request_count: u64,
    pub success_count: u64,
    /// success_count / request_count, 0.0 before the first request
    pub success_rate: f64,
    /// Statistics over the bounded latency window
    pub latency: LatencyStats,
    /// Requests per tenant tag
    pub tenant_requests: BTreeMap<String, u64>,
    pub last_updated: DateTime<Utc>,
}

impl AdapterStats {
    pub fn failure_count(&self) -> u64 {
        self.request_count - self.success_count
    }

    /// Value used to rank adapters; larger is better for every metric
    pub fn ranking_value(&self, metric: RankingMetric) -> Option<f64> {
        match metric {
            RankingMetric::SuccessRate => Some(self.success_rate),
            RankingMetric::RequestCount => Some(self.request_count as f64),
            RankingMetric::InverseLatency => {
                if self.latency.is_empty() {
                    None
                } else {
                    // +1 keeps zero-millisecond medians finite
                    Some(1.0 / (self.latency.p50_ms as f64 + 1.0))
                }
            }
        }
    }
}

// ============================================================================
// RankingMetric
// ============================================================================

/// Metric used by top-adapter queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    SuccessRate,
    /// Lower median latency ranks higher
    InverseLatency,
    RequestCount,
}

impl RankingMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::InverseLatency => "inverse_latency",
            Self::RequestCount => "request_count",
        }
    }

    /// Order two snapshots best-first: metric desc, request count desc, id asc.
    /// Snapshots without a value for the metric sort after those with one.
    pub fn compare(&self, a: &AdapterStats, b: &AdapterStats) -> Ordering {
        let by_metric = match (a.ranking_value(*self), b.ranking_value(*self)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        by_metric
            .then_with(|| b.request_count.cmp(&a.request_count))
            .then_with(|| a.adapter_id.cmp(&b.adapter_id))
    }
}

impl FromStr for RankingMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success_rate" => Ok(Self::SuccessRate),
            "inverse_latency" | "latency" => Ok(Self::InverseLatency),
            "request_count" | "requests" => Ok(Self::RequestCount),
            other => Err(DomainError::invalid_argument(format!(
                "Unknown ranking metric: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
