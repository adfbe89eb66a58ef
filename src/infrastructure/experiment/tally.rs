//! Per-variant observation tallies

use super::statistical::SampleSummary;
use crate::domain::experiment::{Variant, VariantMetrics};

/// Assignments and outcomes observed for one variant, in constant memory
#[derive(Debug, Clone, Default)]
pub struct VariantTally {
    pub assignments: u64,
    pub successes: u64,
    /// Latency of every recorded outcome
    pub latency: SampleSummary,
}

impl VariantTally {
    pub fn record_assignment(&mut self) {
        self.assignments += 1;
    }

    pub fn record_outcome(&mut self, success: bool, latency_ms: f64) {
        if success {
            self.successes += 1;
        }
        self.latency.push(latency_ms);
    }

    /// Number of recorded outcomes
    pub fn samples(&self) -> u64 {
        self.latency.count
    }

    pub fn success_rate(&self) -> f64 {
        if self.samples() == 0 {
            return 0.0;
        }
        self.successes as f64 / self.samples() as f64
    }

    pub fn to_metrics(&self, variant: &Variant, is_control: bool) -> VariantMetrics {
        VariantMetrics {
            variant_id: variant.id().to_string(),
            variant_name: variant.name().to_string(),
            weight: variant.weight(),
            is_control,
            assignments: self.assignments,
            samples: self.samples(),
            successes: self.successes,
            success_rate: self.success_rate(),
            mean_latency_ms: self.latency.mean,
            latency_std_dev_ms: self.latency.std_dev(),
        }
    }
}
