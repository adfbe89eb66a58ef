//! Experiment result types for metrics and statistical analysis

use serde::{Deserialize, Serialize};

use super::entity::{ExperimentStatus, TargetMetric};

// ============================================================================
// VariantMetrics
// ============================================================================

/// Aggregated observations for one variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub variant_id: String,
    pub variant_name: String,
    /// Configured traffic weight
    pub weight: f64,
    pub is_control: bool,
    /// Number of subjects routed to the variant
    pub assignments: u64,
    /// Number of recorded outcomes
    pub samples: u64,
    pub successes: u64,
    /// Success rate (0.0 - 1.0)
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub latency_std_dev_ms: f64,
}

impl VariantMetrics {
    pub fn new(variant_id: impl Into<String>, variant_name: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            variant_name: variant_name.into(),
            ..Default::default()
        }
    }

    /// Value of the target metric for this variant
    pub fn metric_value(&self, metric: TargetMetric) -> f64 {
        match metric {
            TargetMetric::SuccessRate => self.success_rate,
            TargetMetric::LatencyMs => self.mean_latency_ms,
        }
    }
}

// ============================================================================
// StatisticalSignificance
// ============================================================================

/// Statistical test used for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceTest {
    /// Two-proportion z-test on success rates
    TwoProportionZ,
    /// Welch's unequal-variance t-test on means
    WelchT,
}

/// Results of statistical significance testing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalSignificance {
    pub test: SignificanceTest,
    /// Two-tailed p-value
    pub p_value: f64,
    pub is_significant: bool,
    /// Confidence level used (e.g., 0.95 for 95%)
    pub confidence_level: f64,
    pub control_mean: f64,
    pub treatment_mean: f64,
    /// Relative change from control to treatment (percentage)
    pub relative_change: f64,
}

impl StatisticalSignificance {
    pub fn new(
        test: SignificanceTest,
        p_value: f64,
        confidence_level: f64,
        control_mean: f64,
        treatment_mean: f64,
    ) -> Self {
        let relative_change = if control_mean != 0.0 {
            (treatment_mean - control_mean) / control_mean * 100.0
        } else {
            0.0
        };

        Self {
            test,
            p_value,
            is_significant: p_value < (1.0 - confidence_level),
            confidence_level,
            control_mean,
            treatment_mean,
            relative_change,
        }
    }

    /// Check if the treatment significantly beats control in the metric's favourable direction
    pub fn treatment_is_better(&self, metric: TargetMetric) -> bool {
        if !self.is_significant {
            return false;
        }

        if metric.higher_is_better() {
            self.treatment_mean > self.control_mean
        } else {
            self.treatment_mean < self.control_mean
        }
    }
}

// ============================================================================
// VariantComparison
// ============================================================================

/// Outcome of comparing a treatment against the control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Both arms met the minimum sample size and a test was run
    Tested(StatisticalSignificance),
    /// At least one arm is below the minimum sample size
    InsufficientSample {
        required: u64,
        control_samples: u64,
        treatment_samples: u64,
    },
    /// Samples suffice but carry no variance to test against (e.g. identical constants)
    Degenerate,
}

/// Comparison between one treatment and the control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantComparison {
    pub control_variant_id: String,
    pub treatment_variant_id: String,
    pub metric: TargetMetric,
    pub outcome: ComparisonOutcome,
}

impl VariantComparison {
    pub fn significance(&self) -> Option<&StatisticalSignificance> {
        match &self.outcome {
            ComparisonOutcome::Tested(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self.outcome, ComparisonOutcome::InsufficientSample { .. })
    }
}

// ============================================================================
// ExperimentResult
// ============================================================================

/// Complete results for an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub experiment_name: String,
    pub status: ExperimentStatus,
    pub target_metric: TargetMetric,
    /// Outcomes recorded across all variants
    pub total_samples: u64,
    /// Assignments observed across all variants
    pub total_assignments: u64,
    pub variant_metrics: Vec<VariantMetrics>,
    /// One comparison per non-control variant
    pub comparisons: Vec<VariantComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl ExperimentResult {
    pub fn new(
        experiment_id: impl Into<String>,
        experiment_name: impl Into<String>,
        status: ExperimentStatus,
        target_metric: TargetMetric,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            experiment_name: experiment_name.into(),
            status,
            target_metric,
            total_samples: 0,
            total_assignments: 0,
            variant_metrics: Vec::new(),
            comparisons: Vec::new(),
            winner_variant_id: None,
            recommendation: None,
        }
    }

    pub fn get_variant_metrics(&self, variant_id: &str) -> Option<&VariantMetrics> {
        self.variant_metrics
            .iter()
            .find(|m| m.variant_id == variant_id)
    }

    pub fn get_comparison(&self, treatment_variant_id: &str) -> Option<&VariantComparison> {
        self.comparisons
            .iter()
            .find(|c| c.treatment_variant_id == treatment_variant_id)
    }

    pub fn has_significant_result(&self) -> bool {
        self.comparisons
            .iter()
            .filter_map(|c| c.significance())
            .any(|s| s.is_significant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significance_direction() {
        let faster = StatisticalSignificance::new(SignificanceTest::WelchT, 0.001, 0.95, 200.0, 150.0);
        assert!(faster.is_significant);
        assert!(faster.treatment_is_better(TargetMetric::LatencyMs));
        assert!(!faster.treatment_is_better(TargetMetric::SuccessRate));
        assert!((faster.relative_change + 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_significant_is_never_better() {
        let sig = StatisticalSignificance::new(SignificanceTest::TwoProportionZ, 0.4, 0.95, 0.5, 0.9);
        assert!(!sig.is_significant);
        assert!(!sig.treatment_is_better(TargetMetric::SuccessRate));
    }

    #[test]
    fn test_insufficient_sample_serialization() {
        let comparison = VariantComparison {
            control_variant_id: "control".to_string(),
            treatment_variant_id: "treatment".to_string(),
            metric: TargetMetric::SuccessRate,
            outcome: ComparisonOutcome::InsufficientSample {
                required: 30,
                control_samples: 4,
                treatment_samples: 40,
            },
        };

        let json = serde_json::to_string(&comparison).unwrap();
        assert!(json.contains("\"status\":\"insufficient_sample\""));
        assert!(comparison.is_insufficient());
        assert!(comparison.significance().is_none());
    }
}
