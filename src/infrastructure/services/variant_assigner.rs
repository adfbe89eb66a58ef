//! Variant assigner for A/B testing adapter compositions
//!
//! Creates experiments, buckets subjects into variants deterministically,
//! tallies outcomes and runs significance tests against the control.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::experiment::{
    ComparisonOutcome, Experiment, ExperimentId, ExperimentResult, ExperimentStatus,
    StatisticalSignificance, TargetMetric, Variant, VariantAssignment, VariantComparison,
    VariantId,
};
use crate::domain::{AdapterRef, DomainError};
use crate::infrastructure::experiment::{
    compare_means, compare_success_rates, ConsistentHasher, ExperimentSlot,
    InMemoryExperimentRegistry, VariantTally,
};
use crate::infrastructure::observability;

// ============================================================================
// Request Types
// ============================================================================

/// Request to create a new experiment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExperimentRequest {
    /// Generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_metric: TargetMetric,
    pub variants: Vec<CreateVariantRequest>,
}

impl CreateExperimentRequest {
    pub fn new(name: impl Into<String>, target_metric: TargetMetric) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            target_metric,
            variants: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variant(mut self, variant: CreateVariantRequest) -> Self {
        self.variants.push(variant);
        self
    }
}

/// Request to create one variant
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVariantRequest {
    pub id: String,
    /// Defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    pub weight: f64,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub adapters: Option<Vec<AdapterRef>>,
}

impl CreateVariantRequest {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            weight,
            control: false,
            adapters: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_control(mut self) -> Self {
        self.control = true;
        self
    }

    pub fn with_adapters(mut self, adapters: Vec<AdapterRef>) -> Self {
        self.adapters = Some(adapters);
        self
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Thresholds used by the variant assigner
#[derive(Debug, Clone)]
pub struct VariantAssignerConfig {
    /// Allowed distance of the traffic-weight sum from 1.0
    pub weight_tolerance: f64,
    /// Outcomes each arm needs before a comparison is tested
    pub min_sample_size: u64,
    /// Confidence level for significance, e.g. 0.95
    pub confidence_level: f64,
}

impl Default for VariantAssignerConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: 1e-6,
            min_sample_size: 30,
            confidence_level: 0.95,
        }
    }
}

impl VariantAssignerConfig {
    pub fn with_min_sample_size(mut self, min_sample_size: u64) -> Self {
        self.min_sample_size = min_sample_size;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn with_weight_tolerance(mut self, tolerance: f64) -> Self {
        self.weight_tolerance = tolerance;
        self
    }
}

// ============================================================================
// Variant Assigner
// ============================================================================

/// Experiment registry plus deterministic assignment and analysis
#[derive(Debug, Default)]
pub struct VariantAssigner {
    registry: Arc<InMemoryExperimentRegistry>,
    config: VariantAssignerConfig,
}

impl VariantAssigner {
    pub fn new(config: VariantAssignerConfig) -> Self {
        Self::with_registry(Arc::new(InMemoryExperimentRegistry::new()), config)
    }

    pub fn with_registry(
        registry: Arc<InMemoryExperimentRegistry>,
        config: VariantAssignerConfig,
    ) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &VariantAssignerConfig {
        &self.config
    }

    // ========================================================================
    // Experiment lifecycle
    // ========================================================================

    /// Validate and register an experiment, returning its id
    pub fn create_experiment(
        &self,
        request: CreateExperimentRequest,
    ) -> Result<ExperimentId, DomainError> {
        let experiment_id = match request.id.as_deref() {
            Some(id) => ExperimentId::new(id)?,
            None => ExperimentId::generate(),
        };

        debug!(experiment_id = %experiment_id, "Creating experiment");

        let mut experiment =
            Experiment::new(experiment_id.clone(), &request.name, request.target_metric);

        if let Some(description) = request.description {
            experiment = experiment.with_description(description);
        }

        for variant_request in request.variants {
            experiment = experiment.with_variant(Self::build_variant(variant_request)?);
        }

        experiment.validate(self.config.weight_tolerance)?;
        self.registry.insert(experiment)?;

        info!(experiment_id = %experiment_id, "Experiment created");

        Ok(experiment_id)
    }

    pub fn get_experiment(&self, id: &str) -> Result<Experiment, DomainError> {
        Ok(self.registry.require(id)?.experiment())
    }

    /// All experiments, newest first
    pub fn list_experiments(&self) -> Vec<Experiment> {
        self.registry.list()
    }

    /// Conclude an active experiment
    pub fn conclude(&self, id: &str) -> Result<Experiment, DomainError> {
        let experiment = self.registry.require(id)?.conclude()?;
        info!(experiment_id = %id, "Experiment concluded");
        Ok(experiment)
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Deterministically bucket `subject_id` into one of the experiment's variants
    pub fn assign_variant(
        experiment: &Experiment,
        subject_id: &str,
    ) -> Result<VariantAssignment, DomainError> {
        let bucket = ConsistentHasher::bucket(experiment.id().as_str(), subject_id);

        let variant = experiment.variant_for_point(bucket).ok_or_else(|| {
            DomainError::internal(format!(
                "Experiment '{}' has no variant receiving traffic",
                experiment.id()
            ))
        })?;

        Ok(Self::assignment_for(experiment, variant, subject_id, bucket))
    }

    /// Assign a subject within a registered experiment
    pub fn assign(
        &self,
        experiment_id: &str,
        subject_id: &str,
    ) -> Result<VariantAssignment, DomainError> {
        self.registry
            .require(experiment_id)?
            .with_experiment(|experiment| Self::assign_variant(experiment, subject_id))
    }

    /// Serving-path variant for a subject, without counting it.
    ///
    /// Active experiments assign deterministically; concluded experiments send every
    /// subject to the control variant.
    pub fn resolve(
        &self,
        experiment_id: &str,
        subject_id: &str,
    ) -> Result<VariantAssignment, DomainError> {
        self.registry
            .require(experiment_id)?
            .with_experiment(|experiment| Self::serving_assignment(experiment, subject_id))
    }

    /// Count an observed assignment against its variant.
    ///
    /// Ignored once the experiment has concluded. The status check and the tally update
    /// run under one read of the experiment, so a concurrent conclude cannot split them.
    pub fn record_assignment(&self, assignment: &VariantAssignment) -> Result<(), DomainError> {
        let slot = self.registry.require(&assignment.experiment_id)?;

        let counted = slot
            .with_experiment(|experiment| Self::count_if_active(&slot, experiment, assignment))?;

        debug!(
            experiment_id = %assignment.experiment_id,
            subject_id = %assignment.subject_id,
            variant_id = %assignment.variant_id,
            counted,
            "Recorded variant assignment"
        );

        Ok(())
    }

    /// Tally the outcome of a request served under a variant.
    ///
    /// Outcomes arriving after the experiment concluded are ignored so results stay fixed.
    pub fn record_outcome(
        &self,
        experiment_id: &str,
        variant_id: &str,
        success: bool,
        latency_ms: f64,
    ) -> Result<(), DomainError> {
        let slot = self.registry.require(experiment_id)?;

        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(DomainError::invalid_argument(format!(
                "Latency must be a non-negative finite number, got {}",
                latency_ms
            )));
        }

        let recorded = slot.with_experiment(|experiment| {
            if !experiment.status().is_active() {
                return Ok(false);
            }
            if !slot.update_tally(variant_id, |t| t.record_outcome(success, latency_ms)) {
                return Err(Self::unknown_variant(experiment_id, variant_id));
            }
            Ok(true)
        })?;

        if !recorded {
            debug!(experiment_id, variant_id, "Ignoring outcome for concluded experiment");
            return Ok(());
        }

        debug!(experiment_id, variant_id, success, latency_ms, "Recorded experiment outcome");
        Ok(())
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Per-variant metrics and a significance test of each treatment against control
    pub fn get_results(&self, id: &str) -> Result<ExperimentResult, DomainError> {
        debug!(experiment_id = %id, "Getting experiment results");

        let slot = self.registry.require(id)?;
        let experiment = slot.experiment();
        let tallies = slot.tallies();

        let control = experiment
            .control_variant()
            .ok_or_else(|| DomainError::internal(format!("Experiment '{}' has no variants", id)))?;
        let control_id = control.id().as_str();
        let metric = experiment.target_metric();

        let mut result =
            ExperimentResult::new(id, experiment.name(), experiment.status(), metric);

        let empty = VariantTally::default();
        let tally_of = |variant: &Variant| -> VariantTally {
            tallies.get(variant.id().as_str()).unwrap_or(&empty).clone()
        };

        for variant in experiment.variants() {
            let metrics = tally_of(variant).to_metrics(variant, variant.id().as_str() == control_id);

            result.total_samples += metrics.samples;
            result.total_assignments += metrics.assignments;
            result.variant_metrics.push(metrics);
        }

        let control_tally = tally_of(control);

        for variant in experiment.variants() {
            if variant.id().as_str() == control_id {
                continue;
            }

            let outcome = self.compare(metric, &control_tally, &tally_of(variant));

            result.comparisons.push(VariantComparison {
                control_variant_id: control_id.to_string(),
                treatment_variant_id: variant.id().to_string(),
                metric,
                outcome,
            });
        }

        if experiment.status() == ExperimentStatus::Concluded {
            Self::pick_winner(&mut result, control_id);
        }

        Ok(result)
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    fn compare(
        &self,
        metric: TargetMetric,
        control: &VariantTally,
        treatment: &VariantTally,
    ) -> ComparisonOutcome {
        let required = self.config.min_sample_size;

        if control.samples() < required || treatment.samples() < required {
            return ComparisonOutcome::InsufficientSample {
                required,
                control_samples: control.samples(),
                treatment_samples: treatment.samples(),
            };
        }

        let confidence = self.config.confidence_level;
        let significance = match metric {
            TargetMetric::SuccessRate => compare_success_rates(
                control.successes,
                control.samples(),
                treatment.successes,
                treatment.samples(),
                confidence,
            ),
            TargetMetric::LatencyMs => compare_means(&control.latency, &treatment.latency, confidence),
        };

        match significance {
            Some(sig) => ComparisonOutcome::Tested(sig),
            None => ComparisonOutcome::Degenerate,
        }
    }

    fn pick_winner(result: &mut ExperimentResult, control_id: &str) {
        let metric = result.target_metric;

        let best = result
            .comparisons
            .iter()
            .filter_map(|c| c.significance().map(|s| (c, s)))
            .filter(|(_, s)| s.treatment_is_better(metric))
            .max_by(|(_, a), (_, b)| {
                let ordering = a
                    .treatment_mean
                    .partial_cmp(&b.treatment_mean)
                    .unwrap_or(std::cmp::Ordering::Equal);

                if metric.higher_is_better() {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
            .map(|(c, s)| (c.treatment_variant_id.clone(), s.clone()));

        match best {
            Some((winner, sig)) => {
                result.recommendation = Some(Self::recommendation(&winner, metric, &sig));
                result.winner_variant_id = Some(winner);
            }
            None => {
                result.recommendation = Some(format!(
                    "No variant significantly outperformed control '{}' on {}",
                    control_id, metric
                ));
            }
        }
    }

    fn recommendation(winner: &str, metric: TargetMetric, sig: &StatisticalSignificance) -> String {
        let direction = if sig.relative_change >= 0.0 { "higher" } else { "lower" };

        format!(
            "Variant '{}' shows significant improvement ({:.1}% {} {}, p = {:.4})",
            winner,
            sig.relative_change.abs(),
            direction,
            metric,
            sig.p_value
        )
    }

    fn serving_assignment(
        experiment: &Experiment,
        subject_id: &str,
    ) -> Result<VariantAssignment, DomainError> {
        if experiment.status().is_active() {
            return Self::assign_variant(experiment, subject_id);
        }

        let control = experiment.control_variant().ok_or_else(|| {
            DomainError::internal(format!("Experiment '{}' has no variants", experiment.id()))
        })?;
        let bucket = ConsistentHasher::bucket(experiment.id().as_str(), subject_id);

        Ok(Self::assignment_for(experiment, control, subject_id, bucket))
    }

    fn count_if_active(
        slot: &ExperimentSlot,
        experiment: &Experiment,
        assignment: &VariantAssignment,
    ) -> Result<bool, DomainError> {
        if !experiment.status().is_active() {
            return Ok(false);
        }

        if !slot.update_tally(&assignment.variant_id, |t| t.record_assignment()) {
            return Err(Self::unknown_variant(
                &assignment.experiment_id,
                &assignment.variant_id,
            ));
        }

        observability::record_assignment(&assignment.experiment_id, &assignment.variant_id);
        Ok(true)
    }

    fn assignment_for(
        experiment: &Experiment,
        variant: &Variant,
        subject_id: &str,
        bucket: f64,
    ) -> VariantAssignment {
        let is_control = experiment
            .control_variant()
            .is_some_and(|c| c.id() == variant.id());

        VariantAssignment::new(
            experiment.id().as_str(),
            subject_id,
            variant.id().as_str(),
            bucket,
        )
        .with_control(is_control)
        .with_adapters(variant.adapters().map(<[AdapterRef]>::to_vec))
    }

    fn build_variant(request: CreateVariantRequest) -> Result<Variant, DomainError> {
        let variant_id = VariantId::new(&request.id)?;
        let name = request.name.unwrap_or_else(|| request.id.clone());

        let mut variant = Variant::new(variant_id, name, request.weight).with_control(request.control);

        if let Some(adapters) = request.adapters {
            variant = variant.with_adapters(adapters);
        }

        Ok(variant)
    }

    fn unknown_variant(experiment_id: &str, variant_id: &str) -> DomainError {
        warn!(experiment_id, variant_id, "Unknown variant");
        DomainError::not_found(format!(
            "Variant '{}' not found in experiment '{}'",
            variant_id, experiment_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner() -> VariantAssigner {
        VariantAssigner::new(VariantAssignerConfig::default())
    }

    fn ab_request(id: &str, metric: TargetMetric) -> CreateExperimentRequest {
        CreateExperimentRequest::new("Adapter rollout", metric)
            .with_id(id)
            .with_variant(CreateVariantRequest::new("control", 0.5).with_control())
            .with_variant(
                CreateVariantRequest::new("treatment", 0.5)
                    .with_adapters(vec![AdapterRef::new("summarize-v2", 1.0).unwrap()]),
            )
    }

    #[test]
    fn test_create_experiment() {
        let assigner = assigner();
        let id = assigner
            .create_experiment(ab_request("rollout", TargetMetric::SuccessRate))
            .unwrap();

        assert_eq!(id.as_str(), "rollout");

        let experiment = assigner.get_experiment("rollout").unwrap();
        assert_eq!(experiment.variants().len(), 2);
        assert!(experiment.status().is_active());
    }

    #[test]
    fn test_create_experiment_generates_id() {
        let assigner = assigner();
        let mut request = ab_request("unused", TargetMetric::SuccessRate);
        request.id = None;

        let id = assigner.create_experiment(request).unwrap();
        assert!(id.as_str().starts_with("exp-"));
        assert!(assigner.get_experiment(id.as_str()).is_ok());
    }

    #[test]
    fn test_weights_not_summing_to_one_are_rejected() {
        let request = CreateExperimentRequest::new("Bad split", TargetMetric::SuccessRate)
            .with_id("bad-split")
            .with_variant(CreateVariantRequest::new("a", 0.3))
            .with_variant(CreateVariantRequest::new("b", 0.3));

        let err = assigner().create_experiment(request).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_single_variant_is_rejected() {
        let request = CreateExperimentRequest::new("Solo", TargetMetric::SuccessRate)
            .with_id("solo")
            .with_variant(CreateVariantRequest::new("only", 1.0));

        let err = assigner().create_experiment(request).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_duplicate_experiment_id_conflicts() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("dup", TargetMetric::SuccessRate))
            .unwrap();

        let err = assigner
            .create_experiment(ab_request("dup", TargetMetric::SuccessRate))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn test_invalid_ids_are_rejected() {
        let err = assigner()
            .create_experiment(ab_request("Bad Id!", TargetMetric::SuccessRate))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("stable", TargetMetric::SuccessRate))
            .unwrap();

        let first = assigner.assign("stable", "user-42").unwrap();
        for _ in 0..50 {
            assert_eq!(assigner.assign("stable", "user-42").unwrap(), first);
        }
    }

    #[test]
    fn test_even_split_over_ten_thousand_subjects() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("split", TargetMetric::SuccessRate))
            .unwrap();

        let control = (0..10_000)
            .filter(|i| {
                assigner
                    .assign("split", &format!("subject-{}", i))
                    .unwrap()
                    .is_control
            })
            .count();

        let share = control as f64 / 10_000.0;
        assert!((0.47..=0.53).contains(&share), "control share was {}", share);
    }

    #[test]
    fn test_uneven_split_and_zero_weight_variant() {
        let assigner = assigner();
        let request = CreateExperimentRequest::new("Three way", TargetMetric::LatencyMs)
            .with_id("three-way")
            .with_variant(CreateVariantRequest::new("control", 0.7).with_control())
            .with_variant(CreateVariantRequest::new("canary", 0.3))
            .with_variant(CreateVariantRequest::new("off", 0.0));
        assigner.create_experiment(request).unwrap();

        let mut canary = 0;
        for i in 0..10_000 {
            let assignment = assigner.assign("three-way", &format!("s-{}", i)).unwrap();
            assert_ne!(assignment.variant_id, "off");
            if assignment.variant_id == "canary" {
                canary += 1;
            }
        }

        let share = canary as f64 / 10_000.0;
        assert!((0.27..=0.33).contains(&share), "canary share was {}", share);
    }

    #[test]
    fn test_assignment_carries_adapter_override() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("override", TargetMetric::SuccessRate))
            .unwrap();

        let treatment = (0..100)
            .map(|i| assigner.assign("override", &format!("u-{}", i)).unwrap())
            .find(|a| !a.is_control)
            .unwrap();

        assert!(treatment.overrides_adapters());
        assert_eq!(treatment.adapters.unwrap()[0].id(), "summarize-v2");
    }

    #[test]
    fn test_unknown_experiment_is_not_found() {
        let err = assigner().assign("missing", "user").unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_recorded_assignments_are_counted_while_active() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("counted", TargetMetric::SuccessRate))
            .unwrap();

        for i in 0..20 {
            let assignment = assigner.resolve("counted", &format!("u-{}", i)).unwrap();
            assigner.record_assignment(&assignment).unwrap();
        }

        let results = assigner.get_results("counted").unwrap();
        assert_eq!(results.total_assignments, 20);
    }

    #[test]
    fn test_concluded_experiment_routes_to_control() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("finished", TargetMetric::SuccessRate))
            .unwrap();
        assigner.conclude("finished").unwrap();

        for i in 0..50 {
            let assignment = assigner.resolve("finished", &format!("u-{}", i)).unwrap();
            assert!(assignment.is_control);
            assert_eq!(assignment.variant_id, "control");
            assigner.record_assignment(&assignment).unwrap();
        }

        assert_eq!(assigner.get_results("finished").unwrap().total_assignments, 0);
        assert!(assigner.conclude("finished").is_err());
    }

    #[test]
    fn test_resolve_does_not_count_until_recorded() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("deferred", TargetMetric::SuccessRate))
            .unwrap();

        let assignment = assigner.resolve("deferred", "user-7").unwrap();
        assert_eq!(assignment, assigner.assign("deferred", "user-7").unwrap());
        assert_eq!(assigner.get_results("deferred").unwrap().total_assignments, 0);

        assigner.record_assignment(&assignment).unwrap();
        assert_eq!(assigner.get_results("deferred").unwrap().total_assignments, 1);

        assigner.conclude("deferred").unwrap();
        assigner.record_assignment(&assignment).unwrap();
        assert_eq!(assigner.get_results("deferred").unwrap().total_assignments, 1);

        let after = assigner.resolve("deferred", "user-7").unwrap();
        assert!(after.is_control);
    }

    #[test]
    fn test_no_assignment_counted_after_conclude_returns() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("racing", TargetMetric::SuccessRate))
            .unwrap();

        let frozen = std::thread::scope(|scope| {
            for w in 0..4 {
                let assigner = &assigner;
                scope.spawn(move || {
                    for i in 0..2_000 {
                        let subject = format!("w{}-u{}", w, i);
                        let assignment = assigner.resolve("racing", &subject).unwrap();
                        assigner.record_assignment(&assignment).unwrap();
                        assigner
                            .record_outcome("racing", &assignment.variant_id, true, 1.0)
                            .unwrap();
                    }
                });
            }

            std::thread::sleep(std::time::Duration::from_millis(1));
            assigner.conclude("racing").unwrap();
            assigner.get_results("racing").unwrap()
        });

        let last = assigner.get_results("racing").unwrap();
        assert_eq!(last.total_assignments, frozen.total_assignments);
        assert_eq!(last.total_samples, frozen.total_samples);
    }

    #[test]
    fn test_results_report_insufficient_sample() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("small", TargetMetric::SuccessRate))
            .unwrap();

        for _ in 0..10 {
            assigner.record_outcome("small", "control", true, 10.0).unwrap();
            assigner.record_outcome("small", "treatment", false, 10.0).unwrap();
        }

        let results = assigner.get_results("small").unwrap();
        let comparison = results.get_comparison("treatment").unwrap();

        assert!(comparison.is_insufficient());
        assert_eq!(results.total_samples, 20);
        assert!(results.winner_variant_id.is_none());
    }

    #[test]
    fn test_success_rate_winner_after_conclusion() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("winner", TargetMetric::SuccessRate))
            .unwrap();

        for i in 0..100 {
            assigner.record_outcome("winner", "control", i < 60, 20.0).unwrap();
            assigner.record_outcome("winner", "treatment", i < 85, 20.0).unwrap();
        }

        let running = assigner.get_results("winner").unwrap();
        assert!(running.has_significant_result());
        assert!(running.winner_variant_id.is_none());

        assigner.conclude("winner").unwrap();
        let results = assigner.get_results("winner").unwrap();

        let control = results.get_variant_metrics("control").unwrap();
        assert!((control.success_rate - 0.6).abs() < 1e-12);
        assert!(control.is_control);

        let sig = results
            .get_comparison("treatment")
            .and_then(|c| c.significance())
            .unwrap();
        assert!(sig.is_significant);

        assert_eq!(results.winner_variant_id.as_deref(), Some("treatment"));
        assert!(results.recommendation.unwrap().contains("treatment"));
    }

    #[test]
    fn test_latency_metric_prefers_lower_mean() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("latency", TargetMetric::LatencyMs))
            .unwrap();

        for i in 0..40 {
            let jitter = if i % 2 == 0 { 0.0 } else { 10.0 };
            assigner.record_outcome("latency", "control", true, 100.0 + jitter).unwrap();
            assigner.record_outcome("latency", "treatment", true, 80.0 + jitter).unwrap();
        }

        assigner.conclude("latency").unwrap();
        let results = assigner.get_results("latency").unwrap();

        let sig = results.comparisons[0].significance().unwrap();
        assert!(sig.treatment_is_better(TargetMetric::LatencyMs));
        assert_eq!(results.winner_variant_id.as_deref(), Some("treatment"));
    }

    #[test]
    fn test_constant_outcomes_are_degenerate() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("flat", TargetMetric::LatencyMs))
            .unwrap();

        for _ in 0..40 {
            assigner.record_outcome("flat", "control", true, 50.0).unwrap();
            assigner.record_outcome("flat", "treatment", true, 50.0).unwrap();
        }

        let results = assigner.get_results("flat").unwrap();
        assert!(matches!(
            results.comparisons[0].outcome,
            ComparisonOutcome::Degenerate
        ));
    }

    #[test]
    fn test_outcome_for_unknown_variant_fails() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("known", TargetMetric::SuccessRate))
            .unwrap();

        let err = assigner.record_outcome("known", "ghost", true, 1.0).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_negative_latency_is_rejected() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("neg", TargetMetric::SuccessRate))
            .unwrap();

        let err = assigner.record_outcome("neg", "control", true, -1.0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument { .. }));
    }

    #[test]
    fn test_list_experiments() {
        let assigner = assigner();
        assigner
            .create_experiment(ab_request("first", TargetMetric::SuccessRate))
            .unwrap();
        assigner
            .create_experiment(ab_request("second", TargetMetric::SuccessRate))
            .unwrap();

        assert_eq!(assigner.list_experiments().len(), 2);
    }

    #[test]
    fn test_create_request_deserializes() {
        let request: CreateExperimentRequest = serde_json::from_str(
            r#"{
                "name": "From JSON",
                "target_metric": "latency_ms",
                "variants": [
                    {"id": "control", "weight": 0.5, "control": true},
                    {"id": "fast", "weight": 0.5, "adapters": [{"id": "speedy", "weight": 1.0}]}
                ]
            }"#,
        )
        .unwrap();

        let assigner = assigner();
        let id = assigner.create_experiment(request).unwrap();
        let experiment = assigner.get_experiment(id.as_str()).unwrap();
        assert_eq!(experiment.target_metric(), TargetMetric::LatencyMs);
        assert_eq!(experiment.variant("fast").unwrap().adapters().unwrap().len(), 1);
    }
}
