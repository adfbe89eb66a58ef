//! Experiment domain entities

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    validate_experiment_id, validate_traffic_weights, validate_variant_id,
    ExperimentValidationError,
};
use crate::domain::composition::AdapterRef;

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Create a new experiment ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_experiment_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random experiment ID
    pub fn generate() -> Self {
        Self(format!("exp-{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for String {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VariantId
// ============================================================================

/// Unique identifier for a variant within an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantId(String);

impl VariantId {
    /// Create a new variant ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_variant_id(&id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariantId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantId> for String {
    fn from(id: VariantId) -> Self {
        id.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ExperimentStatus
// ============================================================================

/// Status of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Experiment is routing traffic to its variants
    #[default]
    Active,
    /// Experiment has finished; traffic goes to the control variant
    Concluded,
}

impl ExperimentStatus {
    /// Check if the experiment is currently running
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if a transition to the target status is valid
    pub fn can_transition_to(&self, target: ExperimentStatus) -> bool {
        matches!((self, target), (Self::Active, Self::Concluded))
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Concluded => write!(f, "concluded"),
        }
    }
}

// ============================================================================
// TargetMetric
// ============================================================================

/// Metric an experiment is judged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    /// Fraction of successful requests (proportion test)
    SuccessRate,
    /// Mean request latency in milliseconds (Welch's t-test)
    LatencyMs,
}

impl TargetMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::LatencyMs => "latency_ms",
        }
    }

    /// Whether a larger value of the metric is an improvement
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Self::SuccessRate)
    }
}

impl FromStr for TargetMetric {
    type Err = ExperimentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success_rate" => Ok(Self::SuccessRate),
            "latency_ms" | "latency" => Ok(Self::LatencyMs),
            other => Err(ExperimentValidationError::UnknownTargetMetric(
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Variant
// ============================================================================

/// One arm of an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    name: String,
    weight: f64,
    control: bool,
    /// Replaces the request's adapter set when present
    #[serde(skip_serializing_if = "Option::is_none")]
    adapters: Option<Vec<AdapterRef>>,
}

impl Variant {
    /// Create a new variant with the given traffic weight
    pub fn new(id: VariantId, name: impl Into<String>, weight: f64) -> Self {
        Self {
            id,
            name: name.into(),
            weight,
            control: false,
            adapters: None,
        }
    }

    /// Set whether this is the control variant
    pub fn with_control(mut self, control: bool) -> Self {
        self.control = control;
        self
    }

    /// Route subjects in this variant to a specific adapter set
    pub fn with_adapters(mut self, adapters: Vec<AdapterRef>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn id(&self) -> &VariantId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_control(&self) -> bool {
        self.control
    }

    pub fn adapters(&self) -> Option<&[AdapterRef]> {
        self.adapters.as_deref()
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// An A/B experiment over adapter compositions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    id: ExperimentId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: ExperimentStatus,
    target_metric: TargetMetric,
    variants: Vec<Variant>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concluded_at: Option<DateTime<Utc>>,
}

impl Experiment {
    /// Create a new active experiment with no variants
    pub fn new(id: ExperimentId, name: impl Into<String>, target_metric: TargetMetric) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            status: ExperimentStatus::Active,
            target_metric,
            variants: Vec::new(),
            created_at: Utc::now(),
            concluded_at: None,
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a variant; variant order defines the bucketing order
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    // Getters

    pub fn id(&self) -> &ExperimentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn target_metric(&self) -> TargetMetric {
        self.target_metric
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn concluded_at(&self) -> Option<DateTime<Utc>> {
        self.concluded_at
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id().as_str() == id)
    }

    /// The control variant: the one flagged as control, otherwise the first
    pub fn control_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.is_control())
            .or_else(|| self.variants.first())
    }

    // Validation

    /// Check structural invariants; `tolerance` bounds the traffic-sum error
    pub fn validate(&self, tolerance: f64) -> Result<(), ExperimentValidationError> {
        if self.variants.len() < 2 {
            return Err(ExperimentValidationError::InsufficientVariants);
        }

        let mut seen = HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant.id().as_str()) {
                return Err(ExperimentValidationError::DuplicateVariantId(
                    variant.id().to_string(),
                ));
            }

            if let Some(adapters) = variant.adapters() {
                let mut adapter_ids = HashSet::new();
                for adapter in adapters {
                    if let Err(e) = adapter.validate() {
                        return Err(ExperimentValidationError::InvalidAdapterOverride(
                            variant.id().to_string(),
                            e.to_string(),
                        ));
                    }
                    if !adapter_ids.insert(adapter.id()) {
                        return Err(ExperimentValidationError::InvalidAdapterOverride(
                            variant.id().to_string(),
                            format!("adapter '{}' appears more than once", adapter.id()),
                        ));
                    }
                }
            }
        }

        let controls = self.variants.iter().filter(|v| v.is_control()).count();
        if controls > 1 {
            return Err(ExperimentValidationError::MultipleControls(controls));
        }

        validate_traffic_weights(
            self.variants.iter().map(|v| (v.id().as_str(), v.weight())),
            tolerance,
        )
    }

    // Status transitions

    /// Conclude the experiment
    pub fn conclude(&mut self) -> Result<(), ExperimentValidationError> {
        if !self.status.can_transition_to(ExperimentStatus::Concluded) {
            return Err(ExperimentValidationError::InvalidStatusTransition(
                self.status.to_string(),
                ExperimentStatus::Concluded.to_string(),
            ));
        }
        self.status = ExperimentStatus::Concluded;
        self.concluded_at = Some(Utc::now());
        Ok(())
    }

    // Assignment

    /// Map a point in `[0, 1)` onto the cumulative traffic ranges, in variant order
    pub fn variant_for_point(&self, point: f64) -> Option<&Variant> {
        let mut cumulative = 0.0;

        for variant in &self.variants {
            cumulative += variant.weight();

            if point < cumulative {
                return Some(variant);
            }
        }

        // Rounding can leave the top of the range uncovered; it belongs to the
        // last variant that receives traffic.
        self.variants.iter().rev().find(|v| v.weight() > 0.0)
    }
}
