//! Experiment domain module for A/B testing adapter compositions
//!
//! Experiments bucket subjects deterministically into variants; each variant may
//! route its traffic to a different adapter set.

mod assignment;
mod entity;
mod result;
mod validation;

pub use assignment::VariantAssignment;
pub use entity::{
    Experiment, ExperimentId, ExperimentStatus, TargetMetric, Variant, VariantId,
};
pub use result::{
    ComparisonOutcome, ExperimentResult, SignificanceTest, StatisticalSignificance,
    VariantComparison, VariantMetrics,
};
pub use validation::{
    validate_experiment_id, validate_traffic_weights, validate_variant_id,
    ExperimentValidationError, MAX_ID_LENGTH,
};
