//! Experiment validation utilities

use thiserror::Error;

use crate::domain::DomainError;

/// Maximum length for experiment and variant IDs
pub const MAX_ID_LENGTH: usize = 50;

/// Validation errors for experiments and variants
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExperimentValidationError {
    #[error("{0} ID cannot be empty")]
    EmptyId(&'static str),

    #[error("{0} ID exceeds maximum length of {1} characters")]
    IdTooLong(&'static str, usize),

    #[error("{0} ID must start and end with a letter or number")]
    InvalidIdBoundary(&'static str),

    #[error("{0} ID contains invalid character: '{1}'")]
    InvalidIdCharacter(&'static str, char),

    #[error("{0} ID cannot contain consecutive hyphens")]
    ConsecutiveHyphens(&'static str),

    #[error("Experiment must have at least 2 variants")]
    InsufficientVariants,

    #[error("Duplicate variant ID: '{0}'")]
    DuplicateVariantId(String),

    #[error("Variant '{0}' has an invalid traffic weight {1} (must be within [0, 1])")]
    InvalidWeight(String, f64),

    #[error("Traffic weights must sum to 1.0, got {0}")]
    InvalidTrafficSum(f64),

    #[error("Only one variant can be the control, found {0}")]
    MultipleControls(usize),

    #[error("Unknown target metric: '{0}'")]
    UnknownTargetMetric(String),

    #[error("Invalid experiment status transition from {0} to {1}")]
    InvalidStatusTransition(String, String),

    #[error("Variant '{0}' adapter override is invalid: {1}")]
    InvalidAdapterOverride(String, String),
}

impl From<ExperimentValidationError> for DomainError {
    fn from(error: ExperimentValidationError) -> Self {
        DomainError::validation(error.to_string())
    }
}

/// Validate an experiment ID
pub fn validate_experiment_id(id: &str) -> Result<(), ExperimentValidationError> {
    validate_identifier("Experiment", id)
}

/// Validate a variant ID
pub fn validate_variant_id(id: &str) -> Result<(), ExperimentValidationError> {
    validate_identifier("Variant", id)
}

/// Check that traffic weights are each in `[0, 1]` and sum to 1.0 within `tolerance`
pub fn validate_traffic_weights<'a>(
    weights: impl IntoIterator<Item = (&'a str, f64)>,
    tolerance: f64,
) -> Result<(), ExperimentValidationError> {
    let mut total = 0.0;

    for (variant_id, weight) in weights {
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(ExperimentValidationError::InvalidWeight(
                variant_id.to_string(),
                weight,
            ));
        }
        total += weight;
    }

    if (total - 1.0).abs() > tolerance {
        return Err(ExperimentValidationError::InvalidTrafficSum(total));
    }

    Ok(())
}

fn validate_identifier(kind: &'static str, id: &str) -> Result<(), ExperimentValidationError> {
    if id.is_empty() {
        return Err(ExperimentValidationError::EmptyId(kind));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ExperimentValidationError::IdTooLong(kind, MAX_ID_LENGTH));
    }

    if id.starts_with('-') || id.ends_with('-') {
        return Err(ExperimentValidationError::InvalidIdBoundary(kind));
    }

    let mut prev_was_hyphen = false;

    for ch in id.chars() {
        if ch == '-' {
            if prev_was_hyphen {
                return Err(ExperimentValidationError::ConsecutiveHyphens(kind));
            }
            prev_was_hyphen = true;
        } else if ch.is_ascii_alphanumeric() {
            prev_was_hyphen = false;
        } else {
            return Err(ExperimentValidationError::InvalidIdCharacter(kind, ch));
        }
    }

    Ok(())
}
