//! Experiment assignment types for routing requests to variants

use serde::{Deserialize, Serialize};

use crate::domain::composition::AdapterRef;

/// Result of assigning a subject to an experiment variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAssignment {
    /// ID of the experiment
    pub experiment_id: String,
    /// Subject (user, tenant, session) being bucketed
    pub subject_id: String,
    /// ID of the assigned variant
    pub variant_id: String,
    /// Whether the assigned variant is the control
    pub is_control: bool,
    /// Point in `[0, 1)` the subject hashed to
    pub bucket: f64,
    /// Adapter set the variant routes to, if it overrides the request's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapters: Option<Vec<AdapterRef>>,
}

impl VariantAssignment {
    /// Create a new assignment
    pub fn new(
        experiment_id: impl Into<String>,
        subject_id: impl Into<String>,
        variant_id: impl Into<String>,
        bucket: f64,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            subject_id: subject_id.into(),
            variant_id: variant_id.into(),
            is_control: false,
            bucket,
            adapters: None,
        }
    }

    pub fn with_control(mut self, is_control: bool) -> Self {
        self.is_control = is_control;
        self
    }

    pub fn with_adapters(mut self, adapters: Option<Vec<AdapterRef>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Check if this assignment replaces the request's adapters
    pub fn overrides_adapters(&self) -> bool {
        self.adapters.is_some()
    }
}
