//! Adapter references as they appear in inference requests

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Maximum length for adapter identifiers
pub const MAX_ADAPTER_ID_LENGTH: usize = 128;

/// A weighted reference to a single adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRef {
    id: String,
    weight: f64,
}

impl AdapterRef {
    /// Create a new adapter reference, rejecting empty ids and non-finite weights
    pub fn new(id: impl Into<String>, weight: f64) -> Result<Self, DomainError> {
        let id = id.into();

        if id.trim().is_empty() {
            return Err(DomainError::validation("Adapter ID cannot be empty"));
        }

        if id.len() > MAX_ADAPTER_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "Adapter ID exceeds maximum length of {} characters",
                MAX_ADAPTER_ID_LENGTH
            )));
        }

        if !weight.is_finite() {
            return Err(DomainError::validation(format!(
                "Adapter '{}' has a non-finite weight",
                id
            )));
        }

        // -0.0 and 0.0 must produce the same composition key
        let weight = if weight == 0.0 { 0.0 } else { weight };

        Ok(Self { id, weight })
    }

    /// Get the adapter ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the adapter weight
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Re-check invariants on a value that bypassed `new` (e.g. deserialized input)
    pub fn validate(&self) -> Result<(), DomainError> {
        Self::new(self.id.clone(), self.weight).map(|_| ())
    }

    pub(crate) fn canonical_weight(&self) -> String {
        // Debug formatting of f64 is shortest round-trip exact
        format!("{:?}", self.weight)
    }
}

impl fmt::Display for AdapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.weight)
    }
}
