//! Composer collaborator supplied by the adapter-loading subsystem

use std::fmt::Debug;

use async_trait::async_trait;

use super::adapter::AdapterRef;
use crate::domain::DomainError;

/// Merges a base model with an ordered, weighted adapter set.
///
/// Implementations must be deterministic for a given input and free of side effects
/// visible to the caller. An empty adapter slice must yield the unmodified base model.
#[async_trait]
pub trait Composer: Send + Sync + Debug + 'static {
    /// Handle to a composed model, shared by every request that uses it
    type Model: Send + Sync + 'static;

    /// Compose `adapters` (in canonical order) onto `base_model_id`
    async fn compose(
        &self,
        base_model_id: &str,
        adapters: &[AdapterRef],
    ) -> Result<Self::Model, DomainError>;
}
