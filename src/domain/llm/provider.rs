use async_trait::async_trait;

use super::{Generation, GenerationParams};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// The shared base model that runs generation on a composed model handle
#[cfg_attr(test, automock(type Model = String;))]
#[async_trait]
pub trait BaseModel: Send + Sync {
    /// Composed-model handle type produced by the matching composer
    type Model: Send + Sync + 'static;

    /// Run generation for `prompt` on an already composed model
    async fn generate(
        &self,
        model: &Self::Model,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, DomainError>;
}
