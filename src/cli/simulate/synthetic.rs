//! In-process composer and base model for synthetic workloads
//!
//! Every value is derived from SHA-256 buckets of the inputs, so a run is
//! reproducible for a given request sequence.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    AdapterRef, BaseModel, Composer, DomainError, FinishReason, Generation, GenerationParams,
};
use crate::infrastructure::experiment::ConsistentHasher;

/// A "composed" model: its canonical name and how often it answers successfully
#[derive(Debug, Clone)]
pub struct SyntheticModel {
    pub name: String,
    pub quality: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticComposer {
    compose_delay: Duration,
}

impl SyntheticComposer {
    pub fn new(compose_delay: Duration) -> Self {
        Self { compose_delay }
    }
}

#[async_trait]
impl Composer for SyntheticComposer {
    type Model = SyntheticModel;

    async fn compose(
        &self,
        base_model_id: &str,
        adapters: &[AdapterRef],
    ) -> Result<SyntheticModel, DomainError> {
        if adapters.is_empty() {
            return Ok(SyntheticModel {
                name: base_model_id.to_string(),
                quality: 0.8,
            });
        }

        tokio::time::sleep(self.compose_delay).await;

        let names: Vec<String> = adapters.iter().map(|a| a.to_string()).collect();
        let quality = adapters
            .iter()
            .map(|a| 0.7 + 0.28 * ConsistentHasher::bucket("quality", a.id()))
            .sum::<f64>()
            / adapters.len() as f64;

        Ok(SyntheticModel {
            name: format!("{}[{}]", base_model_id, names.join(",")),
            quality,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBaseModel {
    base_latency: Duration,
    vocab_size: usize,
}

impl SyntheticBaseModel {
    pub fn new(base_latency: Duration) -> Self {
        Self {
            base_latency,
            vocab_size: 8,
        }
    }
}

#[async_trait]
impl BaseModel for SyntheticBaseModel {
    type Model = SyntheticModel;

    async fn generate(
        &self,
        model: &SyntheticModel,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, DomainError> {
        let jitter = ConsistentHasher::bucket(&model.name, prompt);
        tokio::time::sleep(self.base_latency.mul_f64(0.5 + jitter)).await;

        if ConsistentHasher::bucket("outcome", &format!("{}|{}", model.name, prompt)) >= model.quality
        {
            return Err(DomainError::generation(format!(
                "{} rejected the prompt",
                model.name
            )));
        }

        // Better models produce sharper distributions
        let sharpness = (model.quality * 10.0) as f32;
        let logits: Vec<f32> = (0..self.vocab_size)
            .map(|i| {
                ConsistentHasher::bucket(&format!("{}#{}", model.name, i), prompt) as f32
                    * sharpness
            })
            .collect();

        let token = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or_default();

        let finish_reason = match params.max_tokens {
            Some(0) => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(Generation::new(format!("{} -> token-{}", prompt, token), logits)
            .with_finish_reason(finish_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_composition_is_deterministic() {
        let composer = SyntheticComposer::new(Duration::ZERO);
        let adapters = vec![AdapterRef::new("legal", 0.5).unwrap()];

        let a = composer.compose("llama", &adapters).await.unwrap();
        let b = composer.compose("llama", &adapters).await.unwrap();

        assert_eq!(a.name, "llama[legal@0.5]");
        assert_eq!(a.quality, b.quality);
        assert!((0.7..0.98).contains(&a.quality));
    }

    #[tokio::test]
    async fn test_generation_is_reproducible() {
        let base = SyntheticBaseModel::new(Duration::ZERO);
        let model = SyntheticModel {
            name: "llama".to_string(),
            quality: 1.0,
        };

        let first = base
            .generate(&model, "hello", &GenerationParams::new())
            .await
            .unwrap();
        let second = base
            .generate(&model, "hello", &GenerationParams::new())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.logits.len(), 8);
    }

    #[tokio::test]
    async fn test_zero_quality_always_fails() {
        let base = SyntheticBaseModel::new(Duration::ZERO);
        let model = SyntheticModel {
            name: "broken".to_string(),
            quality: 0.0,
        };

        let result = base.generate(&model, "hello", &GenerationParams::new()).await;
        assert!(matches!(result, Err(DomainError::Generation { .. })));
    }
}
