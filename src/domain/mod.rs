//! Domain layer - Core entities, collaborator contracts and errors

pub mod composition;
pub mod error;
pub mod experiment;
pub mod llm;
pub mod metrics;
pub mod sink;
pub mod uncertainty;

pub use composition::{AdapterRef, Composer, CompositionKey};
pub use error::DomainError;
pub use llm::{BaseModel, FinishReason, Generation, GenerationParams};
pub use metrics::{AdapterStats, LatencyStats, RankingMetric};
pub use sink::StatsSink;
pub use uncertainty::{Candidate, UncertainExample, UncertaintyMethod};
