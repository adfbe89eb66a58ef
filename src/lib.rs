//! Adapter Serving Core
//!
//! Request-path building blocks for serving many weighted adapter sets on a shared
//! base model:
//! - Composition cache with single-flight builds, LRU + TTL eviction and leases
//! - Per-adapter request metrics and rankings
//! - Deterministic experiment assignment with significance testing
//! - Uncertainty-based selection of generations for review
//! - A request orchestrator tying them together

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    AdapterRef, BaseModel, Composer, CompositionKey, DomainError, Generation, GenerationParams,
    StatsSink, UncertaintyMethod,
};
pub use infrastructure::composition::{CompositionCache, CompositionCacheConfig, CompositionLease};
pub use infrastructure::metrics::{MetricsAggregator, MetricsAggregatorConfig};
pub use infrastructure::services::{
    InferenceRequest, InferenceResponse, RequestOrchestrator, VariantAssigner,
    VariantAssignerConfig,
};
pub use infrastructure::uncertainty::{UncertaintyBuffer, UncertaintySelector};
