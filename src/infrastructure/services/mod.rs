//! Infrastructure services

mod orchestrator;
mod variant_assigner;

pub use orchestrator::{ExportSummary, InferenceRequest, InferenceResponse, RequestOrchestrator};
pub use variant_assigner::{
    CreateExperimentRequest, CreateVariantRequest, VariantAssigner, VariantAssignerConfig,
};
