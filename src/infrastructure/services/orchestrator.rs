//! Request orchestrator: one inference call from variant routing to metrics

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::variant_assigner::VariantAssigner;
use crate::domain::experiment::VariantAssignment;
use crate::domain::{
    AdapterRef, BaseModel, Composer, CompositionKey, DomainError, FinishReason, GenerationParams,
    StatsSink,
};
use crate::infrastructure::composition::{CompositionCache, LeaseOrigin};
use crate::infrastructure::metrics::MetricsAggregator;
use crate::infrastructure::observability;
use crate::infrastructure::uncertainty::UncertaintyBuffer;

/// Inbound inference call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Tenant tag used for per-adapter breakdowns
    pub tenant: String,
    /// Subject bucketed by the experiment; defaults to the tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub base_model_id: String,
    #[serde(default)]
    pub adapters: Vec<AdapterRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub params: GenerationParams,
}

impl InferenceRequest {
    pub fn new(
        tenant: impl Into<String>,
        base_model_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            subject_id: None,
            base_model_id: base_model_id.into(),
            adapters: Vec::new(),
            experiment_id: None,
            prompt: prompt.into(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_adapter(mut self, adapter: AdapterRef) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_adapters(mut self, adapters: Vec<AdapterRef>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_experiment(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    fn subject(&self) -> &str {
        self.subject_id.as_deref().unwrap_or(&self.tenant)
    }
}

/// Result of a served inference call
#[derive(Debug, Clone, Serialize)]
pub struct InferenceResponse {
    pub output: String,
    pub logits: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Canonical form of the composition that served the call
    pub composition: String,
    pub composition_digest: String,
    pub cache_origin: LeaseOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<VariantAssignment>,
    /// Time spent in the base model
    pub latency_ms: u64,
}

/// Counts of what an export pushed to a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub adapters: usize,
    pub experiments: usize,
}

/// Coordinates the serving components for each inference call.
///
/// Components are constructed by the caller and injected; the orchestrator holds no
/// state of its own beyond the shared handles.
pub struct RequestOrchestrator<C, B>
where
    C: Composer,
    B: BaseModel<Model = C::Model>,
{
    cache: Arc<CompositionCache<C>>,
    base_model: Arc<B>,
    assigner: Arc<VariantAssigner>,
    metrics: Arc<MetricsAggregator>,
    buffer: Arc<UncertaintyBuffer>,
}

impl<C, B> RequestOrchestrator<C, B>
where
    C: Composer,
    B: BaseModel<Model = C::Model>,
{
    pub fn new(
        cache: Arc<CompositionCache<C>>,
        base_model: Arc<B>,
        assigner: Arc<VariantAssigner>,
        metrics: Arc<MetricsAggregator>,
        buffer: Arc<UncertaintyBuffer>,
    ) -> Self {
        Self {
            cache,
            base_model,
            assigner,
            metrics,
            buffer,
        }
    }

    pub fn cache(&self) -> &Arc<CompositionCache<C>> {
        &self.cache
    }

    pub fn assigner(&self) -> &Arc<VariantAssigner> {
        &self.assigner
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    pub fn buffer(&self) -> &Arc<UncertaintyBuffer> {
        &self.buffer
    }

    /// Serve one inference call.
    ///
    /// Routing and key validation errors surface before any composition or generation
    /// work, and before the experiment assignment is counted. Composition errors are returned as-is and only counted in Prometheus.
    /// Generation outcomes are recorded against every adapter in the served set and
    /// against the experiment variant, if any.
    #[instrument(
        skip(self, request),
        fields(tenant = %request.tenant, base_model = %request.base_model_id)
    )]
    pub async fn handle(&self, request: InferenceRequest) -> Result<InferenceResponse, DomainError> {
        let assignment = match request.experiment_id.as_deref() {
            Some(experiment_id) => Some(self.assigner.resolve(experiment_id, request.subject())?),
            None => None,
        };

        let adapters = match assignment.as_ref().and_then(|a| a.adapters.clone()) {
            Some(overridden) => overridden,
            None => request.adapters.clone(),
        };

        let key = CompositionKey::new(request.base_model_id.as_str(), adapters)?;

        if let Some(assignment) = &assignment {
            self.assigner.record_assignment(assignment)?;
        }

        let lease = match self.cache.get_or_build(&key).await {
            Ok(lease) => lease,
            Err(e) => {
                observability::record_composition_error(e.kind());
                warn!(key = %key, error = %e, "Composition failed");
                return Err(e);
            }
        };
        let origin = lease.origin();

        let started = Instant::now();
        let generated = self
            .base_model
            .generate(lease.model(), &request.prompt, &request.params)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        self.cache.release(lease);

        let success = generated.is_ok();

        for adapter in key.adapters() {
            self.metrics
                .record_request(adapter.id(), &request.tenant, latency_ms, success);
        }

        if let Some(assignment) = &assignment {
            if let Err(e) = self.assigner.record_outcome(
                &assignment.experiment_id,
                &assignment.variant_id,
                success,
                latency_ms as f64,
            ) {
                warn!(
                    experiment_id = %assignment.experiment_id,
                    variant_id = %assignment.variant_id,
                    error = %e,
                    "Failed to record experiment outcome"
                );
            }
        }

        let generation = generated.map_err(|e| match e {
            DomainError::Generation { .. } => e,
            other => DomainError::generation(other.to_string()),
        })?;

        self.buffer.push(
            request.prompt.as_str(),
            generation.output.as_str(),
            generation.logits.clone(),
        );

        debug!(
            key = %key,
            origin = origin.as_str(),
            latency_ms,
            variant_id = assignment.as_ref().map(|a| a.variant_id.as_str()),
            "Served inference request"
        );

        Ok(InferenceResponse {
            output: generation.output,
            logits: generation.logits,
            finish_reason: generation.finish_reason,
            composition: key.to_string(),
            composition_digest: key.digest().to_string(),
            cache_origin: origin,
            assignment,
            latency_ms,
        })
    }

    /// Push the current adapter statistics and every experiment's results to `sink`
    pub async fn export_to(&self, sink: &dyn StatsSink) -> Result<ExportSummary, DomainError> {
        let stats = self.metrics.all_adapter_metrics();
        sink.export_adapter_stats(&stats).await?;

        let mut summary = ExportSummary {
            adapters: stats.len(),
            experiments: 0,
        };

        for experiment in self.assigner.list_experiments() {
            let result = self.assigner.get_results(experiment.id().as_str())?;
            sink.export_experiment_result(&result).await?;
            summary.experiments += 1;
        }

        info!(
            sink = sink.sink_name(),
            adapters = summary.adapters,
            experiments = summary.experiments,
            "Exported serving statistics"
        );

        Ok(summary)
    }
}

impl<C, B> fmt::Debug for RequestOrchestrator<C, B>
where
    C: Composer,
    B: BaseModel<Model = C::Model>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("cache", &self.cache)
            .field("experiments", &self.assigner.list_experiments().len())
            .field("adapters", &self.metrics.adapter_count())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
