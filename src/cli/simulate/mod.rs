//! Simulate command - drive a synthetic workload through the serving core

mod synthetic;

pub use synthetic::{SyntheticBaseModel, SyntheticComposer, SyntheticModel};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::experiment::{ExperimentResult, TargetMetric};
use crate::domain::{AdapterRef, AdapterStats, UncertainExample};
use crate::infrastructure::composition::{CacheStats, CompositionCache};
use crate::infrastructure::metrics::MetricsAggregator;
use crate::infrastructure::observability::init_metrics;
use crate::infrastructure::services::{
    CreateExperimentRequest, CreateVariantRequest, InferenceRequest, RequestOrchestrator,
    VariantAssigner,
};
use crate::infrastructure::sink::{JsonLinesSink, TracingSink};

const ADAPTER_POOL: [&str; 6] = ["legal", "medical", "finance", "support", "code", "summarize"];
const EXPERIMENT_ID: &str = "exp-tone-rollout";

/// Arguments for the simulate command
#[derive(Args, Clone)]
pub struct SimulateArgs {
    /// Number of requests to send
    #[arg(long, default_value_t = 500)]
    pub requests: usize,

    /// Requests in flight at once
    #[arg(long, default_value_t = 16)]
    pub concurrency: usize,

    /// Distinct tenant tags
    #[arg(long, default_value_t = 8)]
    pub tenants: usize,

    /// Base model id
    #[arg(long, default_value = "base-7b")]
    pub base_model: String,

    /// Cache capacity (overrides config)
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Simulated composition time in milliseconds
    #[arg(long, default_value_t = 20)]
    pub compose_ms: u64,

    /// Simulated generation time in milliseconds
    #[arg(long, default_value_t = 5)]
    pub generate_ms: u64,

    /// Skip the built-in tone rollout experiment
    #[arg(long)]
    pub no_experiment: bool,

    /// Ranking metric for the adapter leaderboard
    #[arg(long, default_value = "success_rate")]
    pub rank_by: String,

    /// Adapters shown in the leaderboard
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Append adapter stats and experiment results to this JSON-lines file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Print the Prometheus exposition after the report
    #[arg(long)]
    pub prometheus: bool,
}

#[derive(Serialize)]
struct SimulationReport {
    requests: usize,
    succeeded: usize,
    failed: usize,
    cache: CacheStats,
    top_adapters: Vec<AdapterStats>,
    experiments: Vec<ExperimentResult>,
    uncertain: Vec<UncertainExample>,
}

/// Run the simulate command
pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let metrics = init_metrics(&config.observability.metrics);

    let orchestrator = Arc::new(build_orchestrator(&config, &args));
    let sweeper = orchestrator.cache().spawn_sweeper();

    if !args.no_experiment {
        create_tone_rollout(orchestrator.assigner())?;
    }

    info!(
        requests = args.requests,
        concurrency = args.concurrency,
        "Starting synthetic workload"
    );

    let outcomes: Vec<bool> = stream::iter(workload(&args))
        .map(|request| {
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.handle(request).await.is_ok() }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let succeeded = outcomes.iter().filter(|ok| **ok).count();

    if !args.no_experiment {
        orchestrator.assigner().conclude(EXPERIMENT_ID)?;
    }

    let experiments = orchestrator
        .assigner()
        .list_experiments()
        .iter()
        .map(|e| orchestrator.assigner().get_results(e.id().as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let report = SimulationReport {
        requests: outcomes.len(),
        succeeded,
        failed: outcomes.len() - succeeded,
        cache: orchestrator.cache().stats(),
        top_adapters: orchestrator
            .metrics()
            .get_top_adapters_by_name(&args.rank_by, args.top)?,
        experiments,
        uncertain: config
            .selector
            .to_selector()
            .select_from_buffer(orchestrator.buffer())?,
    };

    match &args.export {
        Some(path) => {
            orchestrator.export_to(&JsonLinesSink::new(path)).await?;
        }
        None => {
            if let Err(e) = orchestrator.export_to(&TracingSink).await {
                warn!(error = %e, "Export to log failed");
            }
        }
    }

    sweeper.abort();

    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.prometheus {
        match metrics {
            Some(metrics) => println!("{}", metrics.render()),
            None => warn!("Prometheus recorder is disabled in configuration"),
        }
    }

    Ok(())
}

fn build_orchestrator(
    config: &AppConfig,
    args: &SimulateArgs,
) -> RequestOrchestrator<SyntheticComposer, SyntheticBaseModel> {
    let mut cache_config = config.cache.to_cache_config();
    if let Some(capacity) = args.cache_capacity {
        cache_config = cache_config.with_capacity(capacity);
    }

    RequestOrchestrator::new(
        Arc::new(CompositionCache::new(
            Arc::new(SyntheticComposer::new(Duration::from_millis(args.compose_ms))),
            cache_config,
        )),
        Arc::new(SyntheticBaseModel::new(Duration::from_millis(args.generate_ms))),
        Arc::new(VariantAssigner::new(config.experiments.to_assigner_config())),
        Arc::new(MetricsAggregator::new(config.metrics.to_aggregator_config())),
        Arc::new(config.selector.to_buffer()),
    )
}

fn create_tone_rollout(assigner: &VariantAssigner) -> anyhow::Result<()> {
    let tone = |id: &str| -> anyhow::Result<Vec<AdapterRef>> { Ok(vec![AdapterRef::new(id, 1.0)?]) };

    assigner.create_experiment(
        CreateExperimentRequest::new("Tone adapter rollout", TargetMetric::SuccessRate)
            .with_id(EXPERIMENT_ID)
            .with_description("tone-v2 against tone-v1 on every third request")
            .with_variant(
                CreateVariantRequest::new("control", 0.5)
                    .with_name("tone-v1")
                    .with_control()
                    .with_adapters(tone("tone-v1")?),
            )
            .with_variant(
                CreateVariantRequest::new("treatment", 0.5)
                    .with_name("tone-v2")
                    .with_adapters(tone("tone-v2")?),
            ),
    )?;

    Ok(())
}

/// Deterministic request mix: mostly one or two pool adapters, every third request
/// through the experiment, every tenth on the bare base model
fn workload(args: &SimulateArgs) -> Vec<InferenceRequest> {
    let tenants = args.tenants.max(1);

    (0..args.requests)
        .map(|i| {
            let tenant = format!("tenant-{}", i % tenants);
            let request =
                InferenceRequest::new(tenant, args.base_model.as_str(), format!("prompt {}", i));

            if i % 10 == 9 {
                return request;
            }

            if !args.no_experiment && i % 3 == 0 {
                return request
                    .with_subject(format!("user-{}", i % 97))
                    .with_experiment(EXPERIMENT_ID);
            }

            let primary = ADAPTER_POOL[i % ADAPTER_POOL.len()];
            let mut adapters = vec![AdapterRef::new(primary, 1.0)];

            if i % 4 == 1 {
                let secondary = ADAPTER_POOL[(i / 4) % ADAPTER_POOL.len()];
                if secondary != primary {
                    adapters.push(AdapterRef::new(secondary, 0.5));
                }
            }

            match adapters.into_iter().collect::<Result<Vec<_>, _>>() {
                Ok(adapters) => request.with_adapters(adapters),
                Err(_) => request,
            }
        })
        .collect()
}
