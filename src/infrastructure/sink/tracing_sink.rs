//! Sink that writes snapshots to the log

use async_trait::async_trait;
use tracing::info;

use crate::domain::experiment::ExperimentResult;
use crate::domain::metrics::AdapterStats;
use crate::domain::{DomainError, StatsSink};

/// Emits one `info!` event per snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl StatsSink for TracingSink {
    async fn export_adapter_stats(&self, stats: &[AdapterStats]) -> Result<(), DomainError> {
        for s in stats {
            info!(
                adapter_id = %s.adapter_id,
                requests = s.request_count,
                successes = s.success_count,
                success_rate = s.success_rate,
                p50_ms = s.latency.p50_ms,
                p95_ms = s.latency.p95_ms,
                p99_ms = s.latency.p99_ms,
                tenants = s.tenant_requests.len(),
                "Adapter stats"
            );
        }
        Ok(())
    }

    async fn export_experiment_result(
        &self,
        result: &ExperimentResult,
    ) -> Result<(), DomainError> {
        info!(
            experiment_id = %result.experiment_id,
            status = %result.status,
            total_assignments = result.total_assignments,
            total_samples = result.total_samples,
            significant = result.has_significant_result(),
            winner = result.winner_variant_id.as_deref(),
            "Experiment result"
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{ExperimentStatus, TargetMetric};

    #[tokio::test]
    async fn test_tracing_sink_accepts_snapshots() {
        let sink = TracingSink;
        let result = ExperimentResult::new(
            "exp-1",
            "demo",
            ExperimentStatus::Concluded,
            TargetMetric::LatencyMs,
        );

        assert!(sink.export_adapter_stats(&[]).await.is_ok());
        assert!(sink.export_experiment_result(&result).await.is_ok());
        assert_eq!(sink.sink_name(), "tracing");
    }
}
