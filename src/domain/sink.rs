//! Export sink for telemetry snapshots

use async_trait::async_trait;

use super::experiment::ExperimentResult;
use super::metrics::AdapterStats;
use super::DomainError;

/// Receives snapshots for durable storage elsewhere.
///
/// The serving core never persists anything itself; an exporter hands snapshots
/// to a sink on whatever cadence the embedding service chooses.
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// Export a batch of adapter statistics
    async fn export_adapter_stats(&self, stats: &[AdapterStats]) -> Result<(), DomainError>;

    /// Export the current results of one experiment
    async fn export_experiment_result(&self, result: &ExperimentResult)
    -> Result<(), DomainError>;

    /// Name used in logs
    fn sink_name(&self) -> &'static str;
}
