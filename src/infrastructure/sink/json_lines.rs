//! Append-only JSON-lines file sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::experiment::ExperimentResult;
use crate::domain::metrics::AdapterStats;
use crate::domain::{DomainError, StatsSink};

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    AdapterStats {
        exported_at: DateTime<Utc>,
        #[serde(flatten)]
        stats: &'a AdapterStats,
    },
    ExperimentResult {
        exported_at: DateTime<Utc>,
        #[serde(flatten)]
        result: &'a ExperimentResult,
    },
}

/// Writes one JSON object per line, tagged with a `record` field
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, records: &[Record<'_>]) -> Result<(), DomainError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(|e| {
                DomainError::internal(format!("Failed to serialize export record: {}", e))
            })?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        file.write_all(&buf).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), records = records.len(), "Appended export records");
        Ok(())
    }

    fn io_error(&self, e: std::io::Error) -> DomainError {
        DomainError::internal(format!(
            "Failed to write export file '{}': {}",
            self.path.display(),
            e
        ))
    }
}

#[async_trait]
impl StatsSink for JsonLinesSink {
    async fn export_adapter_stats(&self, stats: &[AdapterStats]) -> Result<(), DomainError> {
        let exported_at = Utc::now();
        let records: Vec<Record<'_>> = stats
            .iter()
            .map(|stats| Record::AdapterStats { exported_at, stats })
            .collect();

        self.append(&records).await
    }

    async fn export_experiment_result(
        &self,
        result: &ExperimentResult,
    ) -> Result<(), DomainError> {
        self.append(&[Record::ExperimentResult {
            exported_at: Utc::now(),
            result,
        }])
        .await
    }

    fn sink_name(&self) -> &'static str {
        "json_lines"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{ExperimentStatus, TargetMetric};
    use crate::domain::LatencyStats;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("adapter-serving-{}.jsonl", uuid::Uuid::new_v4()))
    }

    fn stats(id: &str) -> AdapterStats {
        AdapterStats {
            adapter_id: id.to_string(),
            request_count: 4,
            success_count: 3,
            success_rate: 0.75,
            latency: LatencyStats::from_samples(vec![10, 20, 30]),
            tenant_requests: Default::default(),
            last_updated: Utc::now(),
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_appends_adapter_stats() {
        let path = temp_path();
        let sink = JsonLinesSink::new(&path);

        sink.export_adapter_stats(&[stats("legal"), stats("tone")])
            .await
            .unwrap();
        sink.export_adapter_stats(&[stats("legal")]).await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["record"], "adapter_stats");
        assert_eq!(lines[0]["adapter_id"], "legal");
        assert_eq!(lines[1]["adapter_id"], "tone");
        assert_eq!(lines[2]["request_count"], 4);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_appends_experiment_result() {
        let path = temp_path();
        let sink = JsonLinesSink::new(&path);

        let result = ExperimentResult::new(
            "exp-1",
            "tone rollout",
            ExperimentStatus::Active,
            TargetMetric::SuccessRate,
        );
        sink.export_experiment_result(&result).await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["record"], "experiment_result");
        assert_eq!(lines[0]["experiment_id"], "exp-1");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_empty_batch_creates_nothing() {
        let path = temp_path();
        let sink = JsonLinesSink::new(&path);

        sink.export_adapter_stats(&[]).await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_path_is_internal_error() {
        let path = std::env::temp_dir()
            .join(format!("missing-{}", uuid::Uuid::new_v4()))
            .join("out.jsonl");
        let sink = JsonLinesSink::new(path);

        let err = sink.export_adapter_stats(&[stats("legal")]).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal { .. }));
    }
}
