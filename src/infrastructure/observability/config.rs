//! Observability configuration

use serde::Deserialize;

/// Main observability configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum length of an adapter id used as a metric label
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_label_length() -> usize {
    64
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_label_length: default_max_label_length(),
        }
    }
}
