use std::time::Duration;

use serde::Deserialize;

use crate::domain::UncertaintyMethod;
use crate::infrastructure::composition::CompositionCacheConfig;
use crate::infrastructure::metrics::MetricsAggregatorConfig;
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::services::VariantAssignerConfig;
use crate::infrastructure::uncertainty::{UncertaintyBuffer, UncertaintySelector};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub cache: CacheSettings,
    pub metrics: MetricsSettings,
    pub experiments: ExperimentSettings,
    pub selector: SelectorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Composition cache settings; durations in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub latency_window: usize,
    pub max_tenants_per_adapter: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperimentSettings {
    pub weight_tolerance: f64,
    pub min_sample_size: u64,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub buffer_capacity: usize,
    pub batch_size: usize,
    pub method: UncertaintyMethod,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl_ms: 15 * 60 * 1000,
            sweep_interval_ms: 30_000,
            wait_timeout_ms: 30_000,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            latency_window: 1024,
            max_tenants_per_adapter: 1000,
        }
    }
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            weight_tolerance: 1e-6,
            min_sample_size: 30,
            confidence_level: 0.95,
        }
    }
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            batch_size: 32,
            method: UncertaintyMethod::Entropy,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CompositionCacheConfig {
        CompositionCacheConfig::default()
            .with_capacity(self.capacity)
            .with_ttl(Duration::from_millis(self.ttl_ms))
            .with_sweep_interval(Duration::from_millis(self.sweep_interval_ms))
            .with_wait_timeout(Duration::from_millis(self.wait_timeout_ms))
    }
}

impl MetricsSettings {
    pub fn to_aggregator_config(&self) -> MetricsAggregatorConfig {
        MetricsAggregatorConfig::default()
            .with_latency_window(self.latency_window)
            .with_max_tenants(self.max_tenants_per_adapter)
    }
}

impl ExperimentSettings {
    pub fn to_assigner_config(&self) -> VariantAssignerConfig {
        VariantAssignerConfig::default()
            .with_weight_tolerance(self.weight_tolerance)
            .with_min_sample_size(self.min_sample_size)
            .with_confidence_level(self.confidence_level)
    }
}

impl SelectorSettings {
    pub fn to_selector(&self) -> UncertaintySelector {
        UncertaintySelector::new(self.method, self.batch_size)
    }

    pub fn to_buffer(&self) -> UncertaintyBuffer {
        UncertaintyBuffer::new(self.buffer_capacity)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
