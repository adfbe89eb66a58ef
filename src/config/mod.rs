//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, ExperimentSettings, LogFormat, LoggingConfig, MetricsSettings,
    SelectorSettings,
};
