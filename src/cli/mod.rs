//! CLI module for the adapter-serving core
//!
//! Subcommands:
//! - `simulate`: drive a synthetic workload through the orchestrator and report
//! - `select`: rank a file of generations by uncertainty

pub mod select;
pub mod simulate;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Adapter serving core - composition cache, adapter telemetry, experiments
#[derive(Parser)]
#[command(name = "adapter-serving")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a synthetic workload and print cache, adapter and experiment reports
    Simulate(simulate::SimulateArgs),

    /// Rank candidate generations by uncertainty
    Select(select::SelectArgs),
}

/// Load `.env` and layered configuration, then install logging
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AppConfig::default(),
    };

    logging::init_logging(&config.logging);

    if let Err(e) = loaded {
        warn!(error = %e, "Failed to load configuration, using defaults");
    }

    config
}
