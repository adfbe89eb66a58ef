//! Select command - rank candidate generations by uncertainty

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::domain::{Candidate, UncertaintyMethod};
use crate::infrastructure::uncertainty::{select_uncertain, BufferedGeneration};

/// Arguments for the select command
#[derive(Args, Clone)]
pub struct SelectArgs {
    /// JSON file holding an array of `{prompt, output, logits}` objects
    #[arg(long, short)]
    pub input: PathBuf,

    /// Scoring method: entropy, margin or least_confidence (overrides config)
    #[arg(long)]
    pub method: Option<UncertaintyMethod>,

    /// Number of examples to return (overrides config)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// Run the select command
pub async fn run(args: SelectArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let method = args.method.unwrap_or(config.selector.method);
    let batch_size = args.batch_size.unwrap_or(config.selector.batch_size);

    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let generations: Vec<BufferedGeneration> =
        serde_json::from_str(&raw).context("Input must be a JSON array of generations")?;

    let (candidates, logits): (Vec<Candidate>, Vec<Vec<f32>>) = generations
        .into_iter()
        .map(|g| (Candidate::new(g.prompt, g.output), g.logits))
        .unzip();

    let selected = select_uncertain(&candidates, &logits, method, batch_size)?;

    info!(
        method = %method,
        candidates = candidates.len(),
        selected = selected.len(),
        "Ranked candidates"
    );

    println!("{}", serde_json::to_string_pretty(&selected)?);
    Ok(())
}
