//! Uncertainty-based selection of examples for review

use std::cmp::Ordering;

use tracing::debug;

use super::buffer::UncertaintyBuffer;
use crate::domain::uncertainty::{softmax, Candidate, UncertainExample, UncertaintyMethod};
use crate::domain::DomainError;

/// Rank candidates by uncertainty and return the top `batch_size`.
///
/// `logits[i]` holds the raw output scores for `candidates[i]`. Scores are computed
/// independently per candidate; ties keep input order.
pub fn select_uncertain(
    candidates: &[Candidate],
    logits: &[Vec<f32>],
    method: UncertaintyMethod,
    batch_size: usize,
) -> Result<Vec<UncertainExample>, DomainError> {
    if candidates.len() != logits.len() {
        return Err(DomainError::invalid_argument(format!(
            "Got {} candidates but {} logit rows",
            candidates.len(),
            logits.len()
        )));
    }

    let mut scored = Vec::with_capacity(candidates.len());

    for (index, row) in logits.iter().enumerate() {
        if row.is_empty() {
            return Err(DomainError::invalid_argument(format!(
                "Logit row {} is empty",
                index
            )));
        }

        if row.iter().any(|l| !l.is_finite()) {
            return Err(DomainError::invalid_argument(format!(
                "Logit row {} contains a non-finite value",
                index
            )));
        }

        scored.push((index, method.score(&softmax(row))));
    }

    // Stable sort: equal scores stay in input order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let selected: Vec<UncertainExample> = scored
        .into_iter()
        .take(batch_size)
        .enumerate()
        .map(|(rank, (index, uncertainty))| UncertainExample {
            prompt: candidates[index].prompt.clone(),
            output: candidates[index].output.clone(),
            uncertainty,
            rank: rank + 1,
        })
        .collect();

    debug!(
        method = %method,
        candidates = candidates.len(),
        selected = selected.len(),
        "Selected uncertain examples"
    );

    Ok(selected)
}

/// [`select_uncertain`] with the method given by name
pub fn select_uncertain_by_name(
    candidates: &[Candidate],
    logits: &[Vec<f32>],
    method: &str,
    batch_size: usize,
) -> Result<Vec<UncertainExample>, DomainError> {
    select_uncertain(candidates, logits, method.parse()?, batch_size)
}

/// Selection settings with defaults for the out-of-band job
#[derive(Debug, Clone)]
pub struct UncertaintySelector {
    method: UncertaintyMethod,
    batch_size: usize,
}

impl Default for UncertaintySelector {
    fn default() -> Self {
        Self {
            method: UncertaintyMethod::Entropy,
            batch_size: 32,
        }
    }
}

impl UncertaintySelector {
    pub fn new(method: UncertaintyMethod, batch_size: usize) -> Self {
        Self { method, batch_size }
    }

    pub fn method(&self) -> UncertaintyMethod {
        self.method
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn select(
        &self,
        candidates: &[Candidate],
        logits: &[Vec<f32>],
    ) -> Result<Vec<UncertainExample>, DomainError> {
        select_uncertain(candidates, logits, self.method, self.batch_size)
    }

    /// Score everything currently buffered without consuming it
    pub fn select_from_buffer(
        &self,
        buffer: &UncertaintyBuffer,
    ) -> Result<Vec<UncertainExample>, DomainError> {
        let (candidates, logits): (Vec<Candidate>, Vec<Vec<f32>>) = buffer
            .snapshot()
            .into_iter()
            .map(|entry| (Candidate::new(entry.prompt, entry.output), entry.logits))
            .unzip();

        self.select(&candidates, &logits)
    }
}
