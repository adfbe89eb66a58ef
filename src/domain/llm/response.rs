use serde::{Deserialize, Serialize};

/// Reason why the generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// Output of one base-model generation call
///
/// `logits` holds the raw scores of the output distribution the uncertainty
/// selector consumes (one row per generation, e.g. the final-token distribution
/// or a classification head).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub output: String,
    pub logits: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl Generation {
    pub fn new(output: impl Into<String>, logits: Vec<f32>) -> Self {
        Self {
            output: output.into(),
            logits,
            finish_reason: None,
        }
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }
}
