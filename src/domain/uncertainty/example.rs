use serde::{Deserialize, Serialize};

/// A (prompt, output) pair awaiting uncertainty scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub prompt: String,
    pub output: String,
}

impl Candidate {
    pub fn new(prompt: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output: output.into(),
        }
    }
}

/// A scored candidate selected for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainExample {
    pub prompt: String,
    pub output: String,
    pub uncertainty: f64,
    /// 1 is the highest priority
    pub rank: usize,
}
