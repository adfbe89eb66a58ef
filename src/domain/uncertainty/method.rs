//! Uncertainty scoring methods

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// How uncertainty is measured from an output distribution.
///
/// Every method yields a score where larger means more uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMethod {
    /// Shannon entropy (nats) of the distribution
    Entropy,
    /// `1 - (p1 - p2)` where p1, p2 are the two largest probabilities
    Margin,
    /// `1 - max p`
    LeastConfidence,
}

impl UncertaintyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entropy => "entropy",
            Self::Margin => "margin",
            Self::LeastConfidence => "least_confidence",
        }
    }

    /// Score a probability distribution
    pub fn score(&self, probabilities: &[f64]) -> f64 {
        match self {
            Self::Entropy => probabilities
                .iter()
                .filter(|p| **p > 0.0)
                .map(|p| -p * p.ln())
                .sum(),
            Self::Margin => {
                let (first, second) = top_two(probabilities);
                1.0 - (first - second)
            }
            Self::LeastConfidence => {
                let (first, _) = top_two(probabilities);
                1.0 - first
            }
        }
    }
}

impl FromStr for UncertaintyMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entropy" => Ok(Self::Entropy),
            "margin" => Ok(Self::Margin),
            "least_confidence" | "least-confidence" => Ok(Self::LeastConfidence),
            other => Err(DomainError::invalid_argument(format!(
                "Unsupported uncertainty method: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for UncertaintyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numerically stable softmax of raw logits
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .map(|l| *l as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|l| (*l as f64 - max).exp()).collect();
    let total: f64 = exps.iter().sum();

    exps.into_iter().map(|e| e / total).collect()
}

fn top_two(probabilities: &[f64]) -> (f64, f64) {
    let mut first = 0.0;
    let mut second = 0.0;

    for &p in probabilities {
        if p > first {
            second = first;
            first = p;
        } else if p > second {
            second = p;
        }
    }

    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_large_logits_are_stable() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_of_uniform_is_ln_n() {
        let score = UncertaintyMethod::Entropy.score(&[0.25; 4]);
        assert!((score - 4f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_one_hot_is_certain_for_every_method() {
        let one_hot = [1.0, 0.0, 0.0];
        assert!(UncertaintyMethod::Entropy.score(&one_hot).abs() < 1e-12);
        assert!(UncertaintyMethod::Margin.score(&one_hot).abs() < 1e-12);
        assert!(UncertaintyMethod::LeastConfidence.score(&one_hot).abs() < 1e-12);
    }

    #[test]
    fn test_margin_and_least_confidence() {
        let probs = [0.5, 0.3, 0.2];
        assert!((UncertaintyMethod::Margin.score(&probs) - 0.8).abs() < 1e-9);
        assert!((UncertaintyMethod::LeastConfidence.score(&probs) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_top_two_with_ties() {
        assert_eq!(top_two(&[0.4, 0.4, 0.2]), (0.4, 0.4));
        assert_eq!(top_two(&[1.0]), (1.0, 0.0));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "least_confidence".parse::<UncertaintyMethod>().unwrap(),
            UncertaintyMethod::LeastConfidence
        );
        assert!(matches!(
            "bald".parse::<UncertaintyMethod>(),
            Err(DomainError::InvalidArgument { .. })
        ));
    }
}
