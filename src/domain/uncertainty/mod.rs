//! Uncertainty selection domain: scoring methods and example types

mod example;
mod method;

pub use example::{Candidate, UncertainExample};
pub use method::{softmax, UncertaintyMethod};
