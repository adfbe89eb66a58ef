//! Infrastructure layer for experiment A/B testing
//!
//! Provides the experiment registry plus the hashing, statistics and tallies
//! used by the variant assigner.

mod consistent_hashing;
mod registry;
mod statistical;
mod tally;

pub use consistent_hashing::ConsistentHasher;
pub use registry::{ExperimentSlot, InMemoryExperimentRegistry};
pub use statistical::{
    compare_means, compare_success_rates, two_proportion_z_test, welch_t_test, SampleSummary,
};
pub use tally::VariantTally;
