//! Composition cache: shared, reference-counted composed models

mod cache;
mod config;
mod lease;

pub use cache::{CacheEntryInfo, CacheStats, CompositionCache, CompositionState};
pub use config::CompositionCacheConfig;
pub use lease::{CompositionLease, LeaseOrigin};
