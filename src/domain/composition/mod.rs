//! Composition domain: adapter references, canonical keys and the composer contract

mod adapter;
mod composer;
mod key;

pub use adapter::{AdapterRef, MAX_ADAPTER_ID_LENGTH};
pub use composer::Composer;
pub use key::CompositionKey;

#[cfg(test)]
pub use composer::mock::MockComposer;
