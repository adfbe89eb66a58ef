//! Base model domain: generation contract and its request/response types

mod provider;
mod request;
mod response;

pub use provider::BaseModel;
pub use request::GenerationParams;
pub use response::{FinishReason, Generation};

#[cfg(test)]
pub use provider::MockBaseModel;
