//! Infrastructure layer - Serving components, exporters and process setup

pub mod composition;
pub mod experiment;
pub mod logging;
pub mod metrics;
pub mod observability;
pub mod services;
pub mod sink;
pub mod uncertainty;
