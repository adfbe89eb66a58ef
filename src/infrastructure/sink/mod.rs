//! Export sinks for adapter statistics and experiment results

mod json_lines;
mod tracing_sink;

pub use json_lines::JsonLinesSink;
pub use tracing_sink::TracingSink;
