//! Engine run orchestration module.

mod host;
mod orchestrator;
mod stats;

pub use host::ScriptedHost;
pub use orchestrator::{Pipeline, PipelineConfig, TraceSource};
pub use stats::PipelineStats;
