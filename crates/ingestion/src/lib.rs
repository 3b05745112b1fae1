//! # Ingestion
//!
//! Tooth-edge sources for the crank engine.
//!
//! Responsibilities:
//! - Synthesize wheel signals (`WheelTrace`): gapped or additional-tooth wheels,
//!   speed ramps, dropped teeth, seeded jitter
//! - Read and write recorded traces (binary via `bytemuck`, JSON via `serde_json`)
//! - Replay a trace against the engine's armed windows (`SimCaptureTimer`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{SimCaptureTimer, WheelTrace};
//!
//! let edges = WheelTrace::gapped(58, 2).period(1000).revolutions(4).build();
//! let mut timer = SimCaptureTimer::new(edges);
//! timer.apply(&engine.handle_host_request(HostRequest::Initialize)?)?;
//! while let Some(event) = timer.next_event()? {
//!     let applied = timer.apply(&engine.step(event))?;
//!     // Route applied.interrupts to the host, applied.links to the dispatcher
//! }
//! ```

mod counters;
mod error;
mod timer;
mod trace_file;
mod wheel;

// Re-exports
pub use counters::{CaptureMetrics, CaptureSnapshot};
pub use error::{IngestionError, Result};
pub use timer::{AppliedActions, SimCaptureTimer};
pub use trace_file::{decode_binary, encode_binary, read_trace, write_trace, RawEdge, TraceFormat};
pub use wheel::{TraceEdge, WheelTrace};
