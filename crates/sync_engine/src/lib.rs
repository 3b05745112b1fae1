//! # Sync Engine
//!
//! Crank angle-synchronization engine.
//!
//! Turns a stream of tooth-edge timestamps into a verified absolute angle, an
//! angular velocity estimate and the process-wide engine position state.
//!
//! Responsibilities:
//! - TimeToAngle conversion (high / low resolution)
//! - Acceptance window scheduling
//! - Rate estimation with acceleration damping
//! - ABA gap / additional tooth verification
//! - Synchronization state machine and stall recovery
//! - Publishing the angle base to collaborator channels
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::{CrankEngine, CrankParams};
//! use contracts::{ChannelEvent, HostRequest};
//!
//! let mut engine = CrankEngine::new(CrankParams::default());
//! let view = engine.view();
//! let actions = engine.handle_host_request(HostRequest::Initialize)?;
//!
//! // feed edges / timeouts from the capture timer
//! for action in engine.step(event) {
//!     // hand to the hardware binding
//! }
//! ```

mod actions;
mod additional;
mod context;
mod counting;
mod engine;
mod gap;
mod gapped;
mod params;
mod rate;
mod stall;
#[cfg(test)]
mod test_support;
mod time_to_angle;
mod window;

pub use actions::StepActions;
pub use context::{AngleBasePublisher, AngleBaseView};
pub use engine::CrankEngine;
pub use gap::AbaTest;
pub use params::CrankParams;
pub use rate::RateEstimator;
pub use time_to_angle::{angle_to_time, time_to_angle_hr, time_to_angle_lr, LOW_RES_SHIFT};
pub use window::WindowScheduler;

// Re-export contracts types
pub use contracts::{
    AngleBase, ChannelAction, ChannelEvent, EngPosState, ErrorFlags, HostRequest, SyncDecision,
    SyncState, ToothEvent, Trr, Window,
};
