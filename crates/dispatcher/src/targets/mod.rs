//! Link target implementations
//!
//! Contains the cam logger, dependent output channels and a logging target.

mod cam_log;
mod dependent;
mod log;

pub use self::cam_log::{CamLog, CamLogTarget};
pub use self::dependent::{DependentChannel, DependentStatus};
pub use self::log::LogTarget;
