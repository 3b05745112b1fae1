//! # Contracts
//!
//! Frozen interface contracts (ICD) for the crank angle-synchronization workspace.
//! Every business crate depends on this crate only; reverse dependencies are prohibited.
//!
//! ## Time and angle model
//! - Time is the free-running TCR1 tick counter, a wrapping `u32`. Intervals are wrapping
//!   differences and must stay below [`INTERVAL_MAX`].
//! - Angle is the TCR2 counter, 24 bits wide ([`ANGLE_MASK`]).
//! - The angular velocity estimate ([`Trr`]) is fixed point with nine fraction bits.

mod angle_base;
mod blueprint;
mod channel;
mod error;
mod fixed;
mod host;
mod link;
mod sync;

pub use angle_base::AngleBase;
pub use blueprint::*;
pub use channel::*;
pub use error::*;
pub use fixed::*;
pub use host::*;
pub use link::{LinkTarget, LocalLinkTarget};
pub use sync::*;
