//! Host control surface: service requests and the host-readable channel status.

use serde::{Deserialize, Serialize};

use crate::{EngPosState, ErrorFlags, SyncState, Trr};

/// Host decision on the accumulated cam transition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDecision {
    /// Log decoded. `tcr2_adjustment` is added to the angle so it reads engine-cycle
    /// relative; must be a whole number of wheel revolutions.
    Decoded { tcr2_adjustment: u32 },
    /// Log could not be decoded; repeat the sync segment.
    Undecided,
}

/// Host service request for one crank channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRequest {
    /// (Re)initialize the channel and start searching for the gap.
    Initialize,
    /// Answer to the PRE_FULL_SYNC interrupt.
    ConfirmSync(SyncDecision),
}

impl HostRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ConfirmSync(_) => "confirm_sync",
        }
    }
}

/// Coherent snapshot of the host-readable channel parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub state: SyncState,
    pub eng_pos: EngPosState,
    pub error: ErrorFlags,
    pub last_tooth_period: u32,
    pub last_tooth_period_norm: u32,
    pub tooth_counter_gap: u32,
    pub tooth_counter_cycle: u32,
    pub trr: Trr,
    pub tooth_angle: u32,
    pub eng_cycle_origin: u32,
    /// One entry per tooth position; empty unless period logging is enabled.
    pub tooth_period_log: Vec<u32>,
}
