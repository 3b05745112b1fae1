//! The process-wide angle base record.

use serde::{Deserialize, Serialize};

use crate::{EngPosState, Trr};

/// Everything a consumer channel needs to turn "now" into an engine angle.
///
/// Written only by the synchronization engine and always published as a whole,
/// so readers never observe a mix of two updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AngleBase {
    pub eng_pos: EngPosState,
    /// Angular velocity estimate
    pub trr: Trr,
    /// Angle at the start of the current engine cycle
    pub eng_cycle_origin: u32,
    /// Angle at the last counted tooth
    pub tooth_angle: u32,
    /// TCR1 time of the last counted tooth
    pub tooth_time: u32,
    /// Highest angle interpolation may reach before the next tooth arrives
    pub angle_limit: u32,
}

impl AngleBase {
    /// Consumers suspend scheduling while the engine searches for the gap.
    pub fn is_seeking(&self) -> bool {
        self.eng_pos == EngPosState::Seek
    }
}
