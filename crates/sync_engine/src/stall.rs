//! Stall / recovery.

use contracts::{EngPosState, ErrorFlags, LinkMessage, SyncState};
use tracing::instrument;

use crate::actions::StepActions;
use crate::engine::CrankEngine;

impl CrankEngine {
    /// Drop synchronization and restart the gap search.
    ///
    /// Safe to call while already stalled: the interrupt and the re-initialize
    /// link go out only when the engine position actually leaves a synced state.
    #[instrument(
        level = "debug",
        name = "crank_engine_stall",
        skip(self, actions),
        fields(state = %self.state)
    )]
    pub(crate) fn stall(&mut self, cause: ErrorFlags, now: u32, actions: &mut StepActions) {
        self.flag(cause | ErrorFlags::STALL);
        let was_synced = self.base.eng_pos != EngPosState::Seek;

        self.state = SyncState::FirstTrans;
        self.rate.reset();
        self.tooth_counter_gap = 0;
        self.tooth_counter_cycle = 0;
        self.resync_pending = false;
        self.last_edge_time = now;
        self.last_regular_time = now;

        // Keep an angle that is already within the first tooth; zeroing it would
        // look like a wraparound to the dependent outputs.
        if self.base.tooth_angle >= self.params.ticks_per_tooth {
            self.base.tooth_angle = 0;
        }
        self.base.angle_limit = self.base.tooth_angle;
        self.base.eng_cycle_origin = 0;
        self.base.tooth_time = now;

        if was_synced {
            tracing::warn!(
                cause = ?cause,
                channel = %self.params.channel,
                "crank synchronization lost"
            );
            metrics::counter!("crank_sync_stalls_total").increment(1);
            self.set_eng_pos(EngPosState::Seek, actions);
            actions.link(self.params.dependent_targets, LinkMessage::Reinitialize);
        }

        self.arm(self.windows.unbounded(now), actions);
    }
}
