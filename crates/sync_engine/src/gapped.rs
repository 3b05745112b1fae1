//! Gapped wheel (missing teeth) edge handling.

use contracts::{elapsed, ErrorFlags, SyncState};

use crate::actions::StepActions;
use crate::engine::CrankEngine;

impl CrankEngine {
    pub(crate) fn gapped_edge(&mut self, now: u32, actions: &mut StepActions) {
        match self.state {
            SyncState::SecondTrans => {
                let period = elapsed(self.last_edge_time, now);
                self.record_search_period(now, period);
                self.state = SyncState::TestPossibleGap;
                let window = self.windows.open_gap_search(now, period);
                self.arm(window, actions);
            }
            SyncState::TestPossibleGap => self.test_possible_gap(now, actions),
            SyncState::VerifyGap => self.verify_gap(now, actions),
            SyncState::Counting
            | SyncState::CountingTimeout
            | SyncState::ToothBeforeGap
            | SyncState::ToothBeforeGapNotHrm => self.count_tooth(now, actions),
            SyncState::ToothAfterGap | SyncState::ToothAfterGapNotHrm => {
                self.tooth_after_gap(now, actions)
            }
            SyncState::Seek
            | SyncState::BlankTime
            | SyncState::BlankTeeth
            | SyncState::FirstTrans
            | SyncState::AdditionalTooth => self.stall(ErrorFlags::INTERNAL, now, actions),
        }
    }

    fn test_possible_gap(&mut self, now: u32, actions: &mut StepActions) {
        let period = elapsed(self.last_edge_time, now);
        let candidate = self.aba.is_gap(period, self.prev_period);
        self.record_search_period(now, period);

        if candidate {
            self.state = SyncState::VerifyGap;
            let tooth_period = period / (self.params.teeth_in_gap + 1);
            let window =
                self.windows
                    .open_normal(now, self.params.win_ratio_after_gap, tooth_period);
            self.arm(window, actions);
            tracing::debug!(period, "gap candidate");
        } else {
            let window = self.windows.open_gap_search(now, period);
            self.arm(window, actions);
        }
    }

    fn verify_gap(&mut self, now: u32, actions: &mut StepActions) {
        let period = elapsed(self.last_edge_time, now);
        if self.aba.confirms_gap(self.prev_period, period) {
            tracing::debug!(gap = self.prev_period, period, "gap verified");
            self.start_counting(now, period, 2, actions);
        } else {
            self.record_search_period(now, period);
            self.state = SyncState::TestPossibleGap;
            let window = self.windows.open_gap_search(now, period);
            self.arm(window, actions);
        }
    }

    fn tooth_after_gap(&mut self, now: u32, actions: &mut StepActions) {
        let period = self.since_tooth(now);
        if self.aba.is_gap(period, self.prev_period) {
            let period_norm = period / (self.params.teeth_in_gap + 1);
            self.complete_gap(now, period, period_norm, actions);
        } else {
            self.stall(ErrorFlags::TOOTH_IN_GAP, now, actions);
        }
    }
}
