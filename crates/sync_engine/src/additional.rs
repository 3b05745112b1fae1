//! Additional-tooth wheel edge handling.
//!
//! The wheel carries one extra tooth between the last and the first regular tooth.
//! The extra edge is detected by its short period and never counted; the regular
//! tooth after it plays the part of the tooth after the gap.

use contracts::{elapsed, ErrorFlags, SyncState};

use crate::actions::StepActions;
use crate::engine::CrankEngine;

impl CrankEngine {
    pub(crate) fn additional_edge(&mut self, now: u32, actions: &mut StepActions) {
        match self.state {
            SyncState::SecondTrans => {
                let period = elapsed(self.last_edge_time, now);
                self.record_search_period(now, period);
                self.state = SyncState::TestPossibleGap;
                self.arm_search_window(now, period, actions);
            }
            SyncState::TestPossibleGap => self.test_possible_additional(now, actions),
            SyncState::VerifyGap => self.verify_additional(now, actions),
            SyncState::Counting | SyncState::CountingTimeout | SyncState::ToothBeforeGap => {
                self.count_tooth(now, actions)
            }
            SyncState::AdditionalTooth => self.additional_tooth(now, actions),
            SyncState::ToothAfterGap => self.tooth_after_additional(now, actions),
            SyncState::Seek
            | SyncState::BlankTime
            | SyncState::BlankTeeth
            | SyncState::FirstTrans
            | SyncState::ToothBeforeGapNotHrm
            | SyncState::ToothAfterGapNotHrm => self.stall(ErrorFlags::INTERNAL, now, actions),
        }
    }

    /// Searching: accept the early inserted edge as well as the next regular one.
    fn arm_search_window(&mut self, now: u32, period: u32, actions: &mut StepActions) {
        let window =
            self.windows
                .close_using_ratio(now, self.params.win_ratio_across_gap, period);
        self.arm(window, actions);
    }

    /// Window for the regular tooth that follows an inserted one.
    fn arm_after_additional(&mut self, now: u32, period_before: u32, short: u32, actions: &mut StepActions) {
        let rest = period_before.saturating_sub(short).max(1);
        let window = self
            .windows
            .close_using_ratio(now, self.params.win_ratio_after_gap, rest);
        self.arm(window, actions);
    }

    fn test_possible_additional(&mut self, now: u32, actions: &mut StepActions) {
        let period = elapsed(self.last_edge_time, now);
        if self.aba.is_additional_tooth(self.prev_period, period) {
            self.period_before_extra = self.prev_period;
            self.last_edge_time = now;
            self.state = SyncState::VerifyGap;
            self.arm_after_additional(now, self.period_before_extra, period, actions);
            tracing::debug!(period, "additional tooth candidate");
        } else {
            self.record_search_period(now, period);
            self.arm_search_window(now, period, actions);
        }
    }

    fn verify_additional(&mut self, now: u32, actions: &mut StepActions) {
        let period = elapsed(self.last_edge_time, now);
        if self.aba.confirms_additional_tooth(self.period_before_extra, period) {
            let period_norm = elapsed(self.last_regular_time, now);
            tracing::debug!(period_norm, "additional tooth verified");
            self.start_counting(now, period_norm, 1, actions);
        } else {
            self.record_search_period(now, period);
            self.state = SyncState::TestPossibleGap;
            self.arm_search_window(now, period, actions);
        }
    }

    fn additional_tooth(&mut self, now: u32, actions: &mut StepActions) {
        let period = self.since_tooth(now);
        if self
            .aba
            .is_additional_tooth(self.last_tooth_period_norm, period)
        {
            self.period_before_extra = self.last_tooth_period_norm;
            self.last_edge_time = now;
            self.state = SyncState::ToothAfterGap;
            self.arm_after_additional(now, self.period_before_extra, period, actions);
        } else {
            self.stall(ErrorFlags::ADDITIONAL_TOOTH_NOT_FOUND, now, actions);
        }
    }

    fn tooth_after_additional(&mut self, now: u32, actions: &mut StepActions) {
        let period = elapsed(self.last_edge_time, now);
        if self
            .aba
            .confirms_additional_tooth(self.period_before_extra, period)
        {
            let period_norm = self.since_tooth(now);
            self.complete_gap(now, period_norm, period_norm, actions);
        } else {
            self.stall(ErrorFlags::TOOTH_IN_GAP, now, actions);
        }
    }
}

#[cfg(test)]
mod tests {
    use contracts::{CrankConfig, EngPosState, InterruptCause, LinkMessage, WheelKind};

    use super::*;
    use crate::test_support::*;

    /// 36 regular teeth plus one inserted at half pitch after the last one.
    fn additional_config() -> CrankConfig {
        CrankConfig {
            wheel: WheelKind::AdditionalTooth,
            teeth_till_gap: 36,
            teeth_in_gap: 0,
            teeth_per_sync: 36,
            teeth_per_cycle: 72,
            tcr2_ticks_per_add_tooth: TICKS / 2,
            ..crank_config()
        }
    }

    /// Index 35 is tooth 36, index 36 the inserted tooth, index 37 tooth 1 again.
    fn additional_wheel(count: usize) -> Vec<u32> {
        let mut edges = Vec::with_capacity(count);
        let mut time = 10_000u32;
        let mut tooth = 1;
        while edges.len() < count {
            edges.push(time);
            if tooth == 36 && edges.len() < count {
                edges.push(time + 500);
                tooth = 0;
            }
            time += 1000;
            tooth += 1;
        }
        edges
    }

    #[test]
    fn test_additional_tooth_sync() {
        let mut engine = engine_with(additional_config());
        let trace = drive(&mut engine, &additional_wheel(80));

        let eng_pos: Vec<_> = trace
            .interrupts()
            .into_iter()
            .map(|(index, cause)| (index.unwrap(), cause))
            .collect();
        assert_eq!(
            eng_pos,
            vec![
                (37, InterruptCause::EngPos(EngPosState::FirstHalfSync)),
                (74, InterruptCause::EngPos(EngPosState::PreFullSync)),
            ]
        );
        let resets: Vec<_> = trace
            .links(LinkMessage::ResetLog)
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(resets, vec![Some(37)]);

        assert!(engine.error().is_empty());
        assert_eq!(engine.trr().raw(), (1000 << 9) / TICKS);
        let status = engine.status();
        assert_eq!(status.tooth_counter_cycle, 6);
        assert_eq!(status.last_tooth_period_norm, 1000);
    }

    #[test]
    fn test_inserted_tooth_waits_in_additional_state() {
        let mut engine = engine_with(additional_config());
        let edges = additional_wheel(74);

        drive(&mut engine, &edges[..73]);
        assert_eq!(engine.state(), SyncState::AdditionalTooth);
        drive(&mut engine, &edges[73..74]);
        assert_eq!(engine.state(), SyncState::ToothAfterGap);
        assert_eq!(engine.status().tooth_counter_gap, 36);
    }

    #[test]
    fn test_missing_inserted_tooth_stalls() {
        let mut engine = engine_with(additional_config());
        let mut edges = additional_wheel(80);
        edges.remove(73);
        drive(&mut engine, &edges);

        assert!(engine
            .error()
            .contains(ErrorFlags::ADDITIONAL_TOOTH_NOT_FOUND | ErrorFlags::STALL));
        assert_eq!(engine.eng_pos(), EngPosState::Seek);
    }
}
