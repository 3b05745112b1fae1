//! Tooth counting and cycle bookkeeping shared by both wheel kinds.

use contracts::{angle_add, EngPosState, ErrorFlags, InterruptCause, LinkMessage, SyncState, WheelKind};

use crate::actions::StepActions;
use crate::engine::CrankEngine;

impl CrankEngine {
    /// A tooth on the regular pitch. Used by COUNTING, COUNTING_TIMEOUT and
    /// TOOTH_BEFORE_GAP alike.
    pub(crate) fn count_tooth(&mut self, now: u32, actions: &mut StepActions) {
        let period = self.since_tooth(now);
        self.last_tooth_period = period;
        self.last_tooth_period_norm = period;
        self.prev_period = period;
        self.last_edge_time = now;
        self.rate.update(period);

        self.advance_tooth(now);
        self.log_period(period);
        self.schedule_next_tooth(now, actions);
    }

    /// One missed edge while counting: pretend it arrived on time.
    ///
    /// Counters and angle advance, the estimate and the period log do not.
    pub(crate) fn synthesize_tooth(&mut self, actions: &mut StepActions) {
        let period = self.last_tooth_period_norm;
        let expected = self.base.tooth_time.wrapping_add(period);
        self.flag(ErrorFlags::TIMEOUT);
        self.last_edge_time = expected;
        self.advance_tooth(expected);

        self.state = SyncState::CountingTimeout;
        self.base.angle_limit = angle_add(self.base.tooth_angle, self.params.ticks_per_tooth);
        let window =
            self.windows
                .open_normal(expected, self.params.win_ratio_after_timeout, period);
        self.arm(window, actions);
        tracing::debug!(
            tooth = self.tooth_counter_gap,
            expected,
            "missed tooth synthesized"
        );
    }

    fn advance_tooth(&mut self, at: u32) {
        self.tooth_counter_gap += 1;
        self.tooth_counter_cycle += 1;
        self.base.tooth_time = at;
        self.base.tooth_angle = angle_add(self.base.tooth_angle, self.params.ticks_per_tooth);
    }

    /// Pick the state and window for the tooth after the one just counted.
    pub(crate) fn schedule_next_tooth(&mut self, now: u32, actions: &mut StepActions) {
        let period = self.last_tooth_period_norm;
        let last_before_gap = self.params.teeth_till_gap;
        let errata = self.params.angle_errata_workaround;
        self.base.angle_limit = angle_add(self.base.tooth_angle, self.params.ticks_per_tooth);

        if self.tooth_counter_gap >= last_before_gap {
            match self.params.wheel {
                WheelKind::Gapped if errata => {
                    self.state = SyncState::ToothAfterGapNotHrm;
                }
                WheelKind::Gapped => {
                    self.state = SyncState::ToothAfterGap;
                    self.base.angle_limit =
                        angle_add(self.base.tooth_angle, self.params.gap_angle());
                }
                WheelKind::AdditionalTooth => {
                    self.state = SyncState::AdditionalTooth;
                    let extra = self.additional_tooth_period(period);
                    let window =
                        self.windows
                            .close_using_ratio(now, self.params.win_ratio_normal, extra);
                    self.arm(window, actions);
                    return;
                }
            }
            let window = self.windows.open_across_gap(now, period);
            self.arm(window, actions);
            return;
        }

        self.state = if self.tooth_counter_gap + 1 == last_before_gap {
            match self.params.wheel {
                WheelKind::Gapped if errata => SyncState::ToothBeforeGapNotHrm,
                _ => SyncState::ToothBeforeGap,
            }
        } else {
            SyncState::Counting
        };
        let window = self
            .windows
            .open_normal(now, self.params.win_ratio_normal, period);
        self.arm(window, actions);
    }

    /// The tooth that ends a gap (or follows the inserted tooth) was verified.
    pub(crate) fn complete_gap(
        &mut self,
        now: u32,
        period: u32,
        period_norm: u32,
        actions: &mut StepActions,
    ) {
        self.last_tooth_period = period;
        self.last_tooth_period_norm = period_norm;
        self.prev_period = period_norm;
        self.last_edge_time = now;
        self.rate.update(period_norm);

        self.base.tooth_time = now;
        self.base.tooth_angle = angle_add(self.base.tooth_angle, self.params.gap_angle());
        self.tooth_counter_gap = 1;
        self.advance_cycle(actions);
        self.log_period(period);

        self.state = SyncState::CountingTimeout;
        self.base.angle_limit = angle_add(self.base.tooth_angle, self.params.ticks_per_tooth);
        let window = self
            .windows
            .open_normal(now, self.params.win_ratio_after_gap, period_norm);
        self.arm(window, actions);
    }

    /// Move the cycle counter across the gap and run segment / cycle completion.
    fn advance_cycle(&mut self, actions: &mut StepActions) {
        let next = self.tooth_counter_cycle + self.params.teeth_in_gap + 1;
        let per_sync = self.params.teeth_per_sync;
        let per_cycle = self.params.teeth_per_cycle;

        match self.base.eng_pos {
            EngPosState::Seek => {
                self.flag(ErrorFlags::INTERNAL);
                self.tooth_counter_cycle = next;
            }
            EngPosState::FirstHalfSync if self.resync_pending => {
                self.resync_pending = false;
                self.tooth_counter_cycle = 1;
                actions.link(self.params.cam_targets, LinkMessage::ResetLog);
            }
            EngPosState::FirstHalfSync if next > per_sync => {
                self.tooth_counter_cycle = 1;
                self.set_eng_pos(EngPosState::PreFullSync, actions);
            }
            EngPosState::PreFullSync if next > per_sync => {
                tracing::warn!("no host reply within the sync segment, repeating it");
                self.tooth_counter_cycle = 1;
                self.set_eng_pos(EngPosState::FirstHalfSync, actions);
                actions.link(self.params.cam_targets, LinkMessage::ResetLog);
            }
            EngPosState::FullSync if next > per_cycle => {
                self.tooth_counter_cycle = 1;
                self.base.eng_cycle_origin =
                    angle_add(self.base.eng_cycle_origin, self.params.ticks_per_cycle());
                actions.link(self.params.cam_targets, LinkMessage::ResetLog);
                actions.raise(InterruptCause::CycleStart);
                metrics::counter!("crank_sync_cycles_total").increment(1);
            }
            _ => self.tooth_counter_cycle = next,
        }
    }

    /// Store `period` at the slot of the current tooth position.
    pub(crate) fn log_period(&mut self, period: u32) {
        if !self.params.log_tooth_periods {
            return;
        }
        let index = self.tooth_counter_cycle.saturating_sub(1) as usize;
        if let Some(slot) = self.tooth_log.get_mut(index) {
            *slot = period;
        }
    }

    /// Expected time from the last regular tooth to the inserted one.
    pub(crate) fn additional_tooth_period(&self, period: u32) -> u32 {
        let ticks = u64::from(self.params.ticks_per_tooth);
        let scaled = u64::from(period) * u64::from(self.params.ticks_per_add_tooth) / ticks;
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    }
}
