//! Crank synchronization engine.
//!
//! One deterministic, run-to-completion step per trigger (edge or timeout). A step
//! mutates channel state, publishes the angle base once and returns the
//! [`ChannelAction`](contracts::ChannelAction)s for the hardware binding.

use contracts::{
    angle_add, elapsed, AngleBase, ChannelEvent, ChannelStatus, ContractError, EngPosState,
    ErrorFlags, HostRequest, InterruptCause, LinkMessage, SyncDecision, SyncState, ToothEvent,
    Trr, WheelKind, Window, ANGLE_MASK,
};
use tracing::instrument;

use crate::actions::StepActions;
use crate::context::{AngleBasePublisher, AngleBaseView};
use crate::gap::AbaTest;
use crate::params::CrankParams;
use crate::rate::RateEstimator;
use crate::window::WindowScheduler;

/// Angle synchronization state machine of one crank channel.
///
/// Created idle; the host must send [`HostRequest::Initialize`] before edges are
/// accepted.
#[derive(Debug)]
pub struct CrankEngine {
    pub(crate) params: CrankParams,
    pub(crate) windows: WindowScheduler,
    pub(crate) aba: AbaTest,
    pub(crate) rate: RateEstimator,
    publisher: AngleBasePublisher,
    /// Working copy of the published record
    pub(crate) base: AngleBase,
    pub(crate) state: SyncState,
    pub(crate) error: ErrorFlags,
    /// Time of the last accepted edge, including an inserted tooth
    pub(crate) last_edge_time: u32,
    /// Time of the last edge on the regular pitch while searching
    pub(crate) last_regular_time: u32,
    pub(crate) last_tooth_period: u32,
    pub(crate) last_tooth_period_norm: u32,
    /// Period the next ABA test compares against
    pub(crate) prev_period: u32,
    pub(crate) period_before_extra: u32,
    pub(crate) tooth_counter_gap: u32,
    pub(crate) tooth_counter_cycle: u32,
    pub(crate) blank_teeth_left: u32,
    pub(crate) armed: Window,
    pub(crate) tooth_log: Box<[u32]>,
    /// Host answered "undecided": restart the sync segment at the next gap
    pub(crate) resync_pending: bool,
}

impl CrankEngine {
    pub fn new(params: CrankParams) -> Self {
        let log_len = if params.log_tooth_periods {
            params.teeth_per_cycle as usize
        } else {
            0
        };
        Self {
            windows: params.windows(),
            aba: params.aba(),
            rate: RateEstimator::new(params.ticks_per_tooth, params.tcr1_full_clock),
            publisher: AngleBasePublisher::new(),
            base: AngleBase::default(),
            state: SyncState::Seek,
            error: ErrorFlags::empty(),
            last_edge_time: 0,
            last_regular_time: 0,
            last_tooth_period: 0,
            last_tooth_period_norm: 0,
            prev_period: 0,
            period_before_extra: 0,
            tooth_counter_gap: 0,
            tooth_counter_cycle: 0,
            blank_teeth_left: 0,
            armed: Window::unbounded(0),
            tooth_log: vec![0; log_len].into_boxed_slice(),
            resync_pending: false,
            params,
        }
    }

    /// Read-only handle for collaborator channels.
    pub fn view(&self) -> AngleBaseView {
        self.publisher.view()
    }

    pub fn params(&self) -> &CrankParams {
        &self.params
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn eng_pos(&self) -> EngPosState {
        self.base.eng_pos
    }

    pub fn error(&self) -> ErrorFlags {
        self.error
    }

    pub fn trr(&self) -> Trr {
        self.rate.trr()
    }

    pub fn armed_window(&self) -> Window {
        self.armed
    }

    pub fn angle_base(&self) -> AngleBase {
        self.base
    }

    /// Host-readable parameters as one coherent record.
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            eng_pos: self.base.eng_pos,
            error: self.error,
            last_tooth_period: self.last_tooth_period,
            last_tooth_period_norm: self.last_tooth_period_norm,
            tooth_counter_gap: self.tooth_counter_gap,
            tooth_counter_cycle: self.tooth_counter_cycle,
            trr: self.rate.trr(),
            tooth_angle: self.base.tooth_angle,
            eng_cycle_origin: self.base.eng_cycle_origin,
            tooth_period_log: self.tooth_log.to_vec(),
        }
    }

    /// Clear sticky error bits. The engine itself never clears them.
    pub fn clear_error_flags(&mut self, mask: ErrorFlags) {
        self.error.remove(mask);
    }

    pub fn step(&mut self, event: ChannelEvent) -> StepActions {
        match event {
            ChannelEvent::Edge(edge) => self.on_edge(edge),
            ChannelEvent::Timeout { at } => self.on_timeout(at),
        }
    }

    #[instrument(
        level = "trace",
        name = "crank_engine_edge",
        skip(self, event),
        fields(state = %self.state, timestamp = event.timestamp)
    )]
    pub fn on_edge(&mut self, event: ToothEvent) -> StepActions {
        let mut actions = StepActions::new();
        if event.polarity != self.params.polarity {
            self.flag(ErrorFlags::INVALID_TRANSITION);
            self.arm(self.armed, &mut actions);
            return actions;
        }

        let now = event.timestamp;
        match self.state {
            SyncState::Seek => self.begin_blank_time(now, &mut actions),
            SyncState::BlankTime => {
                self.flag(ErrorFlags::INVALID_TRANSITION);
                self.arm(self.armed, &mut actions);
            }
            SyncState::BlankTeeth => self.blank_tooth(now, &mut actions),
            SyncState::FirstTrans => self.first_transition(now, &mut actions),
            _ => match self.params.wheel {
                WheelKind::Gapped => self.gapped_edge(now, &mut actions),
                WheelKind::AdditionalTooth => self.additional_edge(now, &mut actions),
            },
        }

        self.publish();
        actions
    }

    #[instrument(
        level = "trace",
        name = "crank_engine_timeout",
        skip(self),
        fields(state = %self.state)
    )]
    pub fn on_timeout(&mut self, at: u32) -> StepActions {
        let mut actions = StepActions::new();
        match self.state {
            SyncState::Seek | SyncState::BlankTeeth => {
                self.flag(ErrorFlags::INVALID_MATCH);
                self.arm(self.armed, &mut actions);
            }
            SyncState::BlankTime => self.end_blank_time(at, &mut actions),
            SyncState::FirstTrans
            | SyncState::SecondTrans
            | SyncState::TestPossibleGap
            | SyncState::VerifyGap => {
                self.flag(ErrorFlags::TIMEOUT);
                self.restart_search(at, &mut actions);
            }
            SyncState::Counting => self.synthesize_tooth(&mut actions),
            SyncState::CountingTimeout => self.stall(ErrorFlags::TIMEOUT, at, &mut actions),
            SyncState::ToothBeforeGap | SyncState::ToothBeforeGapNotHrm => {
                self.stall(ErrorFlags::TIMEOUT_BEFORE_GAP, at, &mut actions)
            }
            SyncState::ToothAfterGap | SyncState::ToothAfterGapNotHrm => {
                self.stall(ErrorFlags::TIMEOUT_AFTER_GAP, at, &mut actions)
            }
            SyncState::AdditionalTooth => {
                let cause = match self.params.wheel {
                    WheelKind::AdditionalTooth => ErrorFlags::ADDITIONAL_TOOTH_NOT_FOUND,
                    WheelKind::Gapped => ErrorFlags::INTERNAL,
                };
                self.stall(cause, at, &mut actions)
            }
        }

        self.publish();
        actions
    }

    /// Service a host request.
    ///
    /// # Errors
    /// Confirm-Sync outside PRE_FULL_SYNC, or an adjustment that is not a whole number
    /// of wheel revolutions, is rejected and leaves the channel untouched.
    #[instrument(name = "crank_engine_host_request", skip(self), fields(request = request.as_str()))]
    pub fn handle_host_request(
        &mut self,
        request: HostRequest,
    ) -> Result<StepActions, ContractError> {
        let mut actions = StepActions::new();
        match request {
            HostRequest::Initialize => self.initialize(&mut actions),
            HostRequest::ConfirmSync(decision) => self.confirm_sync(decision, &mut actions)?,
        }
        self.publish();
        Ok(actions)
    }
}

// ===== host requests =====
impl CrankEngine {
    fn initialize(&mut self, actions: &mut StepActions) {
        self.rate.reset();
        self.state = SyncState::Seek;
        self.error = ErrorFlags::empty();
        self.last_tooth_period = 0;
        self.last_tooth_period_norm = 0;
        self.prev_period = 0;
        self.period_before_extra = 0;
        self.tooth_counter_gap = 0;
        self.tooth_counter_cycle = 0;
        self.blank_teeth_left = 0;
        self.resync_pending = false;
        self.tooth_log.fill(0);
        self.base = AngleBase {
            eng_pos: self.base.eng_pos,
            ..AngleBase::default()
        };

        self.set_eng_pos(EngPosState::Seek, actions);
        actions.select_edge(self.params.polarity);
        self.arm(self.windows.unbounded(self.last_edge_time), actions);
        tracing::info!(channel = %self.params.channel, "crank channel initialized");
    }

    fn confirm_sync(
        &mut self,
        decision: SyncDecision,
        actions: &mut StepActions,
    ) -> Result<(), ContractError> {
        if self.base.eng_pos != EngPosState::PreFullSync {
            return Err(ContractError::host_rejected(
                "confirm_sync",
                format!("engine position is {}", self.base.eng_pos),
            ));
        }

        match decision {
            SyncDecision::Decoded { tcr2_adjustment } => {
                let revolution = self.params.ticks_per_revolution().max(1);
                if tcr2_adjustment > ANGLE_MASK || tcr2_adjustment % revolution != 0 {
                    return Err(ContractError::host_rejected(
                        "confirm_sync",
                        format!(
                            "adjustment {tcr2_adjustment} is not a whole number of revolutions ({revolution} ticks)"
                        ),
                    ));
                }

                let ticks = self.params.ticks_per_tooth;
                let per_cycle = self.params.teeth_per_cycle;
                let shift_teeth = (tcr2_adjustment / ticks) % per_cycle;
                self.tooth_counter_cycle =
                    (self.tooth_counter_cycle.saturating_sub(1) + shift_teeth) % per_cycle + 1;
                self.base.tooth_angle = angle_add(self.base.tooth_angle, tcr2_adjustment);
                self.base.angle_limit = angle_add(self.base.angle_limit, tcr2_adjustment);
                self.base.eng_cycle_origin = self
                    .base
                    .tooth_angle
                    .wrapping_sub((self.tooth_counter_cycle - 1) * ticks)
                    & ANGLE_MASK;
                self.set_eng_pos(EngPosState::FullSync, actions);
            }
            SyncDecision::Undecided => {
                self.resync_pending = true;
                self.set_eng_pos(EngPosState::FirstHalfSync, actions);
            }
        }
        Ok(())
    }
}

// ===== start-up states shared by both wheel kinds =====
impl CrankEngine {
    fn begin_blank_time(&mut self, now: u32, actions: &mut StepActions) {
        self.last_edge_time = now;
        self.state = SyncState::BlankTime;
        self.arm(self.windows.blank_time(now, self.params.blank_time), actions);
    }

    fn end_blank_time(&mut self, at: u32, actions: &mut StepActions) {
        if self.params.blank_teeth > 0 {
            self.blank_teeth_left = self.params.blank_teeth;
            self.state = SyncState::BlankTeeth;
        } else {
            self.state = SyncState::FirstTrans;
        }
        self.arm(self.windows.unbounded(at), actions);
    }

    fn blank_tooth(&mut self, now: u32, actions: &mut StepActions) {
        self.blank_teeth_left = self.blank_teeth_left.saturating_sub(1);
        if self.blank_teeth_left == 0 {
            self.state = SyncState::FirstTrans;
        }
        self.arm(self.windows.unbounded(now), actions);
    }

    fn first_transition(&mut self, now: u32, actions: &mut StepActions) {
        self.last_edge_time = now;
        self.last_regular_time = now;
        self.state = SyncState::SecondTrans;
        let timeout = now.wrapping_add(self.params.first_tooth_timeout);
        self.arm(self.windows.close_at(now, timeout), actions);
    }

    fn restart_search(&mut self, at: u32, actions: &mut StepActions) {
        self.state = SyncState::FirstTrans;
        self.arm(self.windows.unbounded(at), actions);
    }

    /// Bookkeeping for an edge on the regular pitch while searching.
    pub(crate) fn record_search_period(&mut self, now: u32, period: u32) {
        self.last_tooth_period = period;
        self.last_tooth_period_norm = period;
        self.prev_period = period;
        self.last_edge_time = now;
        self.last_regular_time = now;
    }

    /// Gap (or inserted tooth) confirmed: start counting at tooth `counter`.
    pub(crate) fn start_counting(
        &mut self,
        now: u32,
        period_norm: u32,
        counter: u32,
        actions: &mut StepActions,
    ) {
        self.last_tooth_period = period_norm;
        self.last_tooth_period_norm = period_norm;
        self.prev_period = period_norm;
        self.last_edge_time = now;
        self.rate.reset();
        self.rate.update(period_norm);

        self.tooth_counter_gap = counter;
        self.tooth_counter_cycle = counter;
        self.resync_pending = false;
        self.base.tooth_time = now;
        self.base.tooth_angle = ((counter - 1) * self.params.ticks_per_tooth) & ANGLE_MASK;
        self.base.eng_cycle_origin = 0;
        self.log_period(period_norm);

        self.set_eng_pos(EngPosState::FirstHalfSync, actions);
        actions.link(self.params.cam_targets, LinkMessage::ResetLog);
        self.schedule_next_tooth(now, actions);
    }
}

// ===== helpers =====
impl CrankEngine {
    pub(crate) fn arm(&mut self, window: Window, actions: &mut StepActions) {
        self.armed = window;
        actions.commit_window(window);
    }

    /// OR flags into the sticky error set. Every occurrence is counted, even when
    /// the bit is already set.
    pub(crate) fn flag(&mut self, flags: ErrorFlags) {
        for label in flags.labels() {
            metrics::counter!("crank_sync_errors_total", "flag" => label).increment(1);
        }
        let fresh = flags.difference(self.error);
        self.error |= flags;
        if !fresh.is_empty() {
            tracing::debug!(flags = ?fresh, state = %self.state, "error flags raised");
        }
    }

    /// Change the engine position; raises the host interrupt on every real change.
    pub(crate) fn set_eng_pos(&mut self, next: EngPosState, actions: &mut StepActions) {
        let previous = self.base.eng_pos;
        if previous == next {
            return;
        }
        self.base.eng_pos = next;
        actions.raise(InterruptCause::EngPos(next));
        metrics::counter!("crank_sync_eng_pos_transitions_total", "state" => next.as_str())
            .increment(1);
        tracing::info!(from = %previous, to = %next, "engine position changed");
    }

    fn publish(&mut self) {
        self.base.trr = self.rate.trr();
        if !self.base.trr.is_unknown() {
            metrics::gauge!("crank_sync_trr").set(self.base.trr.to_f64());
        }
        self.publisher.publish(self.base);
    }

    /// Time between the last counted tooth and `now`.
    pub(crate) fn since_tooth(&self, now: u32) -> u32 {
        elapsed(self.base.tooth_time, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use contracts::{ChannelAction, ChannelId, CrankConfig, Polarity};
    use rstest::rstest;

    /// 58 periods of 1000, a 3000 gap, then 58 periods of 1000 again.
    fn scenario_edges() -> Vec<u32> {
        let mut edges: Vec<u32> = (0..=58).map(|i| 10_000 + 1000 * i).collect();
        let gap_end = edges[58] + 3000;
        edges.extend((0..=58).map(|k| gap_end + 1000 * k));
        edges
    }

    fn first_half_sync_irqs(trace: &crate::test_support::Trace) -> Vec<Option<usize>> {
        trace
            .interrupts()
            .into_iter()
            .filter(|(_, cause)| *cause == InterruptCause::EngPos(EngPosState::FirstHalfSync))
            .map(|(index, _)| index)
            .collect()
    }

    #[test]
    fn test_initialize_selects_edge_then_arms() {
        let mut engine = CrankEngine::new(CrankParams::default());
        let actions = engine.handle_host_request(HostRequest::Initialize).unwrap();
        assert_eq!(
            actions.as_slice(),
            &[
                ChannelAction::SelectEdge(Polarity::Falling),
                ChannelAction::ArmWindow(Window::unbounded(0)),
                ChannelAction::AcknowledgeTransition,
                ChannelAction::AcknowledgeMatch,
            ]
        );
        assert_eq!(engine.state(), SyncState::Seek);
        assert_eq!(engine.view().eng_pos(), EngPosState::Seek);
    }

    #[test]
    fn test_scenario_first_half_sync_at_second_tooth_after_gap() {
        let mut engine = engine();
        let edges = scenario_edges();

        let trace = drive(&mut engine, &edges[..117]);
        assert_eq!(first_half_sync_irqs(&trace), vec![Some(60)]);
        assert_eq!(engine.trr().raw(), (1000 << 9) / TICKS);
        assert_eq!(engine.state(), SyncState::ToothAfterGap);
        assert!(engine.error().is_empty());

        // the last edge of the sequence sits where the next gap belongs
        drive(&mut engine, &edges[117..]);
        assert!(engine
            .error()
            .contains(ErrorFlags::TOOTH_IN_GAP | ErrorFlags::STALL));
        assert_eq!(engine.eng_pos(), EngPosState::Seek);
    }

    #[test]
    fn test_counting_within_two_teeth_after_gap() {
        let mut engine = engine();
        let edges = scenario_edges();

        drive(&mut engine, &edges[..59]);
        assert_eq!(engine.state(), SyncState::TestPossibleGap);
        drive(&mut engine, &edges[59..60]);
        assert_eq!(engine.state(), SyncState::VerifyGap);
        drive(&mut engine, &edges[60..61]);
        assert_eq!(engine.state(), SyncState::Counting);
        assert_eq!(engine.eng_pos(), EngPosState::FirstHalfSync);

        let status = engine.status();
        assert_eq!(status.tooth_counter_gap, 2);
        assert_eq!(status.tooth_counter_cycle, 2);
        assert_eq!(status.last_tooth_period, 1000);
    }

    #[test]
    fn test_steady_state_never_finds_gap() {
        let mut engine = engine();
        let edges: Vec<u32> = (0..300).map(|i| 10_000 + 1000 * i).collect();
        let trace = drive(&mut engine, &edges);

        assert_eq!(engine.state(), SyncState::TestPossibleGap);
        assert!(trace.interrupts().is_empty());
        assert!(engine.error().is_empty());
    }

    #[test]
    fn test_first_half_sync_from_every_start_tooth() {
        for start in 1..=58 {
            let mut engine = engine();
            let trace = drive(&mut engine, &gapped_wheel(58, 2, 1000, start, 240));

            let first = first_half_sync_irqs(&trace).first().copied().flatten();
            assert!(
                first.is_some_and(|index| index < 2 * 60),
                "start tooth {start}: {first:?}"
            );
            assert!(engine.error().is_empty(), "start tooth {start}");
            assert_ne!(engine.eng_pos(), EngPosState::Seek, "start tooth {start}");
        }
    }

    #[test]
    fn test_search_reseeds_after_period_spanning_gap() {
        let mut engine = engine();
        // teeth 57 and 58, then the gap: the first measured period is 3000
        let edges = gapped_wheel(58, 2, 1000, 57, 4);
        drive(&mut engine, &edges[..3]);
        assert_eq!(engine.state(), SyncState::TestPossibleGap);
        assert_eq!(engine.status().last_tooth_period, 3000);

        drive(&mut engine, &edges[3..]);
        assert_eq!(engine.state(), SyncState::TestPossibleGap);
        assert_eq!(engine.status().last_tooth_period, 1000);
    }

    #[rstest]
    #[case::before_gap(115, SyncState::ToothBeforeGap, ErrorFlags::TIMEOUT_BEFORE_GAP | ErrorFlags::STALL, 1)]
    #[case::after_gap(116, SyncState::ToothAfterGap, ErrorFlags::TIMEOUT_AFTER_GAP | ErrorFlags::STALL, 1)]
    #[case::second_trans(2, SyncState::SecondTrans, ErrorFlags::TIMEOUT, 0)]
    fn test_timeout_returns_to_first_trans(
        #[case] teeth: usize,
        #[case] armed_in: SyncState,
        #[case] flags: ErrorFlags,
        #[case] reinitialize_links: usize,
    ) {
        let mut engine = engine();
        drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, teeth));
        assert_eq!(engine.state(), armed_in);
        assert!(engine.error().is_empty());

        let close = engine.armed_window().closes_at.unwrap();
        let actions = engine.on_timeout(close);
        assert_eq!(engine.error(), flags);
        assert_eq!(engine.state(), SyncState::FirstTrans);
        assert_eq!(engine.eng_pos(), EngPosState::Seek);
        assert_eq!(actions.armed_window(), Some(Window::unbounded(close)));
        assert_eq!(
            actions
                .links()
                .filter(|(_, message)| *message == LinkMessage::Reinitialize)
                .count(),
            reinitialize_links
        );
    }

    #[test]
    fn test_unconfirmed_gap_returns_to_test_possible_gap() {
        // a loose ratio lets a 1300 tooth through the after-gap window
        let mut engine = engine_with(CrankConfig {
            gap_ratio: 0.4,
            ..crank_config()
        });
        drive(&mut engine, &[10_000, 11_000, 12_000, 15_000]);
        assert_eq!(engine.state(), SyncState::VerifyGap);

        let trace = drive(&mut engine, &[16_300]);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(engine.state(), SyncState::TestPossibleGap);
        assert_eq!(engine.eng_pos(), EngPosState::Seek);
        assert!(engine.error().is_empty());
        assert_eq!(engine.status().last_tooth_period, 1300);
    }

    #[test]
    fn test_every_step_schedules_before_acknowledging() {
        let mut engine = engine();
        let trace = drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, 400));
        for (_, actions) in &trace.steps {
            let arm = actions
                .iter()
                .position(|a| matches!(a, ChannelAction::ArmWindow(_)));
            let ack = actions
                .iter()
                .position(|a| matches!(a, ChannelAction::AcknowledgeTransition));
            assert!(arm.is_some());
            assert!(arm < ack);
        }
    }

    #[test]
    fn test_full_sync_resets_cam_log_once_per_cycle() {
        let mut engine = engine();
        let edges = gapped_wheel(58, 2, 1000, 1, 58 * 7);
        let trace = drive_with(&mut engine, &edges, |engine, actions| {
            if actions
                .interrupts()
                .any(|cause| cause == InterruptCause::EngPos(EngPosState::PreFullSync))
            {
                engine
                    .handle_host_request(HostRequest::ConfirmSync(SyncDecision::Decoded {
                        tcr2_adjustment: 0,
                    }))
                    .unwrap();
            }
        });

        let cam: Vec<_> = trace
            .links(LinkMessage::ResetLog)
            .into_iter()
            .map(|(index, targets)| {
                assert!(targets.contains(ChannelId::new(CAM).unwrap()));
                index
            })
            .collect();
        assert_eq!(cam, vec![Some(59), Some(232), Some(348)]);

        let cycle_starts: Vec<_> = trace
            .interrupts()
            .into_iter()
            .filter(|(_, cause)| *cause == InterruptCause::CycleStart)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(cycle_starts, vec![Some(232), Some(348)]);

        assert_eq!(engine.eng_pos(), EngPosState::FullSync);
        assert!(engine.error().is_empty());
        let status = engine.status();
        assert_eq!(status.tooth_counter_cycle, 58);
        assert_eq!(
            status.tooth_angle.wrapping_sub(57 * TICKS) & ANGLE_MASK,
            status.eng_cycle_origin
        );
    }

    #[test]
    fn test_pre_full_sync_without_reply_repeats_segment() {
        let mut engine = engine();
        let trace = drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, 58 * 5));

        let eng_pos: Vec<_> = trace
            .interrupts()
            .into_iter()
            .map(|(index, cause)| (index.unwrap(), cause))
            .collect();
        assert_eq!(
            eng_pos,
            vec![
                (59, InterruptCause::EngPos(EngPosState::FirstHalfSync)),
                (116, InterruptCause::EngPos(EngPosState::PreFullSync)),
                (174, InterruptCause::EngPos(EngPosState::FirstHalfSync)),
                (232, InterruptCause::EngPos(EngPosState::PreFullSync)),
            ]
        );
        let resets: Vec<_> = trace
            .links(LinkMessage::ResetLog)
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(resets, vec![Some(59), Some(174)]);
    }

    #[test]
    fn test_confirm_sync_outside_pre_full_sync_is_rejected() {
        let mut engine = engine();
        let result = engine.handle_host_request(HostRequest::ConfirmSync(SyncDecision::Decoded {
            tcr2_adjustment: 0,
        }));
        assert!(matches!(
            result,
            Err(ContractError::HostRequestRejected { .. })
        ));
        assert_eq!(engine.eng_pos(), EngPosState::Seek);
    }

    #[test]
    fn test_confirm_sync_applies_revolution_adjustment() {
        let mut engine = engine();
        drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, 117));
        assert_eq!(engine.eng_pos(), EngPosState::PreFullSync);
        let angle = engine.angle_base().tooth_angle;

        let bad = engine.handle_host_request(HostRequest::ConfirmSync(SyncDecision::Decoded {
            tcr2_adjustment: 1000,
        }));
        assert!(bad.is_err());
        assert_eq!(engine.eng_pos(), EngPosState::PreFullSync);

        let revolution = 60 * TICKS;
        let actions = engine
            .handle_host_request(HostRequest::ConfirmSync(SyncDecision::Decoded {
                tcr2_adjustment: revolution,
            }))
            .unwrap();
        assert_eq!(
            actions.interrupts().collect::<Vec<_>>(),
            vec![InterruptCause::EngPos(EngPosState::FullSync)]
        );

        let status = engine.status();
        assert_eq!(status.tooth_counter_cycle, 61);
        assert_eq!(status.tooth_angle, angle_add(angle, revolution));
        assert_eq!(
            status.eng_cycle_origin,
            status.tooth_angle.wrapping_sub(60 * TICKS) & ANGLE_MASK
        );
        assert_eq!(engine.view().snapshot().eng_pos, EngPosState::FullSync);
    }

    #[test]
    fn test_undecided_restarts_segment_at_next_gap() {
        let mut engine = engine();
        let trace = drive_with(
            &mut engine,
            &gapped_wheel(58, 2, 1000, 1, 58 * 5),
            |engine, actions| {
                if actions
                    .interrupts()
                    .any(|cause| cause == InterruptCause::EngPos(EngPosState::PreFullSync))
                {
                    let reply = engine
                        .handle_host_request(HostRequest::ConfirmSync(SyncDecision::Undecided))
                        .unwrap();
                    assert_eq!(reply.interrupts().count(), 1);
                }
            },
        );

        let pre: Vec<_> = trace
            .interrupts()
            .into_iter()
            .filter(|(_, cause)| *cause == InterruptCause::EngPos(EngPosState::PreFullSync))
            .map(|(index, _)| index)
            .collect();
        assert_eq!(pre, vec![Some(116), Some(232)]);

        let resets: Vec<_> = trace
            .links(LinkMessage::ResetLog)
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(resets, vec![Some(59), Some(174)]);
    }

    #[test]
    fn test_errata_path_holds_angle_limit_across_gap() {
        let edges = gapped_wheel(58, 2, 1000, 1, 117);

        let mut normal = engine();
        drive(&mut normal, &edges[..116]);
        assert_eq!(normal.state(), SyncState::ToothAfterGap);

        let mut errata = engine_with(CrankConfig {
            angle_errata_workaround: true,
            ..crank_config()
        });
        drive(&mut errata, &edges[..115]);
        assert_eq!(errata.state(), SyncState::ToothBeforeGapNotHrm);
        drive(&mut errata, &edges[115..116]);
        assert_eq!(errata.state(), SyncState::ToothAfterGapNotHrm);

        let mid_gap = edges[115] + 2000;
        let tooth_angle = normal.angle_base().tooth_angle;
        assert_eq!(errata.angle_base().tooth_angle, tooth_angle);
        assert_eq!(normal.view().angle_at(mid_gap), Some(tooth_angle + 2 * TICKS));
        assert_eq!(errata.view().angle_at(mid_gap), Some(tooth_angle + TICKS));

        drive(&mut normal, &edges[116..]);
        drive(&mut errata, &edges[116..]);
        assert_eq!(normal.state(), SyncState::CountingTimeout);
        assert_eq!(errata.state(), SyncState::CountingTimeout);
        assert_eq!(
            normal.angle_base().tooth_angle,
            errata.angle_base().tooth_angle
        );
    }

    #[test]
    fn test_tooth_period_log() {
        let mut engine = engine_with(CrankConfig {
            log_tooth_periods: true,
            ..crank_config()
        });
        drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, 117));

        let log = engine.status().tooth_period_log;
        assert_eq!(log.len(), 120);
        assert_eq!(log[0], 3000);
        assert_eq!(log[1], 1000);
        assert_eq!(log[57], 1000);
    }

    #[test]
    fn test_blank_time_then_blank_teeth() {
        let mut engine = engine_with(CrankConfig {
            blank_time: 5_000,
            blank_teeth: 3,
            ..crank_config()
        });
        let edges: Vec<u32> = (0..10).map(|i| 10_000 + 1000 * i).collect();

        drive(&mut engine, &edges[..8]);
        assert_eq!(engine.state(), SyncState::BlankTeeth);
        drive(&mut engine, &edges[8..9]);
        assert_eq!(engine.state(), SyncState::FirstTrans);
        drive(&mut engine, &edges[9..]);
        assert_eq!(engine.state(), SyncState::SecondTrans);
        assert!(engine.error().is_empty());
    }

    #[test]
    fn test_misuse_sets_assertion_flags() {
        let mut engine = engine();
        let actions = engine.on_edge(ToothEvent::new(100, Polarity::Rising));
        assert!(engine.error().contains(ErrorFlags::INVALID_TRANSITION));
        assert_eq!(engine.state(), SyncState::Seek);
        assert_eq!(actions.armed_window(), Some(engine.armed_window()));

        engine.on_timeout(200);
        assert!(engine.error().contains(ErrorFlags::INVALID_MATCH));

        engine.clear_error_flags(ErrorFlags::all());
        assert!(engine.error().is_empty());
    }

    #[test]
    fn test_repeated_errors_are_counted_each_time() {
        let counts = ErrorCounts::default();
        let mut engine = engine();
        metrics::with_local_recorder(&counts, || {
            engine.on_edge(ToothEvent::new(100, Polarity::Rising));
            engine.on_edge(ToothEvent::new(200, Polarity::Rising));
            engine.on_timeout(300);
        });

        assert_eq!(
            engine.error(),
            ErrorFlags::INVALID_TRANSITION | ErrorFlags::INVALID_MATCH
        );
        assert_eq!(counts.get("invalid_transition"), 2);
        assert_eq!(counts.get("invalid_match"), 1);
        assert_eq!(counts.get("stall"), 0);
    }

    #[test]
    fn test_reinitialize_from_sync_raises_seek() {
        let mut engine = engine();
        drive(&mut engine, &gapped_wheel(58, 2, 1000, 1, 80));
        assert_eq!(engine.eng_pos(), EngPosState::FirstHalfSync);

        let actions = engine.handle_host_request(HostRequest::Initialize).unwrap();
        assert_eq!(
            actions.interrupts().collect::<Vec<_>>(),
            vec![InterruptCause::EngPos(EngPosState::Seek)]
        );
        assert!(engine.trr().is_unknown());
        assert_eq!(engine.status().tooth_counter_cycle, 0);
    }
}
