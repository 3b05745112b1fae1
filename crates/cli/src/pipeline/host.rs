//! Scripted host - answers the PRE_FULL_SYNC interrupt the way the host CPU would.

use contracts::{EngPosState, HostConfig, HostRequest, InterruptCause, SyncDecision};

/// Plays the host side of the Confirm-Sync handshake from a [`HostConfig`].
///
/// After a PRE_FULL_SYNC interrupt it waits `respond_after_teeth` teeth, replies
/// `Undecided` for the first `undecided_replies` decodes, then supplies the configured
/// adjustment. Without an adjustment it never replies.
#[derive(Debug, Clone)]
pub struct ScriptedHost {
    config: HostConfig,
    /// Teeth left before the pending reply; `None` while nothing is pending
    countdown: Option<u32>,
    undecided_left: u32,
}

impl ScriptedHost {
    pub fn new(config: HostConfig) -> Self {
        let undecided_left = config.undecided_replies;
        Self {
            config,
            countdown: None,
            undecided_left,
        }
    }

    pub fn on_interrupt(&mut self, cause: InterruptCause) {
        match cause {
            InterruptCause::EngPos(EngPosState::PreFullSync) => {
                if self.config.tcr2_adjustment.is_some() {
                    self.countdown = Some(self.config.respond_after_teeth);
                }
            }
            // any other position change cancels the decode
            InterruptCause::EngPos(_) => self.countdown = None,
            InterruptCause::CycleStart => {}
        }
    }

    /// Called once per captured tooth, after the interrupts of that step.
    pub fn on_tooth(&mut self) -> Option<HostRequest> {
        let remaining = self.countdown?;
        if remaining > 0 {
            self.countdown = Some(remaining - 1);
            return None;
        }
        self.countdown = None;

        let tcr2_adjustment = self.config.tcr2_adjustment?;
        let decision = if self.undecided_left > 0 {
            self.undecided_left -= 1;
            SyncDecision::Undecided
        } else {
            SyncDecision::Decoded { tcr2_adjustment }
        };
        Some(HostRequest::ConfirmSync(decision))
    }

    pub fn is_pending(&self) -> bool {
        self.countdown.is_some()
    }
}
