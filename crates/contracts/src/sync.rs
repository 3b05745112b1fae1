//! Synchronization state contracts
//!
//! Per-channel [`SyncState`], process-wide [`EngPosState`], sticky [`ErrorFlags`]
//! and the two triggers a channel step reacts to.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one crank channel's synchronization state machine.
///
/// The gapped wheel walks SEEK → BLANK_TIME → BLANK_TEETH → FIRST_TRANS →
/// SECOND_TRANS → TEST_POSSIBLE_GAP → VERIFY_GAP → COUNTING. The additional-tooth
/// wheel reuses the same states with the inserted tooth in place of the gap and
/// adds [`SyncState::AdditionalTooth`] while the extra edge is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Seek,
    BlankTime,
    BlankTeeth,
    FirstTrans,
    SecondTrans,
    TestPossibleGap,
    VerifyGap,
    Counting,
    CountingTimeout,
    ToothBeforeGap,
    ToothBeforeGapNotHrm,
    ToothAfterGap,
    ToothAfterGapNotHrm,
    AdditionalTooth,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seek => "seek",
            Self::BlankTime => "blank_time",
            Self::BlankTeeth => "blank_teeth",
            Self::FirstTrans => "first_trans",
            Self::SecondTrans => "second_trans",
            Self::TestPossibleGap => "test_possible_gap",
            Self::VerifyGap => "verify_gap",
            Self::Counting => "counting",
            Self::CountingTimeout => "counting_timeout",
            Self::ToothBeforeGap => "tooth_before_gap",
            Self::ToothBeforeGapNotHrm => "tooth_before_gap_not_hrm",
            Self::ToothAfterGap => "tooth_after_gap",
            Self::ToothAfterGapNotHrm => "tooth_after_gap_not_hrm",
            Self::AdditionalTooth => "additional_tooth",
        }
    }

    /// True once a gap (or additional tooth) has been confirmed and teeth are counted.
    pub fn is_counting(&self) -> bool {
        matches!(
            self,
            Self::Counting
                | Self::CountingTimeout
                | Self::ToothBeforeGap
                | Self::ToothBeforeGapNotHrm
                | Self::ToothAfterGap
                | Self::ToothAfterGapNotHrm
                | Self::AdditionalTooth
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide engine position state.
///
/// Only the synchronization engine writes it. It advances along the declared order
/// and falls back to [`EngPosState::Seek`] on stall.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EngPosState {
    #[default]
    Seek,
    FirstHalfSync,
    PreFullSync,
    FullSync,
}

impl EngPosState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seek => "seek",
            Self::FirstHalfSync => "first_half_sync",
            Self::PreFullSync => "pre_full_sync",
            Self::FullSync => "full_sync",
        }
    }
}

impl fmt::Display for EngPosState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Sticky error bits, OR-accumulated by the engine and cleared only by the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ErrorFlags: u32 {
        /// Edge delivered in a state that does not accept edges.
        const INVALID_TRANSITION = 1 << 0;
        /// Timeout delivered in a state that never arms one.
        const INVALID_MATCH = 1 << 1;
        const TIMEOUT = 1 << 2;
        const TIMEOUT_BEFORE_GAP = 1 << 3;
        const TIMEOUT_AFTER_GAP = 1 << 4;
        /// Gap test failed after the window was armed for the gap.
        const TOOTH_IN_GAP = 1 << 5;
        const ADDITIONAL_TOOTH_NOT_FOUND = 1 << 6;
        const STALL = 1 << 7;
        /// Unreachable state/wheel combination.
        const INTERNAL = 1 << 8;
    }
}

impl ErrorFlags {
    const LABELS: [(ErrorFlags, &'static str); 9] = [
        (Self::INVALID_TRANSITION, "invalid_transition"),
        (Self::INVALID_MATCH, "invalid_match"),
        (Self::TIMEOUT, "timeout"),
        (Self::TIMEOUT_BEFORE_GAP, "timeout_before_gap"),
        (Self::TIMEOUT_AFTER_GAP, "timeout_after_gap"),
        (Self::TOOTH_IN_GAP, "tooth_in_gap"),
        (Self::ADDITIONAL_TOOTH_NOT_FOUND, "additional_tooth_not_found"),
        (Self::STALL, "stall"),
        (Self::INTERNAL, "internal"),
    ];

    /// Labels of every set flag, in bit order.
    pub fn labels(self) -> impl Iterator<Item = &'static str> {
        Self::LABELS
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
    }
}

/// Edge polarity selected by the host mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Falling,
    Rising,
}

/// A captured tooth edge. Consumed once per state-machine step, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToothEvent {
    /// TCR1 capture time
    pub timestamp: u32,
    pub polarity: Polarity,
}

impl ToothEvent {
    pub fn new(timestamp: u32, polarity: Polarity) -> Self {
        Self {
            timestamp,
            polarity,
        }
    }
}

/// The two mutually exclusive triggers of a channel step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A transition captured inside the armed window.
    Edge(ToothEvent),
    /// The armed window closed with no edge; carries the match time.
    Timeout { at: u32 },
}
