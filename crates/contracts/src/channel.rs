//! Channel-level contracts: channel identities, the typed channel bitset, acceptance
//! windows and the actions a state-machine step hands to the hardware binding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{EngPosState, Polarity};

/// Index of a timer channel (0..32).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const MAX_CHANNELS: u8 = 32;

    /// Returns `None` when the index is outside the channel range.
    pub fn new(index: u8) -> Option<Self> {
        (index < Self::MAX_CHANNELS).then_some(Self(index))
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Set of channel indices, used as the target list of a link fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSet(u32);

impl ChannelSet {
    pub const EMPTY: ChannelSet = ChannelSet(0);

    pub fn from_channels(channels: impl IntoIterator<Item = ChannelId>) -> Self {
        let mut set = Self::EMPTY;
        for channel in channels {
            set.insert(channel);
        }
        set
    }

    pub fn insert(&mut self, channel: ChannelId) -> bool {
        let bit = 1u32 << channel.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn remove(&mut self, channel: ChannelId) -> bool {
        let bit = 1u32 << channel.index();
        let present = self.0 & bit != 0;
        self.0 &= !bit;
        present
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.0 & (1u32 << channel.index()) != 0
    }

    pub fn union(self, other: ChannelSet) -> ChannelSet {
        ChannelSet(self.0 | other.0)
    }

    pub fn intersection(self, other: ChannelSet) -> ChannelSet {
        ChannelSet(self.0 & other.0)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Channels in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        (0..ChannelId::MAX_CHANNELS)
            .filter(move |index| self.0 & (1u32 << index) != 0)
            .map(ChannelId)
    }
}

impl FromIterator<ChannelId> for ChannelSet {
    fn from_iter<T: IntoIterator<Item = ChannelId>>(iter: T) -> Self {
        Self::from_channels(iter)
    }
}

/// Inclusive transition acceptance window on the TCR1 time base.
///
/// `closes_at = None` means the window never times out. With `edges_enabled`
/// cleared the window only produces its timeout (blank time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub opens_at: u32,
    pub closes_at: Option<u32>,
    pub edges_enabled: bool,
}

impl Window {
    /// Accept any edge, never time out.
    pub fn unbounded(now: u32) -> Self {
        Self {
            opens_at: now,
            closes_at: None,
            edges_enabled: true,
        }
    }

    /// Ignore edges, time out at `at`.
    pub fn timeout_only(now: u32, at: u32) -> Self {
        Self {
            opens_at: now,
            closes_at: Some(at),
            edges_enabled: false,
        }
    }

    /// Width of a bounded window in ticks.
    pub fn width(&self) -> Option<u32> {
        self.closes_at.map(|close| close.wrapping_sub(self.opens_at))
    }

    /// Whether an edge at `time` falls inside the window (wrapping aware).
    pub fn accepts(&self, time: u32) -> bool {
        if !self.edges_enabled {
            return false;
        }
        match self.width() {
            Some(width) => time.wrapping_sub(self.opens_at) <= width,
            None => true,
        }
    }
}

/// Why the engine raised a host interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptCause {
    /// Engine position state changed to the carried value.
    EngPos(EngPosState),
    /// First tooth of a new engine cycle in full sync.
    CycleStart,
}

/// Payload of a cross-channel link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMessage {
    /// Reset the cam logger's write index.
    ResetLog,
    /// Dependent output channel must re-initialize (sent on stall).
    Reinitialize,
}

impl LinkMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResetLog => "reset_log",
            Self::Reinitialize => "reinitialize",
        }
    }
}

/// Side effect requested by one state-machine step.
///
/// Steps never touch hardware; the binding layer consumes these in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    /// Choose which edge polarity the capture unit reports.
    SelectEdge(Polarity),
    /// Replace the armed window. Cancels the previous one.
    ArmWindow(Window),
    /// Clear the transition-capture latch.
    AcknowledgeTransition,
    /// Clear the timeout-match latch.
    AcknowledgeMatch,
    RaiseInterrupt(InterruptCause),
    /// Fire-and-forget notification to other channels.
    Link {
        targets: ChannelSet,
        message: LinkMessage,
    },
}
