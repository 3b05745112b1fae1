//! Per-step action collector.

use contracts::{ChannelAction, ChannelSet, InterruptCause, LinkMessage, Polarity, Window};

/// Ordered list of [`ChannelAction`]s produced by one engine step.
///
/// Latches can only be acknowledged through [`StepActions::commit_window`], which
/// always emits the new window first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepActions {
    actions: Vec<ChannelAction>,
}

impl StepActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `window`, then clear both latches.
    pub(crate) fn commit_window(&mut self, window: Window) {
        self.actions.push(ChannelAction::ArmWindow(window));
        self.actions.push(ChannelAction::AcknowledgeTransition);
        self.actions.push(ChannelAction::AcknowledgeMatch);
    }

    pub(crate) fn select_edge(&mut self, polarity: Polarity) {
        self.actions.push(ChannelAction::SelectEdge(polarity));
    }

    pub(crate) fn raise(&mut self, cause: InterruptCause) {
        self.actions.push(ChannelAction::RaiseInterrupt(cause));
    }

    /// No-op for an empty target set.
    pub(crate) fn link(&mut self, targets: ChannelSet, message: LinkMessage) {
        if !targets.is_empty() {
            self.actions.push(ChannelAction::Link { targets, message });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelAction> {
        self.actions.iter()
    }

    pub fn as_slice(&self) -> &[ChannelAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Interrupts raised by this step.
    pub fn interrupts(&self) -> impl Iterator<Item = InterruptCause> + '_ {
        self.actions.iter().filter_map(|action| match action {
            ChannelAction::RaiseInterrupt(cause) => Some(*cause),
            _ => None,
        })
    }

    /// Link messages sent by this step.
    pub fn links(&self) -> impl Iterator<Item = (ChannelSet, LinkMessage)> + '_ {
        self.actions.iter().filter_map(|action| match action {
            ChannelAction::Link { targets, message } => Some((*targets, *message)),
            _ => None,
        })
    }

    /// The window armed by this step, if any (the last one wins).
    pub fn armed_window(&self) -> Option<Window> {
        self.actions.iter().rev().find_map(|action| match action {
            ChannelAction::ArmWindow(window) => Some(*window),
            _ => None,
        })
    }
}

impl IntoIterator for StepActions {
    type Item = ChannelAction;
    type IntoIter = std::vec::IntoIter<ChannelAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a StepActions {
    type Item = &'a ChannelAction;
    type IntoIter = std::slice::Iter<'a, ChannelAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
