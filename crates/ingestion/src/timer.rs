//! Simulated capture timer.
//!
//! Replays a recorded edge list against the window the engine armed last, the way the
//! capture hardware would: edges outside the window are dropped, a window that closes
//! with no edge in it produces a timeout, and nothing is reported again until the
//! engine acknowledges the previous event.

use std::collections::VecDeque;
use std::sync::Arc;

use contracts::{
    ChannelAction, ChannelEvent, ChannelSet, InterruptCause, LinkMessage, Polarity, ToothEvent,
    Window,
};
use tracing::trace;

use crate::counters::CaptureMetrics;
use crate::error::{IngestionError, Result};
use crate::wheel::TraceEdge;

/// Side effects the engine asked for that the timer does not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedActions {
    pub interrupts: Vec<InterruptCause>,
    pub links: Vec<(ChannelSet, LinkMessage)>,
}

impl AppliedActions {
    pub fn is_empty(&self) -> bool {
        self.interrupts.is_empty() && self.links.is_empty()
    }
}

#[derive(Debug)]
pub struct SimCaptureTimer {
    edges: VecDeque<TraceEdge>,
    polarity: Polarity,
    window: Window,
    /// An event was delivered and the engine has not acknowledged it yet.
    awaiting_ack: bool,
    now: u64,
    metrics: Arc<CaptureMetrics>,
}

impl SimCaptureTimer {
    /// Timer over `edges`; stays silent until the first window is committed.
    pub fn new(edges: impl IntoIterator<Item = TraceEdge>) -> Self {
        Self::with_metrics(edges, Arc::new(CaptureMetrics::new()))
    }

    pub fn with_metrics(
        edges: impl IntoIterator<Item = TraceEdge>,
        metrics: Arc<CaptureMetrics>,
    ) -> Self {
        Self {
            edges: edges.into_iter().collect(),
            polarity: Polarity::Falling,
            window: Window::unbounded(0),
            awaiting_ack: true,
            now: 0,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<CaptureMetrics> {
        &self.metrics
    }

    /// Current simulated time.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn remaining(&self) -> usize {
        self.edges.len()
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Next trigger for the engine, or `None` once the trace is exhausted and the
    /// armed window never times out.
    ///
    /// # Errors
    /// Called again before the previous event was acknowledged.
    pub fn next_event(&mut self) -> Result<Option<ChannelEvent>> {
        if self.awaiting_ack {
            return Err(IngestionError::protocol(
                "event requested before the previous one was acknowledged",
            ));
        }
        let deadline = self.deadline();

        while let Some(edge) = self.edges.front().copied() {
            if deadline.is_some_and(|deadline| edge.time > deadline) {
                break;
            }
            self.edges.pop_front();
            self.now = self.now.max(edge.time);
            // TCR1 is a wrapping 32-bit counter
            let timestamp = edge.time as u32;
            if edge.polarity != self.polarity || !self.window.accepts(timestamp) {
                self.metrics.record_ignored();
                trace!(time = edge.time, "edge outside window ignored");
                continue;
            }
            self.metrics.record_delivered();
            self.awaiting_ack = true;
            return Ok(Some(ChannelEvent::Edge(ToothEvent::new(
                timestamp,
                edge.polarity,
            ))));
        }

        let Some(deadline) = deadline else {
            return Ok(None);
        };
        self.now = deadline;
        self.metrics.record_timeout();
        self.awaiting_ack = true;
        Ok(Some(ChannelEvent::Timeout {
            at: deadline as u32,
        }))
    }

    /// Consume one batch of engine actions in order.
    ///
    /// Window commits take effect on the transition acknowledge that follows them;
    /// interrupts and links are handed back to the caller.
    ///
    /// # Errors
    /// An acknowledge with no window armed earlier in the same batch.
    pub fn apply<'a>(
        &mut self,
        actions: impl IntoIterator<Item = &'a ChannelAction>,
    ) -> Result<AppliedActions> {
        let mut applied = AppliedActions::default();
        let mut staged: Option<Window> = None;

        for action in actions {
            match *action {
                ChannelAction::SelectEdge(polarity) => self.polarity = polarity,
                ChannelAction::ArmWindow(window) => staged = Some(window),
                ChannelAction::AcknowledgeTransition => {
                    let window = staged.ok_or_else(|| {
                        IngestionError::protocol("transition acknowledged before a window was armed")
                    })?;
                    self.window = window;
                    self.awaiting_ack = false;
                }
                ChannelAction::AcknowledgeMatch => {
                    if staged.is_none() {
                        return Err(IngestionError::protocol(
                            "match acknowledged before a window was armed",
                        ));
                    }
                }
                ChannelAction::RaiseInterrupt(cause) => applied.interrupts.push(cause),
                ChannelAction::Link { targets, message } => applied.links.push((targets, message)),
            }
        }
        Ok(applied)
    }

    /// Absolute close time of the armed window.
    fn deadline(&self) -> Option<u64> {
        let close = self.window.closes_at?;
        let delta = close.wrapping_sub(self.now as u32) as i32;
        Some(self.now.saturating_add_signed(i64::from(delta)).max(self.now))
    }
}
