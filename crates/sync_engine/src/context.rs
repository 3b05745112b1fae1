//! Shared angle-base context
//!
//! The engine owns the only [`AngleBasePublisher`]; collaborators receive
//! [`AngleBaseView`]s. The publisher is not `Clone`, so there is exactly one writer.

use contracts::{angle_add, elapsed, AngleBase, EngPosState, ANGLE_MASK};
use tokio::sync::watch;

use crate::time_to_angle::time_to_angle_hr;

/// Single writer of the process-wide angle base.
#[derive(Debug)]
pub struct AngleBasePublisher {
    tx: watch::Sender<AngleBase>,
}

impl AngleBasePublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AngleBase::default());
        Self { tx }
    }

    /// Replace the whole record. Readers are only woken when something changed.
    pub fn publish(&self, base: AngleBase) {
        self.tx.send_if_modified(|current| {
            if *current == base {
                false
            } else {
                *current = base;
                true
            }
        });
    }

    pub fn current(&self) -> AngleBase {
        *self.tx.borrow()
    }

    pub fn view(&self) -> AngleBaseView {
        AngleBaseView {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AngleBasePublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle on the angle base.
#[derive(Debug, Clone)]
pub struct AngleBaseView {
    rx: watch::Receiver<AngleBase>,
}

impl AngleBaseView {
    /// Copy of the whole record, taken under one borrow.
    pub fn snapshot(&self) -> AngleBase {
        *self.rx.borrow()
    }

    pub fn eng_pos(&self) -> EngPosState {
        self.rx.borrow().eng_pos
    }

    /// Interpolated angle at `now`, or `None` while the engine is seeking.
    ///
    /// The delta since the last tooth never runs past the published angle limit.
    pub fn angle_at(&self, now: u32) -> Option<u32> {
        let base = self.snapshot();
        if base.is_seeking() {
            return None;
        }
        let delta = time_to_angle_hr(elapsed(base.tooth_time, now), base.trr);
        let headroom = base.angle_limit.wrapping_sub(base.tooth_angle) & ANGLE_MASK;
        Some(angle_add(base.tooth_angle, delta.min(headroom)))
    }

    /// Angle at `now` relative to the start of the engine cycle.
    pub fn cycle_angle_at(&self, now: u32) -> Option<u32> {
        let origin = self.rx.borrow().eng_cycle_origin;
        self.angle_at(now)
            .map(|angle| angle.wrapping_sub(origin) & ANGLE_MASK)
    }

    /// Wait until the engine publishes a new record.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<AngleBase> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
