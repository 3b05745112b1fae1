//! Rate estimator
//!
//! Maintains the angular velocity estimate (TRR) from normalized tooth periods.

use contracts::{Trr, INTERVAL_MAX, TRR_FRACTION_BITS};

/// Angular velocity estimator with ¾ acceleration damping.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    ticks_per_tooth: u32,
    full_clock: bool,
    last_period_norm: Option<u32>,
    trr: Trr,
}

impl RateEstimator {
    pub fn new(ticks_per_tooth: u32, full_clock: bool) -> Self {
        Self {
            ticks_per_tooth: ticks_per_tooth.max(1),
            full_clock,
            last_period_norm: None,
            trr: Trr::UNKNOWN,
        }
    }

    pub fn trr(&self) -> Trr {
        self.trr
    }

    /// Forget the history; the estimate becomes unknown.
    pub fn reset(&mut self) {
        self.last_period_norm = None;
        self.trr = Trr::UNKNOWN;
    }

    /// Fold in a new normalized tooth period and return the new estimate.
    ///
    /// The period is extrapolated by ¾ of the change since the previous call
    /// before dividing by the angle of one tooth. The first call after a reset
    /// takes the period as is.
    pub fn update(&mut self, period_norm: u32) -> Trr {
        let predicted = match self.last_period_norm {
            None => i64::from(period_norm),
            Some(previous) => {
                let acceleration = i64::from(period_norm) - i64::from(previous);
                i64::from(period_norm) + acceleration * 3 / 4
            }
        };
        self.last_period_norm = Some(period_norm);

        let predicted = predicted.clamp(1, i64::from(INTERVAL_MAX)) as u64;
        let ticks = u64::from(self.ticks_per_tooth);
        let integer = predicted / ticks;
        let fraction = ((predicted % ticks) << TRR_FRACTION_BITS) / ticks;
        let mut raw = (integer << TRR_FRACTION_BITS) + fraction;
        if self.full_clock {
            raw >>= 1;
        }

        self.trr = Trr::from_raw(u32::try_from(raw).unwrap_or(Trr::MAX_RAW));
        self.trr
    }
}
