//! Window scheduler
//!
//! Computes the transition acceptance window for the next expected edge. Every
//! bound is wrapping arithmetic on the TCR1 time base.

use contracts::{Fract24, Window};

/// Ratios that shape the acceptance windows of one crank channel.
#[derive(Debug, Clone, Copy)]
pub struct WindowScheduler {
    pub ratio_normal: Fract24,
    pub ratio_across_gap: Fract24,
    pub ratio_after_gap: Fract24,
    pub ratio_after_timeout: Fract24,
    /// Missing teeth per gap
    pub teeth_in_gap: u32,
}

impl WindowScheduler {
    /// Window centered on `last + period`, half width `period * ratio`.
    pub fn open_normal(&self, last: u32, ratio: Fract24, period: u32) -> Window {
        let expected = last.wrapping_add(period);
        let half = ratio.mul(period);
        Window {
            opens_at: expected.wrapping_sub(half),
            closes_at: Some(expected.wrapping_add(half)),
            edges_enabled: true,
        }
    }

    /// Window that spans the gap: it opens like a normal window would and closes
    /// `ratio_across_gap` past the end of the gap.
    pub fn open_across_gap(&self, last: u32, period: u32) -> Window {
        let gap_period = period.saturating_mul(self.teeth_in_gap + 1);
        Window {
            opens_at: last
                .wrapping_add(period)
                .wrapping_sub(self.ratio_normal.mul(period)),
            closes_at: Some(
                last.wrapping_add(gap_period)
                    .wrapping_add(self.ratio_across_gap.mul(gap_period)),
            ),
            edges_enabled: true,
        }
    }

    /// Gap search window. The measured `period` may already span the gap, so it
    /// opens at `last` and closes where [`Self::open_across_gap`] would.
    pub fn open_gap_search(&self, last: u32, period: u32) -> Window {
        let gap_period = period.saturating_mul(self.teeth_in_gap + 1);
        self.close_using_ratio(last, self.ratio_across_gap, gap_period)
    }

    /// Open at `now`, close at an absolute time.
    pub fn close_at(&self, now: u32, at: u32) -> Window {
        Window {
            opens_at: now,
            closes_at: Some(at),
            edges_enabled: true,
        }
    }

    /// Open at `last`, close `period * (1 + ratio)` later.
    pub fn close_using_ratio(&self, last: u32, ratio: Fract24, period: u32) -> Window {
        Window {
            opens_at: last,
            closes_at: Some(
                last.wrapping_add(period)
                    .wrapping_add(ratio.mul(period)),
            ),
            edges_enabled: true,
        }
    }

    /// Edges ignored until `now + blank_time`, then a timeout.
    pub fn blank_time(&self, now: u32, blank_time: u32) -> Window {
        Window::timeout_only(now, now.wrapping_add(blank_time))
    }

    pub fn unbounded(&self, now: u32) -> Window {
        Window::unbounded(now)
    }
}
