//! Gap / tooth verifier
//!
//! Two-sided ("ABA") ratio tests. All comparisons are strict: exact equality
//! counts as "no gap".

use contracts::Fract24;

#[derive(Debug, Clone, Copy)]
pub struct AbaTest {
    gap_ratio: Fract24,
}

impl AbaTest {
    pub fn new(gap_ratio: Fract24) -> Self {
        Self { gap_ratio }
    }

    /// Test A: the current period is long against the previous one.
    pub fn is_gap(&self, period_now: u32, period_prev: u32) -> bool {
        self.gap_ratio.mul(period_now) > period_prev
    }

    /// Test B: the tooth after a gap candidate is short against the gap.
    pub fn confirms_gap(&self, period_gap: u32, period_now: u32) -> bool {
        self.gap_ratio.mul(period_gap) > period_now
    }

    /// The current period is short against the previous one: an inserted tooth.
    pub fn is_additional_tooth(&self, period_prev: u32, period_now: u32) -> bool {
        self.gap_ratio.mul(period_prev) > period_now
    }

    /// The remainder after an inserted tooth is short against the period before it.
    pub fn confirms_additional_tooth(&self, period_before: u32, period_now: u32) -> bool {
        self.gap_ratio.mul(period_before) > period_now
    }
}
