//! Fixed-point scalars shared by the engine and its consumers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mask of the 24-bit angle counter.
pub const ANGLE_MASK: u32 = 0x00FF_FFFF;

/// Largest time interval the converters and window arithmetic accept.
pub const INTERVAL_MAX: u32 = 0x00FF_FFFF;

/// Number of fraction bits carried by [`Trr`].
pub const TRR_FRACTION_BITS: u32 = 9;

/// Unsigned fraction with 24 fraction bits (Q8.24).
///
/// Window and gap ratios are held in this form so every comparison on the
/// per-tooth path stays in integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fract24(u32);

impl Fract24 {
    pub const FRACTION_BITS: u32 = 24;
    pub const ONE: Fract24 = Fract24(1 << Self::FRACTION_BITS);
    pub const ZERO: Fract24 = Fract24(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Convert from a floating point ratio, rounding to nearest and clamping to the
    /// representable range.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        let scaled = (value * f64::from(1u32 << Self::FRACTION_BITS)).round();
        if scaled >= f64::from(u32::MAX) {
            Self(u32::MAX)
        } else {
            Self(scaled as u32)
        }
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / f64::from(1u32 << Self::FRACTION_BITS)
    }

    /// Multiply an unsigned integer by this fraction, rounding to nearest.
    /// Saturates at `u32::MAX`.
    pub fn mul(self, value: u32) -> u32 {
        let wide = u64::from(value) * u64::from(self.0) + (1 << (Self::FRACTION_BITS - 1));
        u32::try_from(wide >> Self::FRACTION_BITS).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for Fract24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

/// Angular velocity estimate: TCR1 ticks per TCR2 tick, Q15.9 in 24 bits.
///
/// Never zero. [`Trr::UNKNOWN`] (the largest representable magnitude) marks
/// "no estimate", which makes every converted angle collapse towards zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trr(u32);

impl Trr {
    pub const MAX_RAW: u32 = 0x00FF_FFFF;
    pub const UNKNOWN: Trr = Trr(Self::MAX_RAW);

    /// Build from a raw Q15.9 value, clamped into `1..=MAX_RAW`.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw.clamp(1, Self::MAX_RAW))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    /// Integer part: whole TCR1 ticks per angle tick.
    pub const fn integer(self) -> u32 {
        self.0 >> TRR_FRACTION_BITS
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / f64::from(1u32 << TRR_FRACTION_BITS)
    }
}

impl Default for Trr {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Trr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("unknown")
        } else {
            write!(f, "{:.3}", self.to_f64())
        }
    }
}

/// Wrapping difference `later - earlier` on the TCR1 time base.
#[inline]
pub fn elapsed(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Add two angles on the 24-bit angle counter.
#[inline]
pub fn angle_add(angle: u32, delta: u32) -> u32 {
    angle.wrapping_add(delta) & ANGLE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fract24_from_f64_rounds() {
        assert_eq!(Fract24::from_f64(0.5).raw(), 1 << 23);
        assert_eq!(Fract24::from_f64(1.0), Fract24::ONE);
        assert_eq!(Fract24::from_f64(-1.0), Fract24::ZERO);
        assert_eq!(Fract24::from_f64(f64::NAN), Fract24::ZERO);
    }

    #[test]
    fn test_fract24_mul() {
        let quarter = Fract24::from_f64(0.25);
        assert_eq!(quarter.mul(1000), 250);
        assert_eq!(Fract24::ONE.mul(12345), 12345);
        assert_eq!(Fract24::from_f64(2.0).mul(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_trr_never_zero() {
        assert_eq!(Trr::from_raw(0).raw(), 1);
        assert_eq!(Trr::from_raw(u32::MAX), Trr::UNKNOWN);
        assert!(Trr::default().is_unknown());
    }

    #[test]
    fn test_trr_integer_part() {
        let trr = Trr::from_raw(1000 << TRR_FRACTION_BITS | 256);
        assert_eq!(trr.integer(), 1000);
        assert!((trr.to_f64() - 1000.5).abs() < 1e-9);
    }

    #[test]
    fn test_wrapping_helpers() {
        assert_eq!(elapsed(u32::MAX - 9, 10), 20);
        assert_eq!(angle_add(ANGLE_MASK, 2), 1);
    }
}
