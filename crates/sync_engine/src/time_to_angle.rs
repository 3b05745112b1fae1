//! TimeToAngle converter
//!
//! Converts a TCR1 interval into a TCR2 angle delta using the angular velocity
//! estimate. Both tiers are pure; the estimate carries [`TRR_FRACTION_BITS`]
//! fraction bits, so `angle = time * 2^9 / trr`.

use contracts::{Trr, ANGLE_MASK, INTERVAL_MAX, TRR_FRACTION_BITS};

/// Fraction bits kept by the low resolution tier.
pub const LOW_RES_SHIFT: u32 = 4;

/// Doubled saturation bound; the extra low bit is the rounding bit.
const ROUND_LIMIT: u32 = (ANGLE_MASK << 1) | 1;

/// High resolution conversion, rounded to nearest (half up).
///
/// Long division in 32-bit registers: the integer quotient first, then the
/// fraction bits (plus one rounding bit) brought in as wide a chunk at a time as
/// the remainder leaves room for. Saturates at [`ANGLE_MASK`].
pub fn time_to_angle_hr(time: u32, trr: Trr) -> u32 {
    let time = time & INTERVAL_MAX;
    let divisor = trr.raw();

    let mut quotient = time / divisor;
    let mut remainder = time % divisor;
    let mut pending = TRR_FRACTION_BITS + 1;

    while pending > 0 {
        if quotient > ROUND_LIMIT >> pending {
            return ANGLE_MASK;
        }
        let step = pending.min(remainder.leading_zeros());
        let widened = remainder << step;
        quotient = (quotient << step) | (widened / divisor);
        remainder = widened % divisor;
        pending -= step;
    }

    ((quotient + 1) >> 1).min(ANGLE_MASK)
}

/// Low resolution conversion: one shift and one divide, truncating.
///
/// Only [`LOW_RES_SHIFT`] fraction bits of the estimate survive, so the result may be
/// off by several ticks. Meant for look-ahead scheduling.
pub fn time_to_angle_lr(time: u32, trr: Trr) -> u32 {
    let divisor = (trr.raw() >> (TRR_FRACTION_BITS - LOW_RES_SHIFT)).max(1);
    (((time & INTERVAL_MAX) << LOW_RES_SHIFT) / divisor).min(ANGLE_MASK)
}

/// Inverse conversion, rounded to nearest. Saturates at `u32::MAX`.
pub fn angle_to_time(angle: u32, trr: Trr) -> u32 {
    let wide = (u64::from(angle & ANGLE_MASK) * u64::from(trr.raw())
        + (1 << (TRR_FRACTION_BITS - 1)))
        >> TRR_FRACTION_BITS;
    u32::try_from(wide).unwrap_or(u32::MAX)
}
