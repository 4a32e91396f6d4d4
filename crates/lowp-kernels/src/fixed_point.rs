// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integer-only rescaling of 32-bit accumulators.
//!
//! A real factor `r` is encoded as a Q0.31 `multiplier` and a power-of-two
//! `shift` so that `r ≈ multiplier / 2^31 / 2^shift`. Positive shifts divide
//! with rounding, non-positive shifts multiply.
//!
//! Every rounding step in this module rounds half away from zero, on every
//! target. There is no floating point anywhere on this path.

use crate::batch::update_indexed;
use tensor_core::ChannelMultiplier;

/// Largest shift magnitude accepted by [`rescale`].
pub const MAX_SHIFT: i32 = 31;

/// Rounding doubling multiply-high: `round(a * b / 2^31)`.
///
/// The only input pair whose result does not fit in `i32` is
/// `(i32::MIN, i32::MIN)`; it saturates to `i32::MAX`.
///
/// # Examples
/// ```
/// use lowp_kernels::fixed_point::saturating_rounding_doubling_high_mul;
///
/// // 0.5 * 0.5 in Q0.31.
/// assert_eq!(saturating_rounding_doubling_high_mul(1 << 30, 1 << 30), 1 << 29);
/// assert_eq!(saturating_rounding_doubling_high_mul(i32::MIN, i32::MIN), i32::MAX);
/// ```
#[inline(always)]
pub fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == i32::MIN && b == i32::MIN {
        return i32::MAX;
    }
    let ab = a as i64 * b as i64;
    let nudge: i64 = if ab >= 0 { 1 << 30 } else { -(1 << 30) };
    // Truncating division after the signed nudge rounds half away from zero.
    ((ab + nudge) / (1i64 << 31)) as i32
}

/// Divides by `2^exponent`, rounding half away from zero.
///
/// `exponent` must lie in `0..=31`.
///
/// # Examples
/// ```
/// use lowp_kernels::fixed_point::rounding_divide_by_pow2;
///
/// assert_eq!(rounding_divide_by_pow2(5, 1), 3);
/// assert_eq!(rounding_divide_by_pow2(-5, 1), -3);
/// assert_eq!(rounding_divide_by_pow2(-4, 1), -2);
/// ```
#[inline(always)]
pub fn rounding_divide_by_pow2(x: i32, exponent: i32) -> i32 {
    debug_assert!((0..=MAX_SHIFT).contains(&exponent), "exponent {exponent} out of range");
    let mask = ((1i64 << exponent) - 1) as i32;
    let remainder = x & mask;
    let threshold = (mask >> 1) + (x < 0) as i32;
    (x >> exponent) + (remainder > threshold) as i32
}

/// Multiplies by `2^exponent`, saturating to the `i32` range.
///
/// `exponent` must lie in `0..=31`.
#[inline(always)]
pub fn saturating_left_shift(x: i32, exponent: i32) -> i32 {
    debug_assert!((0..=MAX_SHIFT).contains(&exponent), "exponent {exponent} out of range");
    let wide = (x as i64) << exponent;
    wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Rescales an accumulator by the real factor encoded in `(multiplier, shift)`.
///
/// For `shift > 0` the doubling multiply-high runs first and the result is
/// divided by `2^shift` with rounding. For `shift <= 0` the value is first
/// multiplied by `2^-shift` (saturating, exact whenever it fits) and then
/// passed through the multiply-high, so no precision is lost before the
/// single rounding step.
///
/// `rescale(0, m, s) == 0` for every valid pair.
#[inline(always)]
pub fn rescale(value: i32, multiplier: i32, shift: i32) -> i32 {
    if shift > 0 {
        rounding_divide_by_pow2(saturating_rounding_doubling_high_mul(value, multiplier), shift)
    } else {
        saturating_rounding_doubling_high_mul(saturating_left_shift(value, -shift), multiplier)
    }
}

/// Rescales every value in place with one `(multiplier, shift)` pair.
pub fn rescale_in_place(values: &mut [i32], multiplier: i32, shift: i32) {
    update_indexed(values, |_, v| rescale(v, multiplier, shift));
}

/// Rescales values laid out with channels innermost, element `i` using
/// `channels[i % channels.len()]`.
///
/// # Panics
/// Panics if `channels` is empty or `values.len()` is not a multiple of
/// the channel count.
pub fn rescale_per_channel_in_place(values: &mut [i32], channels: &[ChannelMultiplier]) {
    assert!(!channels.is_empty(), "per-channel rescale needs at least one channel");
    assert_eq!(
        values.len() % channels.len(),
        0,
        "span length is not a multiple of the channel count"
    );
    for row in values.chunks_exact_mut(channels.len()) {
        update_indexed(row, |c, v| {
            let ch = channels[c];
            rescale(v, ch.multiplier, ch.shift)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exact reference: round half away from zero of `value * m / 2^(31 + shift)`.
    fn reference(value: i32, multiplier: i32, shift: i32) -> i64 {
        let num = value as i128 * multiplier as i128;
        let den = 1i128 << (31 + shift);
        let q = num / den;
        let r = num % den;
        let adj = if 2 * r.abs() >= den { num.signum() } else { 0 };
        (q + adj) as i64
    }

    #[test]
    fn test_high_mul_rounding() {
        // 3 * 2^30 / 2^31 = 1.5 → 2, and -1.5 → -2.
        assert_eq!(saturating_rounding_doubling_high_mul(3, 1 << 30), 2);
        assert_eq!(saturating_rounding_doubling_high_mul(-3, 1 << 30), -2);
        assert_eq!(saturating_rounding_doubling_high_mul(1, 1 << 30), 1);
        assert_eq!(saturating_rounding_doubling_high_mul(-1, 1 << 30), -1);
        assert_eq!(saturating_rounding_doubling_high_mul(0, i32::MAX), 0);
    }

    #[test]
    fn test_high_mul_saturates_only_at_min_min() {
        assert_eq!(saturating_rounding_doubling_high_mul(i32::MIN, i32::MIN), i32::MAX);
        assert_eq!(saturating_rounding_doubling_high_mul(i32::MIN, i32::MAX), -i32::MAX);
        assert_eq!(saturating_rounding_doubling_high_mul(i32::MAX, i32::MAX), i32::MAX - 1);
    }

    #[test]
    fn test_rounding_divide_by_pow2() {
        assert_eq!(rounding_divide_by_pow2(6, 2), 2); // 1.5 → 2
        assert_eq!(rounding_divide_by_pow2(-6, 2), -2); // -1.5 → -2
        assert_eq!(rounding_divide_by_pow2(5, 2), 1); // 1.25 → 1
        assert_eq!(rounding_divide_by_pow2(-5, 2), -1); // -1.25 → -1
        assert_eq!(rounding_divide_by_pow2(7, 2), 2); // 1.75 → 2
        assert_eq!(rounding_divide_by_pow2(-7, 2), -2);
        assert_eq!(rounding_divide_by_pow2(123, 0), 123);
        assert_eq!(rounding_divide_by_pow2(i32::MAX, 31), 1);
        assert_eq!(rounding_divide_by_pow2(i32::MIN, 31), -1);
    }

    #[test]
    fn test_rescale_zero() {
        for &(m, s) in &[(0, 0), (1 << 30, 5), (i32::MAX, -31), (i32::MIN, 31)] {
            assert_eq!(rescale(0, m, s), 0);
        }
    }

    #[test]
    fn test_rescale_large_product_does_not_wrap() {
        // 2^30 * 0.5 / 2 = 2^28; the 2^60 intermediate lives in 64 bits.
        assert_eq!(rescale(1 << 30, 1 << 30, 1), 1 << 28);
        // A left shift that overflows saturates instead of wrapping to 0.
        assert_eq!(rescale(1 << 30, i32::MAX, -2), i32::MAX - 1);
        assert_eq!(rescale(-(1 << 30), i32::MAX, -2), -i32::MAX);
        // The one multiply-high overflow saturates to the maximum.
        assert_eq!(rescale(i32::MIN, i32::MIN, 0), i32::MAX);
    }

    #[test]
    fn test_rescale_matches_exact_reference() {
        let values = [1, -1, 7, -7, 1000, -1000, 123_456, -987_654, i32::MAX, i32::MIN + 1];
        let multipliers = [1 << 30, 1_518_500_250, 1_073_741_823, 2_147_000_000];
        for &v in &values {
            for &m in &multipliers {
                for s in 1..12 {
                    let got = rescale(v, m, s) as i64;
                    let want = reference(v, m, s);
                    // One rounding step per stage: at most one unit apart.
                    assert!((got - want).abs() <= 1, "v={v} m={m} s={s}: {got} vs {want}");
                }
            }
        }
    }

    #[test]
    fn test_rescale_left_shift() {
        // multiplier 0.5, shift -3 → ×4.
        assert_eq!(rescale(10, 1 << 30, -3), 40);
        assert_eq!(rescale(-10, 1 << 30, -3), -40);
    }

    #[test]
    fn test_rescale_in_place_matches_scalar() {
        let mut values: Vec<i32> = (-20..21).map(|v| v * 977).collect();
        let expected: Vec<i32> = values.iter().map(|&v| rescale(v, 1_300_000_000, 4)).collect();
        rescale_in_place(&mut values, 1_300_000_000, 4);
        assert_eq!(values, expected);
    }

    #[test]
    fn test_rescale_per_channel_in_place() {
        let channels = [
            ChannelMultiplier::new(1 << 30, 0),
            ChannelMultiplier::new(1 << 30, 1),
        ];
        let mut values = vec![100, 100, -100, -100];
        rescale_per_channel_in_place(&mut values, &channels);
        assert_eq!(values, vec![50, 25, -50, -25]);
    }
}
