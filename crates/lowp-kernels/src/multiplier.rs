// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Derivation of fixed-point `(multiplier, shift)` pairs from real factors.

use crate::fixed_point::MAX_SHIFT;
use crate::LowpError;
use tensor_core::ChannelMultiplier;

/// Encodes a non-negative real factor as a Q0.31 multiplier and a shift.
///
/// The multiplier is normalised into `[2^30, 2^31)` so it carries 31 bits of
/// precision; the shift follows the [`rescale`](crate::fixed_point::rescale)
/// convention (positive values shift right). A zero factor encodes as
/// `(0, 0)`. Factors too small to survive a 31-bit right shift flush to
/// `(0, 0)` as well, since every accumulator would rescale to 0 anyway.
///
/// # Errors
/// Returns [`LowpError::QuantizationRange`] for negative or non-finite
/// factors, and for factors of `2^31` or more whose left shift would
/// exceed 31 bits.
///
/// # Examples
/// ```
/// use lowp_kernels::calculate_quantized_multiplier;
///
/// let m = calculate_quantized_multiplier(0.25).unwrap();
/// assert_eq!((m.multiplier, m.shift), (1 << 30, 1));
/// ```
pub fn calculate_quantized_multiplier(real: f64) -> Result<ChannelMultiplier, LowpError> {
    const OP: &str = "calculate_quantized_multiplier";

    if !real.is_finite() || real < 0.0 {
        return Err(LowpError::range(
            OP,
            format!("multiplier must be finite and >= 0, got {real}"),
        ));
    }
    if real == 0.0 {
        return Ok(ChannelMultiplier::new(0, 0));
    }

    // real = fraction * 2^exponent with fraction in [0.5, 1).
    let mut exponent = real.log2().floor() as i32 + 1;
    let mut fraction = real / 2f64.powi(exponent);
    if fraction >= 1.0 {
        fraction /= 2.0;
        exponent += 1;
    } else if fraction < 0.5 {
        fraction *= 2.0;
        exponent -= 1;
    }

    let mut q_fixed = (fraction * (1i64 << 31) as f64).round() as i64;
    if q_fixed == 1i64 << 31 {
        q_fixed /= 2;
        exponent += 1;
    }

    let shift = -exponent;
    if shift > MAX_SHIFT {
        return Ok(ChannelMultiplier::new(0, 0));
    }
    if shift < -MAX_SHIFT {
        return Err(LowpError::range(
            OP,
            format!("multiplier {real} needs a left shift of {} bits", -shift),
        ));
    }
    Ok(ChannelMultiplier::new(q_fixed as i32, shift))
}

/// Derives one pair per output channel for a convolution or matrix multiply
/// whose weights use per-channel scales: `input_scale * weight_scale[c] /
/// output_scale`.
///
/// # Errors
/// Returns [`LowpError::QuantizationRange`] if `output_scale` is not a
/// positive finite number or any derived factor cannot be encoded.
pub fn calculate_per_channel_multipliers(
    input_scale: f32,
    weight_scales: &[f32],
    output_scale: f32,
) -> Result<Vec<ChannelMultiplier>, LowpError> {
    if !(output_scale.is_finite() && output_scale > 0.0) {
        return Err(LowpError::range(
            "calculate_per_channel_multipliers",
            format!("output scale must be finite and > 0, got {output_scale}"),
        ));
    }
    weight_scales
        .iter()
        .map(|&w| {
            calculate_quantized_multiplier(input_scale as f64 * w as f64 / output_scale as f64)
        })
        .collect()
}
