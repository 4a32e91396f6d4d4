// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Direct conversion between two quantization descriptors.
//!
//! `quantize(dequantize(v, in), out)` rounds twice. The single affine form
//! used here rounds the data term once:
//!
//! ```text
//! scale  = in.scale / out.scale
//! offset = out.zero_point - round(in.zero_point * scale)
//! result = saturate(round(v * scale) + offset)
//! ```
//!
//! Rounding the offset separately makes the result differ from the
//! two-step path by at most one step.

use crate::batch::map_batched;
use crate::QuantizedElement;
use tensor_core::UniformQuantizationInfo;

/// Precomputed affine transform from one descriptor to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequantizationInfo {
    pub scale: f32,
    pub offset: i32,
}

impl RequantizationInfo {
    /// Builds the transform from `q_in` to `q_out`.
    ///
    /// # Examples
    /// ```
    /// use lowp_kernels::RequantizationInfo;
    /// use tensor_core::UniformQuantizationInfo;
    ///
    /// let q_in = UniformQuantizationInfo::new(0.5, 10);
    /// let q_out = UniformQuantizationInfo::new(0.25, 3);
    /// let r = RequantizationInfo::new(&q_in, &q_out);
    /// assert_eq!((r.scale, r.offset), (2.0, -17));
    /// ```
    pub fn new(q_in: &UniformQuantizationInfo, q_out: &UniformQuantizationInfo) -> Self {
        let scale = q_in.scale / q_out.scale;
        let shifted = (q_in.zero_point as f32 * scale).round() as i32;
        Self {
            scale,
            offset: q_out.zero_point.saturating_sub(shifted),
        }
    }

    /// Returns `true` if the transform maps every code to itself.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0
    }

    /// Applies the transform to one code.
    #[inline(always)]
    pub fn apply<Tin: QuantizedElement, Tout: QuantizedElement>(&self, value: Tin) -> Tout {
        let scaled = (value.widen() as f32 * self.scale).round() as i32;
        Tout::saturate(scaled.saturating_add(self.offset))
    }
}

/// Converts one code from `q_in` to `q_out`.
///
/// `requantize(v, q, q) == v` for every descriptor `q`.
pub fn requantize<Tin: QuantizedElement, Tout: QuantizedElement>(
    value: Tin,
    q_in: &UniformQuantizationInfo,
    q_out: &UniformQuantizationInfo,
) -> Tout {
    RequantizationInfo::new(q_in, q_out).apply(value)
}

/// Converts a span of codes, possibly between `u8` and `i8`.
///
/// # Panics
/// Panics if `src` and `dst` differ in length.
///
/// # Examples
/// ```
/// use lowp_kernels::{requantize_slice, RequantizationInfo};
/// use tensor_core::UniformQuantizationInfo;
///
/// // Same scale, zero point moved from 128 (u8) to 0 (i8).
/// let r = RequantizationInfo::new(
///     &UniformQuantizationInfo::new(0.1, 128),
///     &UniformQuantizationInfo::new(0.1, 0),
/// );
/// let mut dst = [0i8; 3];
/// requantize_slice(&[0u8, 128, 255], &r, &mut dst);
/// assert_eq!(dst, [-128, 0, 127]);
/// ```
pub fn requantize_slice<Tin: QuantizedElement, Tout: QuantizedElement>(
    src: &[Tin],
    info: &RequantizationInfo,
    dst: &mut [Tout],
) {
    let r = *info;
    map_batched(src, dst, |v| r.apply::<Tin, Tout>(v));
}
