// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise conversion between real values and quantized codes.
//!
//! `quantize` computes `round(x / scale) + zero_point` with
//! round-half-away-from-zero and saturates to the destination range.
//! `dequantize` computes `(q - zero_point) * scale` exactly.

use crate::batch::map_batched;
use crate::QuantizedElement;
use tensor_core::UniformQuantizationInfo;

/// Quantizes a real value.
///
/// Out-of-range inputs saturate to `[T::MIN, T::MAX]`. Non-finite inputs
/// have no meaningful result.
///
/// # Examples
/// ```
/// use lowp_kernels::quantize;
/// use tensor_core::UniformQuantizationInfo;
///
/// let q = UniformQuantizationInfo::new(0.5, 10);
/// assert_eq!(quantize::<u8>(5.0, &q), 20);
/// assert_eq!(quantize::<u8>(1000.0, &q), 255);
/// ```
#[inline(always)]
pub fn quantize<T: QuantizedElement>(value: f32, qinfo: &UniformQuantizationInfo) -> T {
    // f32::round rounds half away from zero; the float-to-int cast saturates.
    let steps = (value / qinfo.scale).round() as i32;
    T::saturate(steps.saturating_add(qinfo.zero_point))
}

/// Dequantizes a code back to its real value.
#[inline(always)]
pub fn dequantize<T: QuantizedElement>(value: T, qinfo: &UniformQuantizationInfo) -> f32 {
    (value.widen() - qinfo.zero_point) as f32 * qinfo.scale
}

/// Quantizes a span of real values.
///
/// # Panics
/// Panics if `src` and `dst` differ in length.
pub fn quantize_slice<T: QuantizedElement>(
    src: &[f32],
    qinfo: &UniformQuantizationInfo,
    dst: &mut [T],
) {
    let q = *qinfo;
    map_batched(src, dst, |v| quantize::<T>(v, &q));
}

/// Dequantizes a span of codes.
///
/// # Panics
/// Panics if `src` and `dst` differ in length.
pub fn dequantize_slice<T: QuantizedElement>(
    src: &[T],
    qinfo: &UniformQuantizationInfo,
    dst: &mut [f32],
) {
    let q = *qinfo;
    map_batched(src, dst, |v| dequantize(v, &q));
}

/// Dequantizes symmetric per-channel data laid out with channels innermost.
///
/// Element `i` uses `scales[i % scales.len()]`.
///
/// # Panics
/// Panics if the spans differ in length, `scales` is empty, or the span
/// length is not a multiple of the channel count.
pub fn dequantize_per_channel(src: &[i8], scales: &[f32], dst: &mut [f32]) {
    assert_eq!(src.len(), dst.len(), "source and destination spans differ in length");
    assert!(!scales.is_empty(), "per-channel dequantization needs at least one scale");
    assert_eq!(
        src.len() % scales.len(),
        0,
        "span length is not a multiple of the channel count"
    );

    for (s_row, d_row) in src.chunks_exact(scales.len()).zip(dst.chunks_exact_mut(scales.len())) {
        for ((d, &s), &scale) in d_row.iter_mut().zip(s_row).zip(scales) {
            *d = s as f32 * scale;
        }
    }
}
