// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Affine quantization descriptors.
//!
//! A quantized value `q` represents the real number `(q - zero_point) * scale`.
//! Descriptors are built once from validated tensor metadata and never
//! mutated afterwards; every kernel reads them through shared references.

use crate::{DType, TensorError};

/// Zero-point shift between the unsigned and signed 8-bit domains.
pub const SIGNED_DOMAIN_SHIFT: i32 = 128;

/// A fixed-point multiplier for one output channel.
///
/// `multiplier` is a Q0.31 fraction and `shift` a power-of-two exponent
/// (positive values shift right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChannelMultiplier {
    pub multiplier: i32,
    pub shift: i32,
}

impl ChannelMultiplier {
    pub fn new(multiplier: i32, shift: i32) -> Self {
        Self { multiplier, shift }
    }
}

/// The scalar `(scale, zero_point)` pair used in element-wise hot loops.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UniformQuantizationInfo {
    pub scale: f32,
    pub zero_point: i32,
}

impl UniformQuantizationInfo {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }
}

/// Quantization descriptor attached to a tensor.
///
/// Holds either a single `(scale, zero_point)` pair, or per-channel scales
/// for symmetric weights. Per-channel requantization pairs may be attached
/// with [`with_channel_multipliers`](QuantizationInfo::with_channel_multipliers).
///
/// # Examples
/// ```
/// use tensor_core::{DType, QuantizationInfo};
///
/// let q = QuantizationInfo::asymmetric(0.5, 10);
/// assert!(q.validate(DType::QAsymm8).is_ok());
/// assert_eq!(q.uniform().zero_point, 10);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuantizationInfo {
    scale: f32,
    #[serde(default)]
    zero_point: i32,
    #[serde(default)]
    symmetric: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    channel_scales: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    channel_multipliers: Vec<ChannelMultiplier>,
}

impl QuantizationInfo {
    /// Creates an asymmetric descriptor.
    pub fn asymmetric(scale: f32, zero_point: i32) -> Self {
        Self {
            scale,
            zero_point,
            symmetric: false,
            channel_scales: Vec::new(),
            channel_multipliers: Vec::new(),
        }
    }

    /// Creates a symmetric descriptor (zero point fixed at 0).
    pub fn symmetric(scale: f32) -> Self {
        Self {
            symmetric: true,
            ..Self::asymmetric(scale, 0)
        }
    }

    /// Creates a symmetric per-channel descriptor.
    ///
    /// The uniform scale reported by [`scale`](Self::scale) is the first
    /// channel's scale; an empty list yields a scale of 0, which fails
    /// validation.
    pub fn per_channel(scales: Vec<f32>) -> Self {
        Self {
            scale: scales.first().copied().unwrap_or(0.0),
            zero_point: 0,
            symmetric: true,
            channel_scales: scales,
            channel_multipliers: Vec::new(),
        }
    }

    /// Attaches per-channel fixed-point requantization pairs.
    ///
    /// An output stage configured against this descriptor requires the pairs
    /// to equal its own per-channel multipliers.
    pub fn with_channel_multipliers(mut self, multipliers: Vec<ChannelMultiplier>) -> Self {
        self.channel_multipliers = multipliers;
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zero_point(&self) -> i32 {
        self.zero_point
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Returns `true` if the descriptor carries per-channel scales or multipliers.
    pub fn is_per_channel(&self) -> bool {
        !self.channel_scales.is_empty() || !self.channel_multipliers.is_empty()
    }

    pub fn channel_scales(&self) -> &[f32] {
        &self.channel_scales
    }

    pub fn channel_multipliers(&self) -> &[ChannelMultiplier] {
        &self.channel_multipliers
    }

    /// Returns the scalar pair used by element-wise kernels.
    pub fn uniform(&self) -> UniformQuantizationInfo {
        UniformQuantizationInfo::new(self.scale, self.zero_point)
    }

    /// Checks the descriptor against the element type it describes.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidQuantization`] if a scale is not a
    /// finite positive number, the zero point is outside the representable
    /// range of `dtype`, or a symmetric descriptor has a non-zero zero point.
    pub fn validate(&self, dtype: DType) -> Result<(), TensorError> {
        let invalid = |detail: String| TensorError::InvalidQuantization { dtype, detail };

        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(invalid(format!("scale must be finite and > 0, got {}", self.scale)));
        }
        if let Some(bad) = self
            .channel_scales
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(invalid(format!("channel scale must be finite and > 0, got {bad}")));
        }
        if (self.symmetric || dtype.is_symmetric()) && self.zero_point != 0 {
            return Err(invalid(format!(
                "symmetric quantization requires zero point 0, got {}",
                self.zero_point
            )));
        }
        if let Some((lo, hi)) = dtype.quantized_range() {
            if self.zero_point < lo || self.zero_point > hi {
                return Err(invalid(format!(
                    "zero point {} outside [{lo}, {hi}]",
                    self.zero_point
                )));
            }
        }
        Ok(())
    }

    /// Re-expresses an unsigned 8-bit descriptor in the signed domain.
    ///
    /// The real values are unchanged: `q_s8 = q_u8 - 128`, so the zero point
    /// moves down by the same amount.
    pub fn to_signed_domain(&self) -> Self {
        Self {
            zero_point: self.zero_point - SIGNED_DOMAIN_SHIFT,
            ..self.clone()
        }
    }

    /// Re-expresses a signed 8-bit descriptor in the unsigned domain.
    pub fn to_unsigned_domain(&self) -> Self {
        Self {
            zero_point: self.zero_point + SIGNED_DOMAIN_SHIFT,
            ..self.clone()
        }
    }
}

impl From<UniformQuantizationInfo> for QuantizationInfo {
    fn from(q: UniformQuantizationInfo) -> Self {
        Self::asymmetric(q.scale, q.zero_point)
    }
}
