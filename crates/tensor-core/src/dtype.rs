// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

/// Enumerates the element types that flow through the low-precision kernels.
///
/// The kernels use `DType` to validate input/output combinations at
/// configuration time and to pick the saturation range of the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 32-bit signed integer (matrix-multiply accumulators, bias, offset sums).
    S32,
    /// 8-bit unsigned asymmetric quantized, range `[0, 255]`.
    QAsymm8,
    /// 8-bit signed asymmetric quantized, range `[-128, 127]`.
    QAsymm8Signed,
    /// 8-bit signed symmetric quantized with one scale per channel.
    QSymm8PerChannel,
}

impl DType {
    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::S32 => "s32",
            DType::QAsymm8 => "qasymm8",
            DType::QAsymm8Signed => "qasymm8_signed",
            DType::QSymm8PerChannel => "qsymm8_per_channel",
        }
    }

    /// Returns `true` if the quantized type has a signed integer representation.
    pub fn is_signed_quantized(self) -> bool {
        matches!(self, DType::QAsymm8Signed | DType::QSymm8PerChannel)
    }

    /// Returns `true` if the type requires a zero point of exactly 0.
    pub fn is_symmetric(self) -> bool {
        matches!(self, DType::QSymm8PerChannel)
    }

    /// Returns the inclusive integer range representable by a quantized type,
    /// or `None` for non-quantized types.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::DType;
    /// assert_eq!(DType::QAsymm8.quantized_range(), Some((0, 255)));
    /// assert_eq!(DType::QAsymm8Signed.quantized_range(), Some((-128, 127)));
    /// assert_eq!(DType::F32.quantized_range(), None);
    /// ```
    pub fn quantized_range(self) -> Option<(i32, i32)> {
        match self {
            DType::QAsymm8 => Some((u8::MIN as i32, u8::MAX as i32)),
            DType::QAsymm8Signed | DType::QSymm8PerChannel => {
                Some((i8::MIN as i32, i8::MAX as i32))
            }
            DType::F32 | DType::S32 => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
