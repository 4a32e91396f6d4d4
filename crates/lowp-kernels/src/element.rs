// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantized element types and the signed/unsigned 8-bit domain conversion.

use tensor_core::{DType, SIGNED_DOMAIN_SHIFT};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for i8 {}
}

/// An 8-bit storage type that kernels can read from and write to.
///
/// Implemented for `u8` ([`DType::QAsymm8`]) and `i8`
/// ([`DType::QAsymm8Signed`], [`DType::QSymm8PerChannel`]).
pub trait QuantizedElement: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Canonical data type for this storage type.
    const DTYPE: DType;
    /// Smallest representable value, widened.
    const MIN: i32;
    /// Largest representable value, widened.
    const MAX: i32;

    /// Clamps `value` to `[MIN, MAX]` and narrows it.
    fn saturate(value: i32) -> Self;

    /// Widens the element to `i32` without changing its value.
    fn widen(self) -> i32;

    /// Returns `true` if tensors of `dtype` are stored as `Self`.
    fn stores(dtype: DType) -> bool {
        dtype == Self::DTYPE
    }
}

impl QuantizedElement for u8 {
    const DTYPE: DType = DType::QAsymm8;
    const MIN: i32 = u8::MIN as i32;
    const MAX: i32 = u8::MAX as i32;

    #[inline(always)]
    fn saturate(value: i32) -> Self {
        value.clamp(<Self as QuantizedElement>::MIN, <Self as QuantizedElement>::MAX) as u8
    }

    #[inline(always)]
    fn widen(self) -> i32 {
        self as i32
    }
}

impl QuantizedElement for i8 {
    const DTYPE: DType = DType::QAsymm8Signed;
    const MIN: i32 = i8::MIN as i32;
    const MAX: i32 = i8::MAX as i32;

    #[inline(always)]
    fn saturate(value: i32) -> Self {
        value.clamp(<Self as QuantizedElement>::MIN, <Self as QuantizedElement>::MAX) as i8
    }

    #[inline(always)]
    fn widen(self) -> i32 {
        self as i32
    }

    fn stores(dtype: DType) -> bool {
        matches!(dtype, DType::QAsymm8Signed | DType::QSymm8PerChannel)
    }
}

/// Moves an unsigned 8-bit code into the signed domain (`q - 128`).
///
/// Paired with [`tensor_core::QuantizationInfo::to_signed_domain`], the
/// represented real value is unchanged.
#[inline(always)]
pub fn qasymm8_to_signed(value: u8) -> i8 {
    (value as i32 - SIGNED_DOMAIN_SHIFT) as i8
}

/// Moves a signed 8-bit code into the unsigned domain (`q + 128`).
#[inline(always)]
pub fn qasymm8_signed_to_unsigned(value: i8) -> u8 {
    (value as i32 + SIGNED_DOMAIN_SHIFT) as u8
}
