// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor metadata shared by the low-precision inference kernels.
//!
//! This crate provides:
//! - [`DType`]: supported element types (f32, s32, 8-bit asymmetric, 8-bit per-channel).
//! - [`Shape`]: row-major dimension descriptors.
//! - [`TensorInfo`]: shape, element type and optional quantization of a tensor.
//! - [`QuantizationInfo`]: the immutable affine quantization descriptor.
//!
//! # Design Goals
//! - Metadata is validated once, when a kernel is configured.
//! - Kernels never own tensor memory; they operate on caller-provided slices.
//! - Clean error types via `thiserror`.

mod dtype;
mod error;
mod quantization;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use quantization::{
    ChannelMultiplier, QuantizationInfo, UniformQuantizationInfo, SIGNED_DOMAIN_SHIFT,
};
pub use shape::Shape;
pub use tensor::TensorInfo;
