// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel configuration.
//!
//! Every variant is produced while a kernel is being configured. Once a
//! kernel is configured its run methods cannot fail: all arithmetic
//! saturates.

use tensor_core::{DType, Shape, TensorError};

/// Errors reported while validating or configuring a low-precision kernel.
#[derive(Debug, thiserror::Error)]
pub enum LowpError {
    /// A tensor required by the requested configuration was not supplied.
    #[error("{op}: missing required tensor '{tensor}'")]
    NullInput {
        op: &'static str,
        tensor: &'static str,
    },

    /// The combination of input/output element types is not supported.
    #[error("{op}: unsupported element types (input {input}, output {output})")]
    UnsupportedElementType {
        op: &'static str,
        input: DType,
        output: DType,
    },

    /// A tensor's shape does not match what the operation expects.
    #[error("{op}: shape mismatch for '{tensor}': expected {expected}, got {actual}")]
    ShapeMismatch {
        op: &'static str,
        tensor: &'static str,
        expected: Shape,
        actual: Shape,
    },

    /// Bounds, scales, zero points or per-channel parameters are out of range.
    #[error("{op}: quantization range error: {detail}")]
    QuantizationRange { op: &'static str, detail: String },

    /// The rescale mode cannot be used with the rest of the configuration.
    #[error("{op}: unsupported rescale mode '{mode}': {detail}")]
    UnsupportedRescaleMode {
        op: &'static str,
        mode: &'static str,
        detail: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LowpError {
    pub(crate) fn range(op: &'static str, detail: impl Into<String>) -> Self {
        LowpError::QuantizationRange {
            op,
            detail: detail.into(),
        }
    }

    /// Reports an invalid quantization descriptor on `tensor` as a range error.
    pub(crate) fn descriptor(op: &'static str, tensor: &'static str, err: TensorError) -> Self {
        match err {
            TensorError::InvalidQuantization { dtype, detail } => {
                Self::range(op, format!("{tensor} ({dtype}): {detail}"))
            }
        }
    }
}
