// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor metadata validation.

/// Errors that can occur while validating tensor metadata.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// A quantization descriptor is inconsistent with its data type.
    #[error("invalid quantization for {dtype}: {detail}")]
    InvalidQuantization {
        dtype: crate::DType,
        detail: String,
    },
}
