// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor metadata.

use crate::{DType, QuantizationInfo, Shape, TensorError};

/// Describes a tensor without owning its data.
///
/// Kernels validate a `TensorInfo` once at configuration time and then
/// operate on plain slices whose lengths match [`num_elements`](Self::num_elements).
///
/// # Examples
/// ```
/// use tensor_core::{DType, QuantizationInfo, Shape, TensorInfo};
///
/// let info = TensorInfo::new(Shape::matrix(2, 3), DType::QAsymm8)
///     .with_quantization(QuantizationInfo::asymmetric(0.1, 128));
/// assert_eq!(info.num_elements(), 6);
/// assert!(info.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorInfo {
    shape: Shape,
    dtype: DType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantization: Option<QuantizationInfo>,
}

impl TensorInfo {
    /// Creates metadata with no quantization descriptor.
    pub fn new(shape: Shape, dtype: DType) -> Self {
        Self {
            shape,
            dtype,
            quantization: None,
        }
    }

    /// Attaches a quantization descriptor.
    pub fn with_quantization(mut self, quantization: QuantizationInfo) -> Self {
        self.quantization = Some(quantization);
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn quantization(&self) -> Option<&QuantizationInfo> {
        self.quantization.as_ref()
    }

    /// Returns the total number of elements described.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    /// Checks that the descriptor, if any, is valid for the element type.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidQuantization`] for an invalid descriptor.
    pub fn validate(&self) -> Result<(), TensorError> {
        match &self.quantization {
            Some(q) => q.validate(self.dtype),
            None => Ok(()),
        }
    }
}
