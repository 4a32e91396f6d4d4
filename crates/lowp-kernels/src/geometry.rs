// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Accumulator layout as seen by the offset and output-stage kernels.

use std::fmt;
use tensor_core::Shape;

/// An accumulator tensor viewed as `batches × rows × cols`.
///
/// `cols` is the innermost dimension (one element per output channel).
/// For rank ≥ 3 the outermost dimension is the batch; everything in between
/// is flattened into `rows`. A convolution output `[B, D, H, N]` therefore
/// becomes `B × (D·H) × N`.
///
/// Kernels address work by *global row* `g = batch * rows + row`; the
/// elements of global row `g` are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputGeometry {
    pub batches: usize,
    pub rows: usize,
    pub cols: usize,
}

impl OutputGeometry {
    /// Derives the geometry of an accumulator shape.
    ///
    /// # Examples
    /// ```
    /// use lowp_kernels::OutputGeometry;
    /// use tensor_core::Shape;
    ///
    /// let g = OutputGeometry::from_shape(&Shape::new(vec![2, 3, 4, 8]));
    /// assert_eq!((g.batches, g.rows, g.cols), (2, 12, 8));
    /// ```
    pub fn from_shape(shape: &Shape) -> Self {
        let cols = shape.innermost();
        let batches = if shape.rank() >= 3 { shape.dims()[0] } else { 1 };
        let rows = match shape.rank() {
            0 | 1 => 1,
            2 => shape.dims()[0],
            _ => shape.dims()[1..shape.rank() - 1].iter().product(),
        };
        Self {
            batches,
            rows,
            cols,
        }
    }

    /// Total number of global rows (`batches * rows`).
    pub fn num_rows(&self) -> usize {
        self.batches * self.rows
    }

    pub fn num_elements(&self) -> usize {
        self.num_rows() * self.cols
    }

    /// Returns the batch a global row belongs to.
    #[inline(always)]
    pub fn batch_of(&self, global_row: usize) -> usize {
        global_row / self.rows.max(1)
    }
}

impl fmt::Display for OutputGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.batches, self.rows, self.cols)
    }
}
