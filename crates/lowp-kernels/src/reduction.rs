// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row and column sums of quantized operands.
//!
//! These produce the [`OffsetVectors`](crate::OffsetVectors) consumed by the
//! offset contribution: the row sums of A pair with `b_offset`, the column
//! sums of B pair with `a_offset`. Both operands are row-major.

use crate::QuantizedElement;

/// Sums each row of the `rows × k` matrix `a` into `out`, multiplying the
/// sums by `scalar` when given.
///
/// # Panics
/// Panics if `a.len() != rows * k` or `out.len() != rows`.
///
/// # Examples
/// ```
/// use lowp_kernels::matrix_a_reduction;
///
/// let a: [u8; 6] = [1, 2, 3, 4, 5, 6];
/// let mut row_sum = [0i32; 2];
/// matrix_a_reduction(&a, 2, 3, None, &mut row_sum);
/// assert_eq!(row_sum, [6, 15]);
/// ```
pub fn matrix_a_reduction<T: QuantizedElement>(
    a: &[T],
    rows: usize,
    k: usize,
    scalar: Option<i32>,
    out: &mut [i32],
) {
    assert_eq!(a.len(), rows * k, "matrix A does not hold {rows}x{k} elements");
    assert_eq!(out.len(), rows, "row_sum must hold one element per row");
    if k == 0 {
        out.fill(0);
        return;
    }

    let scalar = scalar.unwrap_or(1);
    for (sum, row) in out.iter_mut().zip(a.chunks_exact(k)) {
        let s = row.iter().fold(0i32, |acc, &v| acc.wrapping_add(v.widen()));
        *sum = s.wrapping_mul(scalar);
    }
}

/// Sums each column of the `k × cols` matrix `b` into `out`, multiplying
/// the sums by `scalar` when given.
///
/// # Panics
/// Panics if `b.len() != k * cols` or `out.len() != cols`.
pub fn matrix_b_reduction<T: QuantizedElement>(
    b: &[T],
    k: usize,
    cols: usize,
    scalar: Option<i32>,
    out: &mut [i32],
) {
    assert_eq!(b.len(), k * cols, "matrix B does not hold {k}x{cols} elements");
    assert_eq!(out.len(), cols, "col_sum must hold one element per column");
    out.fill(0);
    if cols == 0 {
        return;
    }

    // Row-wise accumulation keeps the inner loop contiguous.
    for row in b.chunks_exact(cols) {
        for (sum, &v) in out.iter_mut().zip(row) {
            *sum = sum.wrapping_add(v.widen());
        }
    }
    if let Some(scalar) = scalar {
        for sum in out.iter_mut() {
            *sum = sum.wrapping_mul(scalar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a_reduction_signed() {
        let a: [i8; 6] = [-128, 127, 1, -1, -1, -1];
        let mut out = [0; 2];
        matrix_a_reduction(&a, 2, 3, None, &mut out);
        assert_eq!(out, [0, -3]);
    }

    #[test]
    fn test_a_reduction_scalar() {
        let a = [255u8; 8];
        let mut out = [0; 2];
        matrix_a_reduction(&a, 2, 4, Some(-3), &mut out);
        assert_eq!(out, [-3060, -3060]);
    }

    #[test]
    fn test_b_reduction() {
        // 3x2 matrix.
        let b: [u8; 6] = [1, 10, 2, 20, 3, 30];
        let mut out = [0; 2];
        matrix_b_reduction(&b, 3, 2, None, &mut out);
        assert_eq!(out, [6, 60]);
        matrix_b_reduction(&b, 3, 2, Some(2), &mut out);
        assert_eq!(out, [12, 120]);
    }

    #[test]
    fn test_empty_reduction_dimension() {
        let mut out = [7; 3];
        matrix_a_reduction::<u8>(&[], 3, 0, None, &mut out);
        assert_eq!(out, [0, 0, 0]);
        matrix_b_reduction::<i8>(&[], 0, 3, None, &mut out);
        assert_eq!(out, [0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn test_a_reduction_wrong_output() {
        let mut out = [0; 3];
        matrix_a_reduction(&[1u8, 2, 3, 4], 2, 2, None, &mut out);
    }
}
