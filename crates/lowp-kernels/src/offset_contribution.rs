// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Zero-point correction of raw integer matrix-multiply accumulators.
//!
//! With `a_offset = -zero_point(A)` and `b_offset = -zero_point(B)`, the
//! product of the corrected operands expands to
//!
//! ```text
//! Σ_k (A[i][k] + a_offset) * (B[k][j] + b_offset)
//!     = mm[i][j] + a_offset * col_sum[j] + b_offset * row_sum[i] + a_offset * b_offset * K
//! ```
//!
//! where `col_sum[j] = Σ_k B[k][j]` and `row_sum[i] = Σ_k A[i][k]` (see
//! [`crate::reduction`]). All sums wrap in two's complement: whenever the
//! corrected value fits in `i32`, overflow in the individual terms cancels.

use std::fmt;
use std::ops::Range;

use crate::batch::update_indexed;
use crate::{LowpError, OutputGeometry};
use tensor_core::{DType, QuantizationInfo, Shape, TensorInfo};

/// The offsets and reduction depth of one quantized matrix multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct GemmOffsets {
    pub a_offset: i32,
    pub b_offset: i32,
    /// Reduction dimension length (`K`). Always required so `k_offset` is
    /// computable.
    pub k: i32,
}

impl GemmOffsets {
    pub fn new(a_offset: i32, b_offset: i32, k: i32) -> Self {
        Self {
            a_offset,
            b_offset,
            k,
        }
    }

    /// Derives the offsets from the operands' descriptors: each offset is
    /// the negated zero point.
    pub fn from_quantization(a: &QuantizationInfo, b: &QuantizationInfo, k: i32) -> Self {
        Self::new(-a.zero_point(), -b.zero_point(), k)
    }

    /// `a_offset * b_offset * k`.
    #[inline]
    pub fn k_offset(&self) -> i32 {
        self.a_offset.wrapping_mul(self.b_offset).wrapping_mul(self.k)
    }

    pub fn variant(&self) -> OffsetVariant {
        OffsetVariant::new(self.a_offset != 0, self.b_offset != 0)
    }
}

/// Which correction terms an accumulator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetVariant {
    /// Both operands have a zero point of 0: pass-through.
    NoOffsets,
    /// Only `a_offset * col_sum`.
    AOffsetOnly,
    /// Only `b_offset * row_sum`.
    BOffsetOnly,
    /// Both terms plus `k_offset`.
    BothOffsets,
}

impl OffsetVariant {
    pub const ALL: [OffsetVariant; 4] = [
        OffsetVariant::NoOffsets,
        OffsetVariant::AOffsetOnly,
        OffsetVariant::BOffsetOnly,
        OffsetVariant::BothOffsets,
    ];

    pub fn new(has_a_offset: bool, has_b_offset: bool) -> Self {
        match (has_a_offset, has_b_offset) {
            (false, false) => OffsetVariant::NoOffsets,
            (true, false) => OffsetVariant::AOffsetOnly,
            (false, true) => OffsetVariant::BOffsetOnly,
            (true, true) => OffsetVariant::BothOffsets,
        }
    }

    /// Returns `true` if the column sums of B are read.
    pub fn uses_col_sum(self) -> bool {
        matches!(self, OffsetVariant::AOffsetOnly | OffsetVariant::BothOffsets)
    }

    /// Returns `true` if the row sums of A are read.
    pub fn uses_row_sum(self) -> bool {
        matches!(self, OffsetVariant::BOffsetOnly | OffsetVariant::BothOffsets)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OffsetVariant::NoOffsets => "no-offsets",
            OffsetVariant::AOffsetOnly => "a-offset",
            OffsetVariant::BOffsetOnly => "b-offset",
            OffsetVariant::BothOffsets => "ab-offsets",
        }
    }
}

impl fmt::Display for OffsetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precomputed reduction vectors supplied alongside the accumulators.
///
/// `col_sum` holds `cols` or `batches * cols` elements, `row_sum` holds
/// `batches * rows` elements. Both are read-only while kernels run.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetVectors<'a> {
    pub col_sum: Option<&'a [i32]>,
    pub row_sum: Option<&'a [i32]>,
}

impl<'a> OffsetVectors<'a> {
    pub fn new(col_sum: Option<&'a [i32]>, row_sum: Option<&'a [i32]>) -> Self {
        Self { col_sum, row_sum }
    }

    /// No reduction vectors, for the [`OffsetVariant::NoOffsets`] case.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Corrects one accumulator for the operands' zero points and adds the bias.
///
/// `col_sum` must be present when `a_offset != 0` and `row_sum` when
/// `b_offset != 0`. Debug builds panic on a missing sum; release builds let
/// it contribute nothing. This is the scalar reference for every configured
/// kernel.
///
/// # Examples
/// ```
/// use lowp_kernels::combine;
///
/// let r = combine(100, -10, -5, 4, Some(50), Some(80), Some(3));
/// assert_eq!(r, 100 - 500 - 400 + 200 + 3);
/// assert_eq!(combine(42, 0, 0, 7, None, None, None), 42);
/// ```
#[inline]
pub fn combine(
    acc: i32,
    a_offset: i32,
    b_offset: i32,
    k: i32,
    col_sum: Option<i32>,
    row_sum: Option<i32>,
    bias: Option<i32>,
) -> i32 {
    debug_assert!(a_offset == 0 || col_sum.is_some(), "combine: a_offset {a_offset} needs col_sum");
    debug_assert!(b_offset == 0 || row_sum.is_some(), "combine: b_offset {b_offset} needs row_sum");
    let mut result = acc;
    if a_offset != 0 {
        result = result.wrapping_add(a_offset.wrapping_mul(col_sum.unwrap_or(0)));
    }
    if b_offset != 0 {
        result = result.wrapping_add(b_offset.wrapping_mul(row_sum.unwrap_or(0)));
    }
    if a_offset != 0 && b_offset != 0 {
        result = result.wrapping_add(a_offset.wrapping_mul(b_offset).wrapping_mul(k));
    }
    if let Some(bias) = bias {
        result = result.wrapping_add(bias);
    }
    result
}

/// Per-row view of the correction inputs.
///
/// `row_term` folds `b_offset * row_sum + k_offset` so the inner loop only
/// adds the column-dependent terms.
pub(crate) struct RowTerms<'a> {
    pub(crate) col_sum: &'a [i32],
    pub(crate) bias: &'a [i32],
    pub(crate) row_term: i32,
}

/// Applies the column-dependent part of [`combine`] to one element.
///
/// The const parameters are fixed by the configured variant, so the
/// branches disappear from the compiled loop.
#[inline(always)]
pub(crate) fn corrected<const A: bool, const BIAS: bool>(
    acc: i32,
    col: usize,
    a_offset: i32,
    terms: &RowTerms<'_>,
) -> i32 {
    let mut v = acc.wrapping_add(terms.row_term);
    if A {
        v = v.wrapping_add(a_offset.wrapping_mul(terms.col_sum[col]));
    }
    if BIAS {
        v = v.wrapping_add(terms.bias[col]);
    }
    v
}

/// Validated layout of the correction inputs, shared by every kernel that
/// folds the offset contribution into its loop.
#[derive(Debug, Clone)]
pub(crate) struct OffsetPlan {
    pub(crate) geometry: OutputGeometry,
    pub(crate) offsets: GemmOffsets,
    pub(crate) variant: OffsetVariant,
    /// `col_sum` holds one vector per batch.
    pub(crate) slide_col_sum: bool,
    pub(crate) has_bias: bool,
}

impl OffsetPlan {
    /// Checks the reduction vectors and bias against the accumulator layout.
    pub(crate) fn configure(
        op: &'static str,
        mm_result: &TensorInfo,
        vector_sum_col: Option<&TensorInfo>,
        vector_sum_row: Option<&TensorInfo>,
        bias: Option<&TensorInfo>,
        offsets: GemmOffsets,
    ) -> Result<Self, LowpError> {
        if mm_result.dtype() != DType::S32 {
            return Err(LowpError::UnsupportedElementType {
                op,
                input: mm_result.dtype(),
                output: DType::S32,
            });
        }
        let geometry = OutputGeometry::from_shape(mm_result.shape());
        let variant = offsets.variant();

        let slide_col_sum = if variant.uses_col_sum() {
            let col = vector_sum_col.ok_or(LowpError::NullInput {
                op,
                tensor: "vector_sum_col",
            })?;
            check_s32(op, col)?;
            let n = col.num_elements();
            if n == geometry.cols {
                false
            } else if geometry.batches > 1 && n == geometry.batches * geometry.cols {
                true
            } else {
                return Err(LowpError::ShapeMismatch {
                    op,
                    tensor: "vector_sum_col",
                    expected: Shape::vector(geometry.cols),
                    actual: col.shape().clone(),
                });
            }
        } else {
            if vector_sum_col.is_some() {
                tracing::debug!("{op}: a_offset is 0, ignoring vector_sum_col");
            }
            false
        };

        if variant.uses_row_sum() {
            let row = vector_sum_row.ok_or(LowpError::NullInput {
                op,
                tensor: "vector_sum_row",
            })?;
            check_s32(op, row)?;
            if row.num_elements() != geometry.num_rows() {
                return Err(LowpError::ShapeMismatch {
                    op,
                    tensor: "vector_sum_row",
                    expected: Shape::vector(geometry.num_rows()),
                    actual: row.shape().clone(),
                });
            }
        } else if vector_sum_row.is_some() {
            tracing::debug!("{op}: b_offset is 0, ignoring vector_sum_row");
        }

        if let Some(bias) = bias {
            check_s32(op, bias)?;
            if bias.shape().rank() != 1 || bias.num_elements() != geometry.cols {
                return Err(LowpError::ShapeMismatch {
                    op,
                    tensor: "bias",
                    expected: Shape::vector(geometry.cols),
                    actual: bias.shape().clone(),
                });
            }
        }

        Ok(Self {
            geometry,
            offsets,
            variant,
            slide_col_sum,
            has_bias: bias.is_some(),
        })
    }

    /// Asserts that the run-time spans match the configured layout.
    pub(crate) fn check_vectors(&self, sums: &OffsetVectors<'_>, bias: Option<&[i32]>) {
        let g = &self.geometry;
        if self.variant.uses_col_sum() {
            let expected = if self.slide_col_sum {
                g.batches * g.cols
            } else {
                g.cols
            };
            let len = sums.col_sum.map(<[i32]>::len);
            assert_eq!(len, Some(expected), "col_sum does not match the configured layout");
        }
        if self.variant.uses_row_sum() {
            let len = sums.row_sum.map(<[i32]>::len);
            assert_eq!(len, Some(g.num_rows()), "row_sum does not match the configured layout");
        }
        if self.has_bias {
            assert_eq!(
                bias.map(<[i32]>::len),
                Some(g.cols),
                "bias does not match the configured layout"
            );
        }
    }

    /// Asserts that `rows` lies within the output and that a span covering
    /// exactly those rows has length `len`.
    pub(crate) fn check_rows(&self, rows: &Range<usize>, len: usize) {
        assert!(
            rows.start <= rows.end && rows.end <= self.geometry.num_rows(),
            "row range {rows:?} outside 0..{}",
            self.geometry.num_rows()
        );
        assert_eq!(
            len,
            rows.len() * self.geometry.cols,
            "span does not cover rows {rows:?}"
        );
    }

    /// Gathers the inputs needed to correct global row `row`.
    #[inline(always)]
    pub(crate) fn row_terms<'a, const A: bool, const B: bool>(
        &self,
        row: usize,
        sums: &OffsetVectors<'a>,
        bias: Option<&'a [i32]>,
    ) -> RowTerms<'a> {
        let cols = self.geometry.cols;
        let col_sum: &'a [i32] = match (A, sums.col_sum) {
            (true, Some(col)) if self.slide_col_sum => {
                let batch = self.geometry.batch_of(row);
                &col[batch * cols..(batch + 1) * cols]
            }
            (true, Some(col)) => &col[..cols],
            _ => &[],
        };
        let row_term = match (B, sums.row_sum) {
            (true, Some(row_sum)) => {
                let term = self.offsets.b_offset.wrapping_mul(row_sum[row]);
                if A {
                    term.wrapping_add(self.offsets.k_offset())
                } else {
                    term
                }
            }
            _ => 0,
        };
        RowTerms {
            col_sum,
            bias: bias.unwrap_or(&[]),
            row_term,
        }
    }
}

fn check_s32(op: &'static str, info: &TensorInfo) -> Result<(), LowpError> {
    if info.dtype() != DType::S32 {
        return Err(LowpError::UnsupportedElementType {
            op,
            input: info.dtype(),
            output: DType::S32,
        });
    }
    Ok(())
}

type CorrectFn = fn(&OffsetPlan, Range<usize>, &mut [i32], &OffsetVectors<'_>, Option<&[i32]>);

/// In-place offset contribution on an `S32` accumulator tensor.
///
/// Used by pipelines that keep 32-bit output; the quantized output stage
/// folds the same correction into [`OutputStagePipeline`](crate::OutputStagePipeline).
///
/// # Examples
/// ```
/// use lowp_kernels::{GemmOffsets, OffsetContribution, OffsetVectors};
/// use tensor_core::{DType, Shape, TensorInfo};
///
/// let mm = TensorInfo::new(Shape::matrix(1, 2), DType::S32);
/// let col = TensorInfo::new(Shape::vector(2), DType::S32);
/// let kernel = OffsetContribution::configure(
///     &mm, Some(&col), None, None, GemmOffsets::new(-1, 0, 3),
/// ).unwrap();
///
/// let mut acc = [10, 20];
/// kernel.run(&mut acc, &OffsetVectors::new(Some(&[4, 5]), None), None);
/// assert_eq!(acc, [6, 15]);
/// ```
#[derive(Clone)]
pub struct OffsetContribution {
    plan: OffsetPlan,
    kernel: CorrectFn,
}

impl fmt::Debug for OffsetContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetContribution")
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl OffsetContribution {
    const OP: &'static str = "OffsetContribution";

    /// Validates the inputs and selects the variant for `offsets`.
    ///
    /// # Errors
    /// - [`LowpError::NullInput`] if a reduction vector needed by a
    ///   non-zero offset is missing.
    /// - [`LowpError::UnsupportedElementType`] if any tensor is not `S32`.
    /// - [`LowpError::ShapeMismatch`] if a vector does not match the
    ///   accumulator layout.
    pub fn configure(
        mm_result: &TensorInfo,
        vector_sum_col: Option<&TensorInfo>,
        vector_sum_row: Option<&TensorInfo>,
        bias: Option<&TensorInfo>,
        offsets: GemmOffsets,
    ) -> Result<Self, LowpError> {
        let plan = OffsetPlan::configure(
            Self::OP,
            mm_result,
            vector_sum_col,
            vector_sum_row,
            bias,
            offsets,
        )?;
        let kernel = select_correct(plan.variant, plan.has_bias);
        tracing::debug!(
            "{}: {} over {}{}",
            Self::OP,
            plan.variant,
            plan.geometry,
            if plan.has_bias { " with bias" } else { "" }
        );
        Ok(Self { plan, kernel })
    }

    pub fn variant(&self) -> OffsetVariant {
        self.plan.variant
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.plan.geometry
    }

    /// Corrects the whole accumulator tensor in place.
    ///
    /// # Panics
    /// Panics if a span does not match the configured layout.
    pub fn run(&self, mm_result: &mut [i32], sums: &OffsetVectors<'_>, bias: Option<&[i32]>) {
        self.run_rows(0..self.plan.geometry.num_rows(), mm_result, sums, bias);
    }

    /// Corrects the global rows `rows`; `mm_result_rows` holds exactly those
    /// rows.
    ///
    /// # Panics
    /// Panics if a span does not match the configured layout.
    pub fn run_rows(
        &self,
        rows: Range<usize>,
        mm_result_rows: &mut [i32],
        sums: &OffsetVectors<'_>,
        bias: Option<&[i32]>,
    ) {
        self.plan.check_rows(&rows, mm_result_rows.len());
        self.plan.check_vectors(sums, bias);
        (self.kernel)(&self.plan, rows, mm_result_rows, sums, bias);
    }
}

fn select_correct(variant: OffsetVariant, has_bias: bool) -> CorrectFn {
    match (variant, has_bias) {
        (OffsetVariant::NoOffsets, false) => correct_rows::<false, false, false>,
        (OffsetVariant::NoOffsets, true) => correct_rows::<false, false, true>,
        (OffsetVariant::AOffsetOnly, false) => correct_rows::<true, false, false>,
        (OffsetVariant::AOffsetOnly, true) => correct_rows::<true, false, true>,
        (OffsetVariant::BOffsetOnly, false) => correct_rows::<false, true, false>,
        (OffsetVariant::BOffsetOnly, true) => correct_rows::<false, true, true>,
        (OffsetVariant::BothOffsets, false) => correct_rows::<true, true, false>,
        (OffsetVariant::BothOffsets, true) => correct_rows::<true, true, true>,
    }
}

fn correct_rows<const A: bool, const B: bool, const BIAS: bool>(
    plan: &OffsetPlan,
    rows: Range<usize>,
    mm_result_rows: &mut [i32],
    sums: &OffsetVectors<'_>,
    bias: Option<&[i32]>,
) {
    let cols = plan.geometry.cols;
    if cols == 0 || (!A && !B && !BIAS) {
        return;
    }
    let a_offset = plan.offsets.a_offset;
    for (row, acc_row) in rows.zip(mm_result_rows.chunks_exact_mut(cols)) {
        let terms = plan.row_terms::<A, B>(row, sums, bias);
        update_indexed(acc_row, |c, v| corrected::<A, BIAS>(v, c, a_offset, &terms));
    }
}
