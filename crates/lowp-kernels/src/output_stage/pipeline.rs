// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The configured output stage and its specialised kernels.

use std::fmt;
use std::ops::Range;

use rayon::prelude::*;

use super::config::OutputStageConfig;
use super::rescale::{
    FixedPointRescale, FloatingRescale, IntegerRescale, PerChannelRescale, Rescale, RescaleParams,
};
use super::strategy::{RescaleVariant, StageStrategy};
use crate::batch::map_batched_indexed;
use crate::offset_contribution::{corrected, OffsetPlan};
use crate::{GemmOffsets, LowpError, OffsetVariant, OffsetVectors, OutputGeometry, QuantizedElement};
use tensor_core::TensorInfo;

/// Row blocks handed to the rayon pool per worker thread.
const TASKS_PER_THREAD: usize = 4;

/// Tensor metadata the output stage is configured against.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptors<'a> {
    /// `S32` accumulators of the matrix multiply.
    pub mm_result: &'a TensorInfo,
    /// Column sums of B; required when `offsets.a_offset != 0`.
    pub vector_sum_col: Option<&'a TensorInfo>,
    /// Row sums of A; required when `offsets.b_offset != 0`.
    pub vector_sum_row: Option<&'a TensorInfo>,
    /// `S32` bias with one element per output channel.
    pub bias: Option<&'a TensorInfo>,
    /// 8-bit destination, same shape as `mm_result`.
    pub output: &'a TensorInfo,
    pub offsets: GemmOffsets,
}

impl<'a> StageDescriptors<'a> {
    /// Accumulators whose operands both have a zero point of 0.
    pub fn new(mm_result: &'a TensorInfo, output: &'a TensorInfo) -> Self {
        Self {
            mm_result,
            vector_sum_col: None,
            vector_sum_row: None,
            bias: None,
            output,
            offsets: GemmOffsets::default(),
        }
    }

    pub fn with_offsets(
        mut self,
        offsets: GemmOffsets,
        vector_sum_col: Option<&'a TensorInfo>,
        vector_sum_row: Option<&'a TensorInfo>,
    ) -> Self {
        self.offsets = offsets;
        self.vector_sum_col = vector_sum_col;
        self.vector_sum_row = vector_sum_row;
        self
    }

    pub fn with_bias(mut self, bias: &'a TensorInfo) -> Self {
        self.bias = Some(bias);
        self
    }
}

type StageFn<T> =
    fn(&OutputStagePipeline<T>, Range<usize>, &[i32], &OffsetVectors<'_>, Option<&[i32]>, &mut [T]);

/// A configured quantize-down stage writing `T` (`u8` or `i8`).
///
/// All validation happens in [`configure`](Self::configure). The run
/// methods only assert that the spans they are handed match the configured
/// layout; every accumulator value maps to a valid saturated output.
///
/// # Examples
/// ```
/// use lowp_kernels::{OffsetVectors, OutputStageConfig, OutputStagePipeline, StageDescriptors};
/// use tensor_core::{DType, Shape, TensorInfo};
///
/// let mm = TensorInfo::new(Shape::matrix(1, 4), DType::S32);
/// let out = TensorInfo::new(Shape::matrix(1, 4), DType::QAsymm8);
/// // Multiply by 0.5, add 10, clamp to [20, 200].
/// let config = OutputStageConfig::fixed_point(1 << 30, 0, 10, DType::QAsymm8)
///     .with_activation_bounds(20, 200);
/// let stage = OutputStagePipeline::<u8>::configure(&StageDescriptors::new(&mm, &out), &config).unwrap();
///
/// let q = stage.process(&[0, 40, 100, 1000], &OffsetVectors::none(), None);
/// assert_eq!(q, vec![20, 30, 60, 200]);
/// ```
pub struct OutputStagePipeline<T: QuantizedElement> {
    plan: OffsetPlan,
    params: RescaleParams,
    min_bound: i32,
    max_bound: i32,
    strategy: StageStrategy,
    kernel: StageFn<T>,
}

impl<T: QuantizedElement> OutputStagePipeline<T> {
    const OP: &'static str = "OutputStagePipeline";

    /// Validates every tensor and parameter and selects the kernel.
    ///
    /// # Errors
    /// Returns the first violated precondition:
    /// - [`LowpError::NullInput`] if a reduction vector needed by a
    ///   non-zero offset is missing.
    /// - [`LowpError::UnsupportedElementType`] if the accumulators, sums or
    ///   bias are not `S32`, or the output type does not match both the
    ///   configuration and `T`.
    /// - [`LowpError::ShapeMismatch`] if the output, sums or bias do not
    ///   match the accumulator layout.
    /// - [`LowpError::QuantizationRange`] / [`LowpError::UnsupportedRescaleMode`]
    ///   from [`OutputStageConfig::validate`], an invalid output or
    ///   accumulator quantization descriptor, a per-channel multiplier count
    ///   that differs from the number of output channels, or output
    ///   descriptor multipliers that disagree with the configuration.
    pub fn configure(
        inputs: &StageDescriptors<'_>,
        config: &OutputStageConfig,
    ) -> Result<Self, LowpError> {
        let op = Self::OP;
        config.validate()?;

        let output = inputs.output;
        if output.dtype() != config.output_dtype || !T::stores(output.dtype()) {
            return Err(LowpError::UnsupportedElementType {
                op,
                input: inputs.mm_result.dtype(),
                output: output.dtype(),
            });
        }
        output
            .validate()
            .map_err(|e| LowpError::descriptor(op, "output", e))?;
        inputs
            .mm_result
            .validate()
            .map_err(|e| LowpError::descriptor(op, "mm_result", e))?;
        if output.shape() != inputs.mm_result.shape() {
            return Err(LowpError::ShapeMismatch {
                op,
                tensor: "output",
                expected: inputs.mm_result.shape().clone(),
                actual: output.shape().clone(),
            });
        }

        let plan = OffsetPlan::configure(
            op,
            inputs.mm_result,
            inputs.vector_sum_col,
            inputs.vector_sum_row,
            inputs.bias,
            inputs.offsets,
        )?;

        if config.is_per_channel && config.result_multipliers.len() != plan.geometry.cols {
            return Err(LowpError::range(
                op,
                format!(
                    "{} per-channel multipliers for {} output channels",
                    config.result_multipliers.len(),
                    plan.geometry.cols
                ),
            ));
        }

        if let Some(q) = output.quantization() {
            let declared = q.channel_multipliers();
            if !declared.is_empty()
                && (!config.is_per_channel || declared != config.result_multipliers.as_slice())
            {
                return Err(LowpError::range(
                    op,
                    "output descriptor multipliers differ from the configured per-channel multipliers",
                ));
            }
        }

        if config.is_bounded_relu {
            let full = config.output_dtype.quantized_range() == Some((config.min_bound, config.max_bound));
            if full {
                tracing::warn!("{op}: bounded activation covers the full output range");
            } else if config.min_bound == config.max_bound {
                tracing::warn!(
                    "{op}: degenerate activation bounds, every output is {}",
                    config.min_bound
                );
            }
        }

        let strategy = StageStrategy::select(&inputs.offsets, config, plan.has_bias);
        tracing::info!(
            "{op}: strategy {strategy} over {} -> {}",
            plan.geometry,
            config.output_dtype
        );
        if matches!(strategy.rescale, RescaleVariant::FixedPoint | RescaleVariant::Integer) {
            tracing::debug!(
                "{op}: multiplier {}, shift {}, offset {}",
                config.result_multiplier,
                config.result_shift,
                config.result_offset
            );
        }

        Ok(Self {
            kernel: select_kernel::<T>(&strategy),
            params: RescaleParams::from_config(config),
            min_bound: config.min_bound,
            max_bound: config.max_bound,
            strategy,
            plan,
        })
    }

    /// Checks a configuration without keeping the result.
    pub fn validate(inputs: &StageDescriptors<'_>, config: &OutputStageConfig) -> Result<(), LowpError> {
        Self::configure(inputs, config).map(|_| ())
    }

    pub fn strategy(&self) -> StageStrategy {
        self.strategy
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.plan.geometry
    }

    /// Finalises the whole accumulator tensor into `output`.
    ///
    /// # Panics
    /// Panics if a span does not match the configured layout.
    pub fn run(
        &self,
        mm_result: &[i32],
        sums: &OffsetVectors<'_>,
        bias: Option<&[i32]>,
        output: &mut [T],
    ) {
        self.run_rows(0..self.plan.geometry.num_rows(), mm_result, sums, bias, output);
    }

    /// Finalises the global rows `rows`. `mm_result_rows` and `output_rows`
    /// hold exactly those rows; `sums` and `bias` are the full vectors.
    ///
    /// Disjoint row ranges may run concurrently on different threads.
    ///
    /// # Panics
    /// Panics if a span does not match the configured layout.
    pub fn run_rows(
        &self,
        rows: Range<usize>,
        mm_result_rows: &[i32],
        sums: &OffsetVectors<'_>,
        bias: Option<&[i32]>,
        output_rows: &mut [T],
    ) {
        self.plan.check_rows(&rows, mm_result_rows.len());
        self.plan.check_rows(&rows, output_rows.len());
        self.plan.check_vectors(sums, bias);
        (self.kernel)(self, rows, mm_result_rows, sums, bias, output_rows);
    }

    /// Like [`run`](Self::run), split into disjoint row blocks on the rayon
    /// pool. The output is bit-identical to `run`.
    ///
    /// # Panics
    /// Panics if a span does not match the configured layout.
    pub fn run_parallel(
        &self,
        mm_result: &[i32],
        sums: &OffsetVectors<'_>,
        bias: Option<&[i32]>,
        output: &mut [T],
    ) {
        let g = self.plan.geometry;
        let total = g.num_rows();
        self.plan.check_rows(&(0..total), mm_result.len());
        self.plan.check_rows(&(0..total), output.len());
        self.plan.check_vectors(sums, bias);
        if total == 0 || g.cols == 0 {
            return;
        }

        let rows_per_task = total
            .div_ceil(rayon::current_num_threads() * TASKS_PER_THREAD)
            .max(1);
        let chunk = rows_per_task * g.cols;
        output
            .par_chunks_mut(chunk)
            .zip(mm_result.par_chunks(chunk))
            .enumerate()
            .for_each(|(i, (out, acc))| {
                let start = i * rows_per_task;
                let rows = start..start + out.len() / g.cols;
                (self.kernel)(self, rows, acc, sums, bias, out);
            });
    }

    /// Finalises the whole accumulator tensor into a new buffer.
    pub fn process(&self, mm_result: &[i32], sums: &OffsetVectors<'_>, bias: Option<&[i32]>) -> Vec<T> {
        let mut output = vec![T::saturate(0); self.plan.geometry.num_elements()];
        self.run(mm_result, sums, bias, &mut output);
        output
    }
}

impl<T: QuantizedElement> fmt::Debug for OutputStagePipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStagePipeline")
            .field("dtype", &T::DTYPE)
            .field("strategy", &self.strategy)
            .field("geometry", &self.plan.geometry)
            .field("min_bound", &self.min_bound)
            .field("max_bound", &self.max_bound)
            .finish_non_exhaustive()
    }
}

/// Steps 3 to 5: saturate, optional clamp, narrow.
#[inline(always)]
fn finalize<T: QuantizedElement, const RELU: bool>(value: i32, min_bound: i32, max_bound: i32) -> T {
    let saturated = value.clamp(T::MIN, T::MAX);
    let bounded = if RELU {
        saturated.clamp(min_bound, max_bound)
    } else {
        saturated
    };
    T::saturate(bounded)
}

fn run_stage<T, R, const A: bool, const B: bool, const BIAS: bool, const RELU: bool>(
    stage: &OutputStagePipeline<T>,
    rows: Range<usize>,
    mm_result_rows: &[i32],
    sums: &OffsetVectors<'_>,
    bias: Option<&[i32]>,
    output_rows: &mut [T],
) where
    T: QuantizedElement,
    R: Rescale,
{
    let cols = stage.plan.geometry.cols;
    if cols == 0 {
        return;
    }
    let a_offset = stage.plan.offsets.a_offset;
    let params = &stage.params;
    let (min_bound, max_bound) = (stage.min_bound, stage.max_bound);

    let blocks = mm_result_rows
        .chunks_exact(cols)
        .zip(output_rows.chunks_exact_mut(cols));
    for (row, (acc_row, out_row)) in rows.zip(blocks) {
        let terms = stage.plan.row_terms::<A, B>(row, sums, bias);
        map_batched_indexed(acc_row, out_row, |c, acc| {
            let v = corrected::<A, BIAS>(acc, c, a_offset, &terms);
            finalize::<T, RELU>(R::apply(params, v, c), min_bound, max_bound)
        });
    }
}

fn select_kernel<T: QuantizedElement>(strategy: &StageStrategy) -> StageFn<T> {
    match strategy.rescale {
        RescaleVariant::FixedPoint => select_offsets::<T, FixedPointRescale>(strategy),
        RescaleVariant::PerChannelFixedPoint => select_offsets::<T, PerChannelRescale>(strategy),
        RescaleVariant::Floating => select_offsets::<T, FloatingRescale>(strategy),
        RescaleVariant::Integer => select_offsets::<T, IntegerRescale>(strategy),
    }
}

fn select_offsets<T: QuantizedElement, R: Rescale>(strategy: &StageStrategy) -> StageFn<T> {
    match strategy.offsets {
        OffsetVariant::NoOffsets => select_epilogue::<T, R, false, false>(strategy),
        OffsetVariant::AOffsetOnly => select_epilogue::<T, R, true, false>(strategy),
        OffsetVariant::BOffsetOnly => select_epilogue::<T, R, false, true>(strategy),
        OffsetVariant::BothOffsets => select_epilogue::<T, R, true, true>(strategy),
    }
}

fn select_epilogue<T: QuantizedElement, R: Rescale, const A: bool, const B: bool>(
    strategy: &StageStrategy,
) -> StageFn<T> {
    match (strategy.has_bias, strategy.bounded_relu) {
        (false, false) => run_stage::<T, R, A, B, false, false>,
        (false, true) => run_stage::<T, R, A, B, false, true>,
        (true, false) => run_stage::<T, R, A, B, true, false>,
        (true, true) => run_stage::<T, R, A, B, true, true>,
    }
}
