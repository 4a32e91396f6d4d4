// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # lowp-kernels
//!
//! Affine quantization and requantization kernels for 8-bit inference.
//!
//! # Key Components
//!
//! - [`quantize`] / [`dequantize`]: element-wise real ↔ code conversion,
//!   rounding half away from zero and saturating.
//! - [`fixed_point`]: integer-only rescaling by a Q0.31 multiplier and a
//!   power-of-two shift; [`calculate_quantized_multiplier`] derives the pair.
//! - [`combine`] and [`OffsetContribution`]: zero-point correction of raw
//!   matrix-multiply accumulators, fed by [`matrix_a_reduction`] and
//!   [`matrix_b_reduction`].
//! - [`OutputStagePipeline`]: correction, rescale, saturation, optional
//!   bounded activation and narrowing in one pass, per tensor or per
//!   channel.
//! - [`RequantizationInfo`]: direct conversion between two descriptors.
//!
//! # Lifecycle
//!
//! ```text
//! TensorInfo + OutputStageConfig
//!       │ configure()  ── LowpError on the first violated precondition
//!       ▼
//! OutputStagePipeline<T>   (immutable, Send + Sync)
//!       │ run() / run_rows() / run_parallel()
//!       ▼
//! &mut [T] output          (cannot fail, every value saturates)
//! ```
//!
//! # Example
//! ```
//! use lowp_kernels::{
//!     calculate_quantized_multiplier, GemmOffsets, OffsetVectors, OutputStageConfig,
//!     OutputStagePipeline, StageDescriptors,
//! };
//! use tensor_core::{DType, Shape, TensorInfo};
//!
//! // 1x2 output of a K=2 product of u8 operands with zero points 1 and 2.
//! let mm = TensorInfo::new(Shape::matrix(1, 2), DType::S32);
//! let out = TensorInfo::new(Shape::matrix(1, 2), DType::QAsymm8);
//! let col = TensorInfo::new(Shape::vector(2), DType::S32);
//! let row = TensorInfo::new(Shape::vector(1), DType::S32);
//!
//! let m = calculate_quantized_multiplier(0.5).unwrap();
//! let config = OutputStageConfig::fixed_point(m.multiplier, m.shift, 3, DType::QAsymm8);
//! let desc = StageDescriptors::new(&mm, &out)
//!     .with_offsets(GemmOffsets::new(-1, -2, 2), Some(&col), Some(&row));
//! let stage = OutputStagePipeline::<u8>::configure(&desc, &config).unwrap();
//!
//! // A = [3, 5], B = [[4, 6], [8, 2]].
//! let acc = [3 * 4 + 5 * 8, 3 * 6 + 5 * 2];
//! let sums = OffsetVectors::new(Some(&[12, 8]), Some(&[8]));
//! // (A - 1)(B - 2) = [2*2 + 4*6, 2*4 + 4*0] = [28, 8] → [14 + 3, 4 + 3].
//! assert_eq!(stage.process(&acc, &sums, None), vec![17, 7]);
//! ```

mod batch;
mod element;
mod error;
pub mod fixed_point;
mod geometry;
mod multiplier;
mod offset_contribution;
pub mod output_stage;
mod quantize;
pub mod reduction;
mod requantize;

pub use batch::BATCH_WIDTH;
pub use element::{qasymm8_signed_to_unsigned, qasymm8_to_signed, QuantizedElement};
pub use error::LowpError;
pub use geometry::OutputGeometry;
pub use multiplier::{calculate_per_channel_multipliers, calculate_quantized_multiplier};
pub use offset_contribution::{combine, GemmOffsets, OffsetContribution, OffsetVariant, OffsetVectors};
pub use output_stage::{
    OutputStageConfig, OutputStagePipeline, RescaleMode, RescaleVariant, StageDescriptors,
    StageStrategy,
};
pub use quantize::{dequantize, dequantize_per_channel, dequantize_slice, quantize, quantize_slice};
pub use reduction::{matrix_a_reduction, matrix_b_reduction};
pub use requantize::{requantize, requantize_slice, RequantizationInfo};
