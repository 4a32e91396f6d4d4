// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantize-down output stage for 32-bit matrix-multiply accumulators.
//!
//! Per element, in order:
//!
//! 1. **Correct** for the operands' zero points and add the bias.
//! 2. **Rescale** with the configured [`RescaleMode`], per tensor or per
//!    output channel.
//! 3. **Saturate** to the destination's full range.
//! 4. **Clamp** to `[min_bound, max_bound]` when bounded activation is on.
//! 5. **Narrow** to the 8-bit destination type.
//!
//! Configuration picks one specialised kernel ([`StageStrategy`]); running
//! it cannot fail.

pub mod config;
mod pipeline;
mod rescale;
pub mod strategy;

pub use config::{OutputStageConfig, RescaleMode};
pub use pipeline::{OutputStagePipeline, StageDescriptors};
pub use strategy::{RescaleVariant, StageStrategy};
