// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rescale paths of the output stage.

use super::config::OutputStageConfig;
use crate::fixed_point::rescale;
use tensor_core::ChannelMultiplier;

/// Scalars and per-channel pairs read by every rescale path.
#[derive(Debug, Clone)]
pub(crate) struct RescaleParams {
    multiplier: i32,
    shift: i32,
    offset: i32,
    real_multiplier: f32,
    real_offset: f32,
    channels: Vec<ChannelMultiplier>,
}

impl RescaleParams {
    pub(crate) fn from_config(config: &OutputStageConfig) -> Self {
        Self {
            multiplier: config.result_multiplier,
            shift: config.result_shift,
            offset: config.result_offset,
            real_multiplier: config.result_real_multiplier,
            real_offset: config.result_offset as f32,
            channels: config.result_multipliers.clone(),
        }
    }
}

/// Maps a corrected accumulator to the unclamped output domain.
///
/// Implementors are zero-sized markers; the kernel is monomorphised per
/// implementor so the choice costs nothing per element.
pub(crate) trait Rescale: Send + Sync + 'static {
    fn apply(params: &RescaleParams, value: i32, channel: usize) -> i32;
}

pub(crate) struct FixedPointRescale;

impl Rescale for FixedPointRescale {
    #[inline(always)]
    fn apply(p: &RescaleParams, value: i32, _channel: usize) -> i32 {
        rescale(value, p.multiplier, p.shift).saturating_add(p.offset)
    }
}

/// Symmetric output: no offset is added.
pub(crate) struct PerChannelRescale;

impl Rescale for PerChannelRescale {
    #[inline(always)]
    fn apply(p: &RescaleParams, value: i32, channel: usize) -> i32 {
        let ch = p.channels[channel];
        rescale(value, ch.multiplier, ch.shift)
    }
}

pub(crate) struct FloatingRescale;

impl Rescale for FloatingRescale {
    #[inline(always)]
    fn apply(p: &RescaleParams, value: i32, _channel: usize) -> i32 {
        // Rounds half away from zero; the cast saturates.
        (value as f32 * p.real_multiplier + p.real_offset).round() as i32
    }
}

pub(crate) struct IntegerRescale;

impl Rescale for IntegerRescale {
    #[inline(always)]
    fn apply(p: &RescaleParams, value: i32, _channel: usize) -> i32 {
        value.saturating_add(p.offset).saturating_mul(p.multiplier) >> p.shift
    }
}
