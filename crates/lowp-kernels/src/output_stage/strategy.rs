// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution strategy of a configured output stage.
//!
//! The strategy is derived once from the offsets and the configuration and
//! picks one monomorphised kernel. Nothing here is consulted per element.

use std::fmt;

use super::config::{OutputStageConfig, RescaleMode};
use crate::{GemmOffsets, OffsetVariant};

/// The rescale path compiled into a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RescaleVariant {
    FixedPoint,
    /// Fixed point with one `(multiplier, shift)` pair per output channel.
    PerChannelFixedPoint,
    Floating,
    Integer,
}

impl RescaleVariant {
    pub const ALL: [RescaleVariant; 4] = [
        RescaleVariant::FixedPoint,
        RescaleVariant::PerChannelFixedPoint,
        RescaleVariant::Floating,
        RescaleVariant::Integer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RescaleVariant::FixedPoint => "fixed-point",
            RescaleVariant::PerChannelFixedPoint => "per-channel",
            RescaleVariant::Floating => "floating",
            RescaleVariant::Integer => "integer",
        }
    }
}

/// One of the specialised output stage execution paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageStrategy {
    pub offsets: OffsetVariant,
    pub rescale: RescaleVariant,
    pub has_bias: bool,
    pub bounded_relu: bool,
}

impl StageStrategy {
    /// Maps `{a_offset != 0, b_offset != 0, bias, bounded_relu, per_channel,
    /// rescale_mode}` to a strategy.
    ///
    /// Per-channel configurations always map to
    /// [`RescaleVariant::PerChannelFixedPoint`]; other rescale modes are
    /// rejected earlier by [`OutputStageConfig::validate`].
    pub fn select(offsets: &GemmOffsets, config: &OutputStageConfig, has_bias: bool) -> Self {
        let rescale = match (config.is_per_channel, config.rescale_mode) {
            (true, _) => RescaleVariant::PerChannelFixedPoint,
            (false, RescaleMode::FixedPoint) => RescaleVariant::FixedPoint,
            (false, RescaleMode::Floating) => RescaleVariant::Floating,
            (false, RescaleMode::Integer) => RescaleVariant::Integer,
        };
        Self {
            offsets: offsets.variant(),
            rescale,
            has_bias,
            bounded_relu: config.is_bounded_relu,
        }
    }

    /// Returns a human-readable name, e.g. `"fixed-point/ab-offsets+bias+relu"`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rescale.as_str(), self.offsets)?;
        if self.has_bias {
            f.write_str("+bias")?;
        }
        if self.bounded_relu {
            f.write_str("+relu")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tensor_core::{ChannelMultiplier, DType};

    fn config(mode: RescaleMode, per_channel: bool, relu: bool) -> OutputStageConfig {
        let mut c = if per_channel {
            OutputStageConfig::per_channel(vec![ChannelMultiplier::new(1 << 30, 0)])
        } else {
            OutputStageConfig::fixed_point(1 << 30, 0, 0, DType::QAsymm8Signed)
        };
        c.rescale_mode = mode;
        c.is_bounded_relu = relu;
        c
    }

    #[test]
    fn test_mapping_is_exhaustive_and_injective() {
        let modes = [RescaleMode::FixedPoint, RescaleMode::Floating, RescaleMode::Integer];
        let mut seen = HashSet::new();
        for a in [false, true] {
            for b in [false, true] {
                for bias in [false, true] {
                    for relu in [false, true] {
                        for per_channel in [false, true] {
                            for mode in modes {
                                let offsets = GemmOffsets::new(a as i32 * -3, b as i32 * -7, 16);
                                let c = config(mode, per_channel, relu);
                                let s = StageStrategy::select(&offsets, &c, bias);

                                assert_eq!(s.offsets.uses_col_sum(), a);
                                assert_eq!(s.offsets.uses_row_sum(), b);
                                assert_eq!(s.has_bias, bias);
                                assert_eq!(s.bounded_relu, relu);
                                let want = match (per_channel, mode) {
                                    (true, _) => RescaleVariant::PerChannelFixedPoint,
                                    (false, RescaleMode::FixedPoint) => RescaleVariant::FixedPoint,
                                    (false, RescaleMode::Floating) => RescaleVariant::Floating,
                                    (false, RescaleMode::Integer) => RescaleVariant::Integer,
                                };
                                assert_eq!(s.rescale, want);
                                // Only fixed point is valid per channel.
                                if !per_channel || mode == RescaleMode::FixedPoint {
                                    seen.insert(s);
                                }
                            }
                        }
                    }
                }
            }
        }
        // 4 offset variants x bias x relu x 4 rescale paths.
        assert_eq!(seen.len(), 4 * 2 * 2 * RescaleVariant::ALL.len());
    }

    #[test]
    fn test_name() {
        let c = config(RescaleMode::FixedPoint, false, true);
        let s = StageStrategy::select(&GemmOffsets::new(-1, -1, 4), &c, true);
        assert_eq!(s.name(), "fixed-point/ab-offsets+bias+relu");

        let c = config(RescaleMode::FixedPoint, true, false);
        let s = StageStrategy::select(&GemmOffsets::default(), &c, false);
        assert_eq!(s.name(), "per-channel/no-offsets");
    }
}
