// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Output stage configuration loaded from TOML or built programmatically.
//!
//! # TOML Format
//! ```toml
//! rescale_mode = "fixed-point"
//! result_multiplier = 1518500250
//! result_shift = 7
//! result_offset = 128
//! min_bound = 0
//! max_bound = 255
//! output_dtype = "q_asymm8"
//! ```

use std::fmt;
use std::path::Path;

use crate::fixed_point::MAX_SHIFT;
use crate::LowpError;
use tensor_core::{ChannelMultiplier, DType};

/// How 32-bit accumulators are scaled down to the output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RescaleMode {
    /// Q0.31 multiplier and rounding shift, integer arithmetic only.
    FixedPoint,
    /// `round(acc * real_multiplier + offset)` in `f32`.
    Floating,
    /// `((acc + offset) * multiplier) >> shift`, truncating.
    Integer,
}

impl RescaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RescaleMode::FixedPoint => "fixed-point",
            RescaleMode::Floating => "floating",
            RescaleMode::Integer => "integer",
        }
    }
}

impl fmt::Display for RescaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the quantize-down stage that follows a quantized matrix
/// multiply.
///
/// Built once when the kernel is configured and immutable afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputStageConfig {
    pub rescale_mode: RescaleMode,
    /// Q0.31 multiplier (`FixedPoint`) or integer multiplier (`Integer`).
    #[serde(default)]
    pub result_multiplier: i32,
    #[serde(default)]
    pub result_shift: i32,
    /// Zero point added after rescaling (`FixedPoint`, `Floating`) or before
    /// multiplying (`Integer`).
    #[serde(default)]
    pub result_offset: i32,
    /// Real multiplier for [`RescaleMode::Floating`].
    #[serde(default)]
    pub result_real_multiplier: f32,
    pub min_bound: i32,
    pub max_bound: i32,
    /// One `(multiplier, shift)` pair per output channel.
    #[serde(default)]
    pub is_per_channel: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_multipliers: Vec<ChannelMultiplier>,
    #[serde(default)]
    pub is_bounded_relu: bool,
    pub output_dtype: DType,
}

impl OutputStageConfig {
    const OP: &'static str = "OutputStageConfig";

    /// Per-tensor fixed-point rescale with the full output range as bounds.
    ///
    /// # Examples
    /// ```
    /// use lowp_kernels::{OutputStageConfig, RescaleMode};
    /// use tensor_core::DType;
    ///
    /// let c = OutputStageConfig::fixed_point(1 << 30, 3, 128, DType::QAsymm8)
    ///     .with_activation_bounds(128, 255);
    /// assert_eq!(c.rescale_mode, RescaleMode::FixedPoint);
    /// assert!(c.is_bounded_relu);
    /// ```
    pub fn fixed_point(multiplier: i32, shift: i32, offset: i32, output_dtype: DType) -> Self {
        Self::base(RescaleMode::FixedPoint, output_dtype)
            .with_scale(multiplier, shift)
            .with_offset(offset)
    }

    /// Per-tensor floating-point rescale.
    pub fn floating(real_multiplier: f32, offset: i32, output_dtype: DType) -> Self {
        Self {
            result_real_multiplier: real_multiplier,
            ..Self::base(RescaleMode::Floating, output_dtype)
        }
        .with_offset(offset)
    }

    /// Per-tensor integer quantize-down.
    pub fn integer(multiplier: i32, shift: i32, offset: i32, output_dtype: DType) -> Self {
        Self::base(RescaleMode::Integer, output_dtype)
            .with_scale(multiplier, shift)
            .with_offset(offset)
    }

    /// Per-channel symmetric fixed-point rescale into signed 8-bit output.
    ///
    /// The multipliers usually come from
    /// [`calculate_per_channel_multipliers`](crate::calculate_per_channel_multipliers).
    pub fn per_channel(multipliers: Vec<ChannelMultiplier>) -> Self {
        Self {
            is_per_channel: true,
            result_multipliers: multipliers,
            ..Self::base(RescaleMode::FixedPoint, DType::QAsymm8Signed)
        }
    }

    fn base(rescale_mode: RescaleMode, output_dtype: DType) -> Self {
        let (min_bound, max_bound) = output_dtype.quantized_range().unwrap_or((0, 0));
        Self {
            rescale_mode,
            result_multiplier: 0,
            result_shift: 0,
            result_offset: 0,
            result_real_multiplier: 0.0,
            min_bound,
            max_bound,
            is_per_channel: false,
            result_multipliers: Vec::new(),
            is_bounded_relu: false,
            output_dtype,
        }
    }

    fn with_scale(mut self, multiplier: i32, shift: i32) -> Self {
        self.result_multiplier = multiplier;
        self.result_shift = shift;
        self
    }

    fn with_offset(mut self, offset: i32) -> Self {
        self.result_offset = offset;
        self
    }

    /// Sets the activation bounds and derives `is_bounded_relu`.
    ///
    /// The clamp is enabled only when the bounds differ and do not cover
    /// the whole output range, so an identity clamp never runs.
    pub fn with_activation_bounds(mut self, min_bound: i32, max_bound: i32) -> Self {
        self.min_bound = min_bound;
        self.max_bound = max_bound;
        let full = self.output_dtype.quantized_range() == Some((min_bound, max_bound));
        self.is_bounded_relu = min_bound != max_bound && !full;
        self
    }

    /// Checks every constraint that does not depend on tensor shapes.
    ///
    /// # Errors
    /// - [`LowpError::UnsupportedElementType`] for a non 8-bit output type,
    ///   or a per-channel stage writing unsigned output.
    /// - [`LowpError::UnsupportedRescaleMode`] for per-channel with any mode
    ///   other than fixed point.
    /// - [`LowpError::QuantizationRange`] for inverted or out-of-range
    ///   bounds, shifts outside the accepted range, a non-positive real
    ///   multiplier, or a per-channel stage with a result offset.
    pub fn validate(&self) -> Result<(), LowpError> {
        let op = Self::OP;
        let Some((lo, hi)) = self.output_dtype.quantized_range() else {
            return Err(LowpError::UnsupportedElementType {
                op,
                input: DType::S32,
                output: self.output_dtype,
            });
        };

        if self.min_bound > self.max_bound {
            return Err(LowpError::range(
                op,
                format!("min_bound {} > max_bound {}", self.min_bound, self.max_bound),
            ));
        }
        if self.min_bound < lo || self.max_bound > hi {
            return Err(LowpError::range(
                op,
                format!(
                    "bounds [{}, {}] exceed the {} range [{lo}, {hi}]",
                    self.min_bound, self.max_bound, self.output_dtype
                ),
            ));
        }

        if self.is_per_channel {
            return self.validate_per_channel();
        }

        match self.rescale_mode {
            RescaleMode::FixedPoint => check_shift(op, self.result_shift, -MAX_SHIFT),
            RescaleMode::Integer => check_shift(op, self.result_shift, 0),
            RescaleMode::Floating => {
                let m = self.result_real_multiplier;
                if m.is_finite() && m > 0.0 {
                    Ok(())
                } else {
                    Err(LowpError::range(
                        op,
                        format!("real multiplier must be finite and > 0, got {m}"),
                    ))
                }
            }
        }
    }

    fn validate_per_channel(&self) -> Result<(), LowpError> {
        let op = Self::OP;
        if self.rescale_mode != RescaleMode::FixedPoint {
            return Err(LowpError::UnsupportedRescaleMode {
                op,
                mode: self.rescale_mode.as_str(),
                detail: "per-channel rescaling requires fixed-point multipliers".into(),
            });
        }
        if !self.output_dtype.is_signed_quantized() {
            return Err(LowpError::UnsupportedElementType {
                op,
                input: DType::S32,
                output: self.output_dtype,
            });
        }
        if self.result_offset != 0 {
            return Err(LowpError::range(
                op,
                format!(
                    "per-channel output is symmetric, result_offset must be 0 (got {})",
                    self.result_offset
                ),
            ));
        }
        if self.result_multipliers.is_empty() {
            return Err(LowpError::range(op, "per-channel stage has no multipliers"));
        }
        self.result_multipliers
            .iter()
            .try_for_each(|m| check_shift(op, m.shift, -MAX_SHIFT))
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LowpError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LowpError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, LowpError> {
        toml::from_str(toml_str).map_err(|e| LowpError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, LowpError> {
        toml::to_string_pretty(self)
            .map_err(|e| LowpError::Config(format!("TOML serialise error: {e}")))
    }
}

fn check_shift(op: &'static str, shift: i32, min: i32) -> Result<(), LowpError> {
    if (min..=MAX_SHIFT).contains(&shift) {
        Ok(())
    } else {
        Err(LowpError::range(
            op,
            format!("shift {shift} outside [{min}, {MAX_SHIFT}]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_defaults_to_full_range() {
        let c = OutputStageConfig::fixed_point(1 << 30, 2, 5, DType::QAsymm8Signed);
        assert_eq!((c.min_bound, c.max_bound), (-128, 127));
        assert!(!c.is_bounded_relu);
        assert!(!c.is_per_channel);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_activation_bounds_derivation() {
        let base = OutputStageConfig::fixed_point(1 << 30, 0, 0, DType::QAsymm8);
        assert!(base.clone().with_activation_bounds(10, 200).is_bounded_relu);
        assert!(!base.clone().with_activation_bounds(0, 255).is_bounded_relu);
        assert!(!base.clone().with_activation_bounds(7, 7).is_bounded_relu);
        // Full range for i8 is not full range for u8.
        let signed = OutputStageConfig::fixed_point(1 << 30, 0, 0, DType::QAsymm8Signed);
        assert!(signed.with_activation_bounds(0, 127).is_bounded_relu);
    }

    #[test]
    fn test_validate_bounds() {
        let c = OutputStageConfig::fixed_point(1 << 30, 0, 0, DType::QAsymm8);
        let inverted = OutputStageConfig {
            min_bound: 10,
            max_bound: 5,
            ..c.clone()
        };
        assert!(matches!(inverted.validate(), Err(LowpError::QuantizationRange { .. })));

        let outside = OutputStageConfig {
            min_bound: -1,
            ..c
        };
        assert!(matches!(outside.validate(), Err(LowpError::QuantizationRange { .. })));
    }

    #[test]
    fn test_validate_output_type() {
        let mut c = OutputStageConfig::fixed_point(1 << 30, 0, 0, DType::QAsymm8);
        c.output_dtype = DType::F32;
        assert!(matches!(c.validate(), Err(LowpError::UnsupportedElementType { .. })));
    }

    #[test]
    fn test_validate_shifts() {
        assert!(OutputStageConfig::fixed_point(1 << 30, -31, 0, DType::QAsymm8).validate().is_ok());
        assert!(OutputStageConfig::fixed_point(1 << 30, 32, 0, DType::QAsymm8).validate().is_err());
        assert!(OutputStageConfig::integer(3, -1, 0, DType::QAsymm8).validate().is_err());
        assert!(OutputStageConfig::integer(3, 4, 0, DType::QAsymm8).validate().is_ok());
    }

    #[test]
    fn test_validate_floating() {
        assert!(OutputStageConfig::floating(0.25, 3, DType::QAsymm8).validate().is_ok());
        assert!(OutputStageConfig::floating(0.0, 3, DType::QAsymm8).validate().is_err());
        assert!(OutputStageConfig::floating(f32::NAN, 3, DType::QAsymm8).validate().is_err());
    }

    #[test]
    fn test_validate_per_channel() {
        let ok = OutputStageConfig::per_channel(vec![ChannelMultiplier::new(1 << 30, 1)]);
        assert_eq!(ok.output_dtype, DType::QAsymm8Signed);
        assert!(ok.validate().is_ok());

        let floating = OutputStageConfig {
            rescale_mode: RescaleMode::Floating,
            ..ok.clone()
        };
        assert!(matches!(
            floating.validate(),
            Err(LowpError::UnsupportedRescaleMode { mode: "floating", .. })
        ));

        let unsigned = OutputStageConfig {
            output_dtype: DType::QAsymm8,
            min_bound: 0,
            max_bound: 255,
            ..ok.clone()
        };
        assert!(matches!(unsigned.validate(), Err(LowpError::UnsupportedElementType { .. })));

        let offset = OutputStageConfig {
            result_offset: 3,
            ..ok.clone()
        };
        assert!(matches!(offset.validate(), Err(LowpError::QuantizationRange { .. })));

        let empty = OutputStageConfig::per_channel(Vec::new());
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
rescale_mode = "fixed-point"
result_multiplier = 1073741824
result_shift = 3
result_offset = 128
min_bound = 128
max_bound = 255
is_bounded_relu = true
output_dtype = "q_asymm8"
"#;
        let c = OutputStageConfig::from_toml(toml).unwrap();
        assert_eq!(c.rescale_mode, RescaleMode::FixedPoint);
        assert_eq!(c.result_multiplier, 1 << 30);
        assert_eq!(c.result_shift, 3);
        assert_eq!(c.result_offset, 128);
        assert!(c.is_bounded_relu);
        assert!(!c.is_per_channel);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_toml_per_channel() {
        let toml = r#"
rescale_mode = "fixed-point"
min_bound = -128
max_bound = 127
is_per_channel = true
output_dtype = "q_asymm8_signed"

[[result_multipliers]]
multiplier = 1073741824
shift = 0

[[result_multipliers]]
multiplier = 1073741824
shift = 1
"#;
        let c = OutputStageConfig::from_toml(toml).unwrap();
        assert_eq!(c.result_multipliers.len(), 2);
        assert_eq!(c.result_multipliers[1].shift, 1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_toml_unknown_mode() {
        let toml = r#"
rescale_mode = "magic"
min_bound = 0
max_bound = 255
output_dtype = "q_asymm8"
"#;
        assert!(matches!(
            OutputStageConfig::from_toml(toml),
            Err(LowpError::Config(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = OutputStageConfig::floating(0.125, -3, DType::QAsymm8Signed)
            .with_activation_bounds(0, 100);
        let toml = c.to_toml().unwrap();
        assert!(toml.contains("rescale_mode = \"floating\""));
        let back = OutputStageConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_from_file_missing() {
        let err = OutputStageConfig::from_file(Path::new("/nonexistent/stage.toml")).unwrap_err();
        assert!(matches!(err, LowpError::Config(_)));
    }
}
