//! Analysis limits and category weights.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::luck::LuckCategory;

const MIB: usize = 1024 * 1024;

/// Per-category multipliers applied to each scored delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub block: f64,
    pub armor_break: f64,
    pub injury: f64,
    pub dodge: f64,
    pub ball_handling: f64,
    pub argue_call: f64,
    pub movement_risk: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            block: 0.75,
            armor_break: 1.0,
            injury: 1.5,
            dodge: 1.1,
            ball_handling: 1.1,
            argue_call: 0.9,
            movement_risk: 1.0,
        }
    }
}

impl CategoryWeights {
    #[must_use]
    pub const fn weight(&self, category: LuckCategory) -> f64 {
        match category {
            LuckCategory::Block => self.block,
            LuckCategory::ArmorBreak => self.armor_break,
            LuckCategory::Injury => self.injury,
            LuckCategory::Dodge => self.dodge,
            LuckCategory::BallHandling => self.ball_handling,
            LuckCategory::ArgueCall => self.argue_call,
            LuckCategory::MovementRisk => self.movement_risk,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for category in LuckCategory::ALL {
            let value = self.weight(category);
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveWeight { category, value });
            }
        }
        Ok(())
    }
}

/// Limits and tuning knobs for one analysis call.
///
/// The size and duration budgets are enforced by callers; the core only
/// reads `max_decoded_chars` and `max_decode_passes` while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_input_bytes: usize,
    pub max_decoded_chars: usize,
    pub max_decode_passes: u8,
    pub max_analyze_duration_ms: u64,
    pub reroll_lookahead: usize,
    pub block_merge_window: usize,
    pub key_moment_limit: usize,
    pub category_weights: CategoryWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 5 * MIB,
            max_decoded_chars: 15 * MIB,
            max_decode_passes: 2,
            max_analyze_duration_ms: 4_000,
            reroll_lookahead: 4,
            block_merge_window: 6,
            key_moment_limit: 15,
            category_weights: CategoryWeights::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse a configuration document, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the document is not valid JSON or has mistyped fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_max_decoded_chars(mut self, max_decoded_chars: usize) -> Self {
        self.max_decoded_chars = max_decoded_chars;
        self
    }

    /// Check every bound the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_decode_passes", u64::from(self.max_decode_passes), 1, 4)?;
        check_range("max_decoded_chars", as_u64(self.max_decoded_chars), 1, u64::MAX)?;
        check_range("max_input_bytes", as_u64(self.max_input_bytes), 1, u64::MAX)?;
        check_range("reroll_lookahead", as_u64(self.reroll_lookahead), 0, 16)?;
        check_range("block_merge_window", as_u64(self.block_merge_window), 1, 32)?;
        check_range("key_moment_limit", as_u64(self.key_moment_limit), 1, 100)?;
        self.category_weights.validate()
    }
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}
