//! Error types surfaced by the analysis pipeline.

use thiserror::Error;

use crate::luck::LuckCategory;

/// Validation failures raised before any report is produced.
///
/// Every variant renders a human-readable message; callers map this whole
/// type to a client error and treat anything else as an internal failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayValidationError {
    #[error("Replay input is empty.")]
    EmptyInput,
    #[error("Replay XML cannot be empty.")]
    EmptyXml,
    #[error("Replay XML parse failed: {detail}")]
    MalformedXml { detail: String },
    #[error("Unsupported replay version format: {version}")]
    UnsupportedVersion { version: String },
    #[error("Decoded replay exceeds the maximum size of {limit} characters (got {actual}).")]
    DecodedSizeExceeded { limit: usize, actual: usize },
    #[error("Replay input is neither XML nor a supported encoded replay.")]
    Undecodable,
}

impl ReplayValidationError {
    /// Whether the failure came from the XML layer rather than the envelope.
    #[must_use]
    pub const fn is_parse_failure(&self) -> bool {
        matches!(self, Self::MalformedXml { .. } | Self::UnsupportedVersion { .. })
    }
}

/// Errors raised when analysis configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
    #[error("weight for {category} must be finite and positive (got {value:.3})")]
    NonPositiveWeight { category: LuckCategory, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = ReplayValidationError::UnsupportedVersion {
            version: "v1".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported replay version format: v1");
        assert!(err.is_parse_failure());
        assert!(!ReplayValidationError::EmptyInput.is_parse_failure());
        let size = ReplayValidationError::DecodedSizeExceeded {
            limit: 10,
            actual: 12,
        };
        assert!(size.to_string().contains("10 characters"));
    }

    #[test]
    fn config_errors_name_the_field() {
        let err = ConfigError::RangeViolation {
            field: "max_decode_passes",
            min: 1,
            max: 4,
            value: 9,
        };
        assert!(err.to_string().starts_with("max_decode_passes"));
        let weight = ConfigError::NonPositiveWeight {
            category: LuckCategory::Dodge,
            value: 0.0,
        };
        assert!(weight.to_string().contains("dodge"));
    }
}
