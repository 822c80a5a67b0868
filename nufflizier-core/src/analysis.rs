//! Entry points shared by every caller.
//!
//! The CLI and any request layer go through these functions so that the same
//! upload always yields the same verdict, coverage and scores.

use chrono::{DateTime, Utc};

use crate::config::AnalysisConfig;
use crate::error::ReplayValidationError;
use crate::luck::{LuckReport, analyze_luck, analyze_luck_at};
use crate::replay::{ReplayModel, SourceFormat, decode_replay_input, parse_replay_xml};

/// Decode an upload and parse it into a replay model.
///
/// # Errors
///
/// Returns `ReplayValidationError` when decoding fails or the recovered XML is
/// empty, malformed or carries an unsupported version.
pub fn parse_replay_input(
    input: &str,
    config: &AnalysisConfig,
) -> Result<ReplayModel, ReplayValidationError> {
    let decoded = decode_replay_input(input, config)?;
    parse_replay_xml(&decoded.xml, decoded.source_format)
}

/// Full pipeline from raw upload text to a luck report.
///
/// # Errors
///
/// See [`parse_replay_input`].
pub fn analyze_replay_input(
    input: &str,
    config: &AnalysisConfig,
) -> Result<LuckReport, ReplayValidationError> {
    let replay = parse_replay_input(input, config)?;
    Ok(analyze_luck(&replay, config))
}

/// Same as [`analyze_replay_input`] with a fixed generation timestamp.
///
/// # Errors
///
/// See [`parse_replay_input`].
pub fn analyze_replay_input_at(
    input: &str,
    config: &AnalysisConfig,
    generated_at: DateTime<Utc>,
) -> Result<LuckReport, ReplayValidationError> {
    let replay = parse_replay_input(input, config)?;
    Ok(analyze_luck_at(&replay, config, generated_at))
}

/// Analyze already-decoded XML.
///
/// # Errors
///
/// Returns `ReplayValidationError` for empty, malformed or unsupported XML.
pub fn analyze_replay_xml(
    xml: &str,
    config: &AnalysisConfig,
) -> Result<LuckReport, ReplayValidationError> {
    let replay = parse_replay_xml(xml, SourceFormat::Xml)?;
    Ok(analyze_luck(&replay, config))
}

#[must_use]
pub fn analyze_replay(replay: &ReplayModel, config: &AnalysisConfig) -> LuckReport {
    analyze_luck(replay, config)
}
