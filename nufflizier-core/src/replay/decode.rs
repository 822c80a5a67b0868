//! Multi-layer payload decoding.
//!
//! Uploads arrive either as plain XML or wrapped in one or more base64 layers.
//! Nested result payloads inside the event stream use the same wrapping, so the
//! bounded peel loop here is shared with the extractor.

use std::borrow::Cow;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::ReplayValidationError;

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Wire envelope the replay text was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Plain XML upload.
    Xml,
    /// Packed replay file: XML behind one or more base64 layers.
    Bbr,
}

/// Plain XML recovered from an upload plus how deep it was buried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReplay {
    pub xml: String,
    pub source_format: SourceFormat,
    pub decode_depth: u8,
}

/// Whether the text starts like an XML document once leading whitespace is ignored.
#[must_use]
pub fn looks_like_xml(text: &str) -> bool {
    text.trim_start_matches('\u{feff}').trim_start().starts_with('<')
}

/// Decode one base64 layer, ignoring embedded whitespace. Non UTF-8 output is rejected.
#[must_use]
pub fn decode_base64_text(value: &str) -> Option<String> {
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let bytes = LENIENT_BASE64.decode(compact.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Peel at most `max_passes` base64 layers, stopping at the first XML-looking text.
///
/// Returns the XML and the depth at which it was found.
#[must_use]
pub fn peel_layers(value: &str, max_passes: u8) -> Option<(String, u8)> {
    let mut current: Cow<'_, str> = Cow::Borrowed(value.trim());
    for depth in 0..=max_passes {
        if looks_like_xml(&current) {
            return Some((current.trim().to_string(), depth));
        }
        if depth == max_passes {
            break;
        }
        current = Cow::Owned(decode_base64_text(&current)?);
    }
    None
}

/// Recover plain XML from an upload.
///
/// # Errors
///
/// Returns `ReplayValidationError` when the input is empty, when no allowed
/// decode pass yields XML, or when the decoded text exceeds `max_decoded_chars`.
pub fn decode_replay_input(
    input: &str,
    config: &AnalysisConfig,
) -> Result<DecodedReplay, ReplayValidationError> {
    let trimmed = input.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(ReplayValidationError::EmptyInput);
    }

    let limit = config.max_decoded_chars;
    let mut current: Cow<'_, str> = Cow::Borrowed(trimmed);
    for depth in 0..=config.max_decode_passes {
        if looks_like_xml(&current) {
            ensure_within_budget(limit, current.chars().count())?;
            let source_format = if depth == 0 {
                SourceFormat::Xml
            } else {
                SourceFormat::Bbr
            };
            log::debug!("decoded replay at depth {depth} ({source_format:?})");
            return Ok(DecodedReplay {
                xml: current.trim_start_matches('\u{feff}').trim().to_string(),
                source_format,
                decode_depth: depth,
            });
        }
        if depth == config.max_decode_passes {
            break;
        }
        // A decoded buffer of n bytes holds at least n / 4 characters.
        let minimum_chars = current.len() / 4 * 3 / 4;
        ensure_within_budget(limit, minimum_chars)?;
        let Some(next) = decode_base64_text(&current) else {
            log::debug!("base64 pass {} failed", depth + 1);
            break;
        };
        current = Cow::Owned(next);
    }

    Err(ReplayValidationError::Undecodable)
}

fn ensure_within_budget(limit: usize, actual: usize) -> Result<(), ReplayValidationError> {
    if actual > limit {
        return Err(ReplayValidationError::DecodedSizeExceeded { limit, actual });
    }
    Ok(())
}
