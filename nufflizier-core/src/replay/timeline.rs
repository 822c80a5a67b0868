//! Per-turn keyword summary consumed by coaching heuristics.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ReplayModel;

const KEYWORD_PATTERNS: [&str; 6] = [
    r"\bturn ?over\b",
    r"\bre ?-?roll\b",
    r"\bblitz(?:ed|ing|es)?\b",
    r"\bfoul(?:ed|ing|s)?\b",
    r"\bdodge(?:d|s|ing)?\b",
    r"\bblock(?:ed|ing|s)?\b",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHits {
    pub turnover: usize,
    pub reroll: usize,
    pub blitz: usize,
    pub foul: usize,
    pub dodge: usize,
    pub block: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineTurn {
    pub turn_number: u32,
    pub team_id: Option<String>,
    pub raw_event_count: usize,
    pub keyword_hits: KeywordHits,
}

fn keyword_patterns() -> &'static [Option<Regex>; 6] {
    static CELL: OnceLock<[Option<Regex>; 6]> = OnceLock::new();
    CELL.get_or_init(|| KEYWORD_PATTERNS.map(|pattern| Regex::new(pattern).ok()))
}

fn count_hits(text: &str) -> KeywordHits {
    let [turnover, reroll, blitz, foul, dodge, block] =
        keyword_patterns().each_ref().map(|pattern| {
            pattern
                .as_ref()
                .map_or(0, |pattern| pattern.find_iter(text).count())
        });
    KeywordHits {
        turnover,
        reroll,
        blitz,
        foul,
        dodge,
        block,
    }
}

/// One entry per turn with keyword counts over its action texts and end reason.
#[must_use]
pub fn build_timeline(replay: &ReplayModel) -> Vec<TimelineTurn> {
    replay
        .turns
        .iter()
        .map(|turn| {
            let mut text = turn.action_texts.join(" ");
            if let Some(label) = &turn.end_turn_reason_label {
                text.push(' ');
                text.push_str(label);
            }
            let text = text.to_lowercase().replace('_', " ");
            TimelineTurn {
                turn_number: turn.turn_number,
                team_id: turn.team_id.clone(),
                raw_event_count: turn.event_count.max(1),
                keyword_hits: count_hits(&text),
            }
        })
        .collect()
}
