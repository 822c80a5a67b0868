//! Human-readable strings attached to luck events and reports.

use super::{Coverage, CoverageCounts, LuckCategory, LuckTeamAggregate, ScoringStatus};
use crate::numbers::percent;

pub const EVEN_VERDICT: &str = "Nuffle called this one even.";

#[must_use]
pub const fn category_label(category: Option<LuckCategory>) -> &'static str {
    match category {
        Some(LuckCategory::Block) => "Block",
        Some(LuckCategory::ArmorBreak) => "Armor break",
        Some(LuckCategory::Injury) => "Injury",
        Some(LuckCategory::Dodge) => "Dodge",
        Some(LuckCategory::BallHandling) => "Ball handling",
        Some(LuckCategory::ArgueCall) => "Argue the call",
        Some(LuckCategory::MovementRisk) => "Movement risk",
        None => "Roll",
    }
}

#[must_use]
pub fn target_label(target: Option<i32>) -> String {
    match target {
        Some(target) if target > 0 => format!("{target}+ target"),
        _ => "unspecified target".to_string(),
    }
}

/// Short headline for an event, e.g. `4+ Dodge failed (83.3%)`.
#[must_use]
pub fn moment_label(
    category: Option<LuckCategory>,
    actual_success: Option<bool>,
    probability: Option<f64>,
    target: Option<i32>,
) -> String {
    let action = category_label(category);
    let prefix = target
        .filter(|value| *value > 0)
        .map(|value| format!("{value}+ "))
        .unwrap_or_default();
    match (probability, actual_success) {
        (Some(probability), Some(true)) => {
            format!("{prefix}{action} succeeded ({})", percent(probability))
        }
        (Some(probability), Some(false)) => {
            format!("{prefix}{action} failed ({})", percent(probability))
        }
        _ => format!("{prefix}{action} excluded from score"),
    }
}

#[must_use]
pub fn formula_summary(
    actual_success: bool,
    probability: f64,
    weight: f64,
    weighted_delta: f64,
) -> String {
    format!(
        "weighted delta = ({} - {probability:.3}) x {weight:.2} = {weighted_delta:.3}",
        u8::from(actual_success)
    )
}

#[must_use]
pub fn inputs_summary(
    category: Option<LuckCategory>,
    target: &str,
    dice: &[i32],
    reroll_available: bool,
    status: ScoringStatus,
) -> String {
    let dice_text = if dice.is_empty() {
        "none".to_string()
    } else {
        let faces: Vec<String> = dice.iter().map(ToString::to_string).collect();
        format!("[{}]", faces.join(", "))
    };
    format!(
        "{} | target {target} | dice {dice_text} | reroll available {} | status {}",
        category_label(category),
        if reroll_available { "yes" } else { "no" },
        status.as_str()
    )
}

/// Narrative strength for a rounded score gap.
#[must_use]
pub fn verdict_strength(score_gap: f64) -> &'static str {
    if score_gap >= 15.0 {
        "decisively"
    } else if score_gap >= 8.0 {
        "clearly"
    } else {
        "slightly"
    }
}

#[must_use]
pub fn verdict_summary(team_name: &str, score_gap: f64) -> String {
    format!("{team_name} was {} blessed by Nuffle.", verdict_strength(score_gap))
}

fn coverage_line(counts: &CoverageCounts) -> String {
    format!(
        "{} scored and {} excluded ({:.1}% scored)",
        counts.scored_count,
        counts.excluded_count,
        counts.scored_rate * 100.0
    )
}

/// Plain-language account of what was scored and how the verdict fell out.
#[must_use]
pub fn how_scored_summary(
    verdict: &str,
    coverage: &Coverage,
    home: &LuckTeamAggregate,
    away: &LuckTeamAggregate,
) -> Vec<String> {
    let top_exclusions: Vec<String> = coverage
        .excluded_by_reason
        .iter()
        .take(3)
        .map(|entry| format!("{} {}", entry.count, entry.reason))
        .collect();
    let exclusions = if top_exclusions.is_empty() {
        "Top exclusions: none.".to_string()
    } else {
        format!("Top exclusions: {}.", top_exclusions.join("; "))
    };

    vec![
        "Only deterministic roll families with stable thresholds and outcomes are scored."
            .to_string(),
        format!(
            "Roll-candidate coverage: {}.",
            coverage_line(&coverage.roll_candidates)
        ),
        format!(
            "All-event visibility: {}.",
            coverage_line(&coverage.all_events)
        ),
        exclusions,
        format!(
            "{} finished at {:.1} versus {} at {:.1}, so the verdict is: {verdict}",
            home.team_name, home.luck_score, away.team_name, away.luck_score
        ),
    ]
}
