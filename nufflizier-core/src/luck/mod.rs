//! Luck scoring: classification, probabilities, block-chain merging and the
//! team-level report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CategoryWeights;

pub mod analyze;
pub mod classify;
pub mod explain;
pub mod merge;
pub mod probability;

pub use analyze::{analyze_luck, analyze_luck_at};
pub use classify::{Classification, ExclusionReason, classify_event};
pub use merge::merge_block_chains;
pub use probability::{
    DiceMechanic, ProbabilityResult, compute_probability, dice_are_scorable,
    resolve_actual_success,
};

/// Scoring bucket of a luck event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckCategory {
    Block,
    ArmorBreak,
    Injury,
    Dodge,
    BallHandling,
    ArgueCall,
    MovementRisk,
}

impl LuckCategory {
    pub const ALL: [Self; 7] = [
        Self::Block,
        Self::ArmorBreak,
        Self::Injury,
        Self::Dodge,
        Self::BallHandling,
        Self::ArgueCall,
        Self::MovementRisk,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::ArmorBreak => "armor_break",
            Self::Injury => "injury",
            Self::Dodge => "dodge",
            Self::BallHandling => "ball_handling",
            Self::ArgueCall => "argue_call",
            Self::MovementRisk => "movement_risk",
        }
    }

    /// Dice totals rather than any single die decide these rolls.
    #[must_use]
    pub const fn sums_dice(self) -> bool {
        matches!(self, Self::ArmorBreak | Self::Injury)
    }
}

impl fmt::Display for LuckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStatus {
    Scored,
    Excluded,
}

impl ScoringStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scored => "scored",
            Self::Excluded => "excluded",
        }
    }
}

/// Highlight tags for extreme outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentTag {
    /// Succeeded with at most a 30% chance.
    Blessed,
    /// Failed with at least a 70% chance.
    Shaftaroonie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationFlag {
    AmbiguousTeamAttribution,
    MissingTargetThreshold,
    InsufficientDiceMetadata,
    SkillModifierPresentWithoutExplicitReroll,
}

/// Audit trail for one event's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explainability {
    pub target: String,
    pub base_odds: Option<f64>,
    pub reroll_adjusted_odds: Option<f64>,
    pub mechanic: Option<DiceMechanic>,
    pub calculation: Option<String>,
    pub weight: f64,
    pub formula_summary: Option<String>,
    pub inputs_summary: String,
}

/// Raw roll inputs and provenance carried alongside a luck event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckEventMetadata {
    pub source_tag: String,
    pub is_roll_candidate: bool,
    pub contract_label: Option<String>,
    pub target_id: Option<String>,
    pub roll_type: Option<i32>,
    pub roll_label: Option<String>,
    pub step_type: Option<i32>,
    pub step_label: Option<String>,
    pub action_code: Option<i32>,
    pub action_label: Option<String>,
    pub outcome_code: Option<i32>,
    pub requirement: Option<i32>,
    pub difficulty: Option<i32>,
    pub dice: Vec<i32>,
    pub die_types: Vec<Option<i32>>,
    pub modifiers: Vec<i32>,
    pub modifiers_sum: i32,
    pub reroll_available: bool,
    pub reroll_used: bool,
    pub skills_used: Vec<i32>,
    pub normalization_flags: Vec<NormalizationFlag>,
    pub normalization_notes: Vec<String>,
    pub merged_block_anchor_id: Option<String>,
}

/// One replay event judged against its odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckEvent {
    /// `<turn>-<index>-<source tag>`.
    pub id: String,
    pub turn: u32,
    pub event_index: usize,
    pub team_id: String,
    pub team_name: String,
    pub player_id: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<LuckCategory>,
    pub probability_success: f64,
    /// `None` when neither an outcome code nor dice settle the roll.
    pub actual_success: Option<bool>,
    pub delta: f64,
    pub weighted_delta: f64,
    pub label: String,
    pub tags: Vec<MomentTag>,
    pub scoring_status: ScoringStatus,
    pub status_reason: String,
    pub explainability: Explainability,
    pub metadata: LuckEventMetadata,
}

impl LuckEvent {
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.scoring_status == ScoringStatus::Scored
    }

    /// Demote to excluded, clearing anything that fed the score.
    pub fn exclude(&mut self, reason: &ExclusionReason) {
        self.scoring_status = ScoringStatus::Excluded;
        self.status_reason = reason.to_string();
        self.delta = 0.0;
        self.weighted_delta = 0.0;
        self.tags.clear();
        self.explainability.formula_summary = None;
    }
}

/// Per-category sums of weighted deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub block: f64,
    pub armor_break: f64,
    pub injury: f64,
    pub dodge: f64,
    pub ball_handling: f64,
    pub argue_call: f64,
    pub movement_risk: f64,
}

impl CategoryScores {
    fn slot(&mut self, category: LuckCategory) -> &mut f64 {
        match category {
            LuckCategory::Block => &mut self.block,
            LuckCategory::ArmorBreak => &mut self.armor_break,
            LuckCategory::Injury => &mut self.injury,
            LuckCategory::Dodge => &mut self.dodge,
            LuckCategory::BallHandling => &mut self.ball_handling,
            LuckCategory::ArgueCall => &mut self.argue_call,
            LuckCategory::MovementRisk => &mut self.movement_risk,
        }
    }

    pub fn add(&mut self, category: LuckCategory, value: f64) {
        *self.slot(category) += value;
    }

    #[must_use]
    pub const fn get(&self, category: LuckCategory) -> f64 {
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

    #[must_use]
    pub fn rounded(mut self, digits: i32) -> Self {
        for category in LuckCategory::ALL {
            let slot = self.slot(category);
            *slot = crate::numbers::round_to(*slot, digits);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckTeamAggregate {
    pub team_id: String,
    pub team_name: String,
    pub luck_score: f64,
    pub category_scores: CategoryScores,
    pub event_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckierTeam {
    Home,
    Away,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckVerdict {
    pub luckier_team: LuckierTeam,
    pub score_gap: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageCounts {
    pub scored_count: usize,
    pub excluded_count: usize,
    pub scored_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCoverage {
    pub category: LuckCategory,
    pub scored_count: usize,
    pub excluded_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub all_events: CoverageCounts,
    pub roll_candidates: CoverageCounts,
    /// Categories seen in this match, most frequent first.
    pub by_category: Vec<CategoryCoverage>,
    /// Excluded events that never reached a category.
    pub excluded_uncategorized: usize,
    pub excluded_by_reason: Vec<ReasonCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: String,
    pub home_team_id: String,
    pub home_team: String,
    pub away_team_id: String,
    pub away_team: String,
}

/// Complete luck analysis for one match. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckReport {
    pub id: String,
    pub generated_at: String,
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
    pub verdict: LuckVerdict,
    pub coverage: Coverage,
    pub weight_table: CategoryWeights,
    pub contract_revision: u32,
    pub how_scored_summary: Vec<String>,
    pub teams: [LuckTeamAggregate; 2],
    pub key_moments: Vec<LuckEvent>,
    pub events: Vec<LuckEvent>,
}
