//! Decide whether a replay event can be scored and under which category.

use std::fmt;

use super::LuckCategory;
use crate::contracts::{ContractKind, RollTypeContract, roll_type_contract};
use crate::replay::ReplayEvent;

const MERGED_PREFIX: &str = "excluded: merged into block anchor";

/// Why an event does not contribute to a luck score.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    OutcomeSummary,
    Randomizer,
    MissingTarget,
    PendingEvidence,
    UnsupportedRollFamily,
    NoRollPayload,
    IndeterminateOutcome,
    /// Dice faces or dice count beyond anything a real roll produces.
    UnusableDiceMetadata,
    /// Chained block result claimed by the anchor with this id.
    MergedIntoBlockAnchor(String),
}

impl ExclusionReason {
    /// Coverage bucket: merge reasons share one bucket regardless of anchor.
    #[must_use]
    pub const fn coverage_key(&self) -> &'static str {
        match self {
            Self::OutcomeSummary => "excluded: outcome summary without dice threshold",
            Self::Randomizer => "excluded: randomizer roll without success semantics",
            Self::MissingTarget => "excluded: missing target threshold",
            Self::PendingEvidence => "excluded: roll family pending evidence review",
            Self::UnsupportedRollFamily => "excluded: unsupported roll family",
            Self::NoRollPayload => "excluded: no roll payload",
            Self::IndeterminateOutcome => "excluded: indeterminate outcome",
            Self::UnusableDiceMetadata => "excluded: unusable dice metadata",
            Self::MergedIntoBlockAnchor(_) => MERGED_PREFIX,
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MergedIntoBlockAnchor(anchor_id) => write!(f, "{MERGED_PREFIX} {anchor_id}"),
            other => f.write_str(other.coverage_key()),
        }
    }
}

/// Coverage bucket for a stored status reason string.
#[must_use]
pub fn coverage_reason_key(reason: &str) -> &str {
    if reason.starts_with(MERGED_PREFIX) {
        MERGED_PREFIX
    } else {
        reason
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Scored {
        category: LuckCategory,
        target: i32,
        contract: &'static RollTypeContract,
    },
    Excluded {
        category: Option<LuckCategory>,
        reason: ExclusionReason,
        contract: Option<&'static RollTypeContract>,
    },
}

impl Classification {
    #[must_use]
    pub const fn category(&self) -> Option<LuckCategory> {
        match self {
            Self::Scored { category, .. } => Some(*category),
            Self::Excluded { category, .. } => *category,
        }
    }

    #[must_use]
    pub const fn contract(&self) -> Option<&'static RollTypeContract> {
        match self {
            Self::Scored { contract, .. } => Some(*contract),
            Self::Excluded { contract, .. } => *contract,
        }
    }

    /// Deterministic roll families form the strict coverage denominator.
    #[must_use]
    pub fn is_roll_candidate(&self) -> bool {
        self.contract()
            .is_some_and(|contract| contract.kind.is_roll_candidate())
    }
}

/// Summary tags that never carry their own roll contract.
fn tag_summary_category(source_tag: &str) -> Option<LuckCategory> {
    match source_tag {
        "ResultBlockOutcome" | "ResultPushBack" => Some(LuckCategory::Block),
        "ResultPlayerRemoval" => Some(LuckCategory::Injury),
        _ => None,
    }
}

/// Category hint for a tag when no roll type is present.
fn tag_hint(source_tag: &str) -> Option<LuckCategory> {
    match source_tag {
        "ResultBlockRoll" => Some(LuckCategory::Block),
        "ResultInjuryRoll" | "ResultCasualtyRoll" => Some(LuckCategory::Injury),
        _ => None,
    }
}

/// Classify one event against the contract registry.
#[must_use]
pub fn classify_event(event: &ReplayEvent) -> Classification {
    let source_tag = event.source_tag.as_str();
    if let Some(category) = tag_summary_category(source_tag) {
        return Classification::Excluded {
            category: Some(category),
            reason: ExclusionReason::OutcomeSummary,
            contract: None,
        };
    }

    let roll = event.roll_fields();
    let roll_type = event.roll_type.or_else(|| roll.and_then(|fields| fields.roll_type));
    if roll_type.is_none() {
        return Classification::Excluded {
            category: tag_hint(source_tag),
            reason: ExclusionReason::NoRollPayload,
            contract: None,
        };
    }

    let Some(contract) = roll_type_contract(source_tag, roll_type) else {
        return Classification::Excluded {
            category: tag_hint(source_tag),
            reason: ExclusionReason::UnsupportedRollFamily,
            contract: None,
        };
    };

    let excluded = |reason: ExclusionReason| Classification::Excluded {
        category: contract.scoring_category,
        reason,
        contract: Some(contract),
    };
    let target = roll.and_then(|fields| fields.target());

    match contract.kind {
        ContractKind::Summary => excluded(ExclusionReason::OutcomeSummary),
        ContractKind::Randomizer => excluded(ExclusionReason::Randomizer),
        ContractKind::ExcludedDeterministic if target.is_none() => {
            excluded(ExclusionReason::MissingTarget)
        }
        ContractKind::ExcludedDeterministic => excluded(ExclusionReason::PendingEvidence),
        ContractKind::ScoredDeterministic => match (contract.scoring_category, target) {
            (Some(category), Some(target)) => Classification::Scored {
                category,
                target,
                contract,
            },
            (_, None) => excluded(ExclusionReason::MissingTarget),
            (None, Some(_)) => excluded(ExclusionReason::UnsupportedRollFamily),
        },
    }
}
