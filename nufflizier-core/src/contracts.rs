//! Roll-type contract registry.
//!
//! Each entry states how a `(source tag, roll type)` pair from the event stream
//! is treated by the luck engine. The table only grows as new evidence is
//! reviewed; bump [`CONTRACT_REVISION`] whenever an entry changes.

use serde::Serialize;

use crate::luck::LuckCategory;
use crate::replay::Confidence;
use Confidence::{High, Low, Medium};
use KnowledgeStatus::{Ambiguous, Known, Unknown};

/// Revision of the evidence review the table reflects.
pub const CONTRACT_REVISION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Threshold roll with stable success semantics; scored.
    ScoredDeterministic,
    /// Threshold roll whose rule meaning is not settled; counted, never scored.
    ExcludedDeterministic,
    /// Scatter or table roll with no notion of success.
    Randomizer,
    /// Outcome echo of an earlier roll.
    Summary,
}

impl ContractKind {
    #[must_use]
    pub const fn is_roll_candidate(self) -> bool {
        matches!(self, Self::ScoredDeterministic | Self::ExcludedDeterministic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeStatus {
    Known,
    Ambiguous,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollTypeContract {
    pub source_tag: &'static str,
    pub roll_type: i32,
    pub label: &'static str,
    pub kind: ContractKind,
    pub confidence: Confidence,
    pub status: KnowledgeStatus,
    pub scoring_category: Option<LuckCategory>,
    pub notes: &'static str,
}

#[allow(clippy::too_many_arguments)]
const fn contract(
    source_tag: &'static str,
    roll_type: i32,
    label: &'static str,
    kind: ContractKind,
    confidence: Confidence,
    status: KnowledgeStatus,
    scoring_category: Option<LuckCategory>,
    notes: &'static str,
) -> RollTypeContract {
    RollTypeContract {
        source_tag,
        roll_type,
        label,
        kind,
        confidence,
        status,
        scoring_category,
        notes,
    }
}

const fn scored(
    roll_type: i32,
    label: &'static str,
    category: LuckCategory,
    confidence: Confidence,
    status: KnowledgeStatus,
    notes: &'static str,
) -> RollTypeContract {
    contract(
        "ResultRoll",
        roll_type,
        label,
        ContractKind::ScoredDeterministic,
        confidence,
        status,
        Some(category),
        notes,
    )
}

const fn randomizer(
    roll_type: i32,
    label: &'static str,
    confidence: Confidence,
    status: KnowledgeStatus,
    notes: &'static str,
) -> RollTypeContract {
    contract(
        "ResultRoll",
        roll_type,
        label,
        ContractKind::Randomizer,
        confidence,
        status,
        None,
        notes,
    )
}

const fn provisional(
    roll_type: i32,
    label: &'static str,
    confidence: Confidence,
    status: KnowledgeStatus,
    hint: Option<LuckCategory>,
    notes: &'static str,
) -> RollTypeContract {
    contract(
        "ResultRoll",
        roll_type,
        label,
        ContractKind::ExcludedDeterministic,
        confidence,
        status,
        hint,
        notes,
    )
}

const OBSERVED_CONTRACTS: &[RollTypeContract] = &[
    contract(
        "ResultBlockRoll",
        3,
        "block_dice_faces_summary",
        ContractKind::Summary,
        High,
        Known,
        Some(LuckCategory::Block),
        "Outcome-only block face summary without threshold or dice payload.",
    ),
    contract(
        "ResultInjuryRoll",
        11,
        "injury_chain_2d6_summary",
        ContractKind::Summary,
        High,
        Known,
        Some(LuckCategory::Injury),
        "Damage chain summary emitted after armor checks.",
    ),
    contract(
        "ResultCasualtyRoll",
        12,
        "casualty_chain_d6_summary",
        ContractKind::Summary,
        High,
        Known,
        Some(LuckCategory::Injury),
        "Casualty severity chain summary.",
    ),
    scored(
        2,
        "block_check",
        LuckCategory::Block,
        High,
        Known,
        "Single-die threshold check inside block sequences.",
    ),
    scored(
        10,
        "armor_chain_2d6_check",
        LuckCategory::ArmorBreak,
        High,
        Known,
        "Two-die threshold check tied to block and foul damage chains.",
    ),
    scored(
        34,
        "armor_modified_check",
        LuckCategory::ArmorBreak,
        High,
        Known,
        "Armor check carrying stable +2 style modifiers.",
    ),
    scored(
        4,
        "injury_check",
        LuckCategory::Injury,
        High,
        Known,
        "Single-die injury threshold check.",
    ),
    scored(
        37,
        "injury_variant_check",
        LuckCategory::Injury,
        High,
        Known,
        "Injury variant check inside damage chains.",
    ),
    scored(
        71,
        "argue_call_check",
        LuckCategory::ArgueCall,
        High,
        Known,
        "Secret-weapon argue-call check with a fixed threshold.",
    ),
    scored(
        1,
        "movement_risk_check",
        LuckCategory::MovementRisk,
        High,
        Known,
        "Single-die 2+ movement risk check with stable outcome semantics.",
    ),
    scored(
        3,
        "dodge_check",
        LuckCategory::Dodge,
        Medium,
        Known,
        "Agility check raised under dodge steps.",
    ),
    scored(
        11,
        "pickup_check",
        LuckCategory::BallHandling,
        Medium,
        Ambiguous,
        "Pickup attempt threshold check.",
    ),
    scored(
        12,
        "catch_check",
        LuckCategory::BallHandling,
        Medium,
        Ambiguous,
        "Catch attempt threshold check.",
    ),
    randomizer(
        8,
        "kickoff_scatter_randomizer",
        High,
        Known,
        "Three-die directional randomizer with no threshold.",
    ),
    randomizer(
        9,
        "kickoff_event_randomizer",
        High,
        Known,
        "Three-die table roll with outcome 2 and zero target.",
    ),
    randomizer(
        25,
        "single_die_chain_randomizer",
        High,
        Known,
        "Single d8 randomizer with no threshold.",
    ),
    randomizer(
        26,
        "paired_kickoff_randomizer",
        High,
        Known,
        "Paired randomizer mixing d8 and unknown die types.",
    ),
    randomizer(
        30,
        "special_randomizer_30",
        Medium,
        Ambiguous,
        "Seen once as an outcome 2 special chain randomizer.",
    ),
    randomizer(
        87,
        "chain_randomizer_87",
        High,
        Known,
        "Frequent zero-target randomizer in chainsaw sequences.",
    ),
    provisional(
        5,
        "deterministic_check_5_provisional",
        Low,
        Unknown,
        None,
        "Rare threshold chain without stable semantics.",
    ),
    provisional(
        6,
        "deterministic_check_6_provisional",
        Low,
        Unknown,
        None,
        "Rare threshold check inside special-action chains.",
    ),
    provisional(
        7,
        "deterministic_check_7_provisional",
        Medium,
        Ambiguous,
        None,
        "Threshold check with mixed step contexts and modifiers.",
    ),
    provisional(
        31,
        "deterministic_check_31_provisional",
        Low,
        Unknown,
        None,
        "Single observation; semantics not stable.",
    ),
    provisional(
        33,
        "deterministic_check_33_provisional",
        Medium,
        Ambiguous,
        None,
        "Repeated 2+ check with unclear rule meaning.",
    ),
    provisional(
        41,
        "deterministic_check_41_provisional",
        Low,
        Unknown,
        None,
        "Single observation with heavy modifiers.",
    ),
    provisional(
        42,
        "argue_call_variant_42_provisional",
        Low,
        Unknown,
        Some(LuckCategory::ArgueCall),
        "Argue-call variant whose threshold meaning is unconfirmed.",
    ),
    provisional(
        43,
        "deterministic_check_43_provisional",
        Low,
        Unknown,
        None,
        "Single observation; semantics unclear.",
    ),
    provisional(
        45,
        "deterministic_check_45_provisional",
        Medium,
        Ambiguous,
        None,
        "2+ check that often precedes roll type 10 chains.",
    ),
    provisional(
        67,
        "deterministic_check_67_provisional",
        Medium,
        Ambiguous,
        None,
        "2+ setup check followed by roll type 10.",
    ),
    provisional(
        70,
        "argue_call_variant_70_provisional",
        Low,
        Unknown,
        Some(LuckCategory::ArgueCall),
        "Argue-call variant whose threshold meaning is unconfirmed.",
    ),
    provisional(
        73,
        "deterministic_check_73_provisional",
        Medium,
        Ambiguous,
        None,
        "Special-skill chain check with stable failure patterns.",
    ),
    provisional(
        74,
        "deterministic_check_74_provisional",
        Low,
        Unknown,
        None,
        "Single observation inside a rare chain.",
    ),
    provisional(
        88,
        "deterministic_check_88_provisional",
        Medium,
        Ambiguous,
        None,
        "Threshold check in bomb and special-action chains.",
    ),
];

/// Contract for a source tag and roll type, if the pair has been reviewed.
#[must_use]
pub fn roll_type_contract(
    source_tag: &str,
    roll_type: Option<i32>,
) -> Option<&'static RollTypeContract> {
    let roll_type = roll_type?;
    OBSERVED_CONTRACTS
        .iter()
        .find(|entry| entry.roll_type == roll_type && entry.source_tag == source_tag)
}

/// Every registered contract in declaration order.
#[must_use]
pub fn observed_contracts() -> &'static [RollTypeContract] {
    OBSERVED_CONTRACTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<_> = OBSERVED_CONTRACTS
            .iter()
            .map(|entry| (entry.source_tag, entry.roll_type))
            .collect();
        assert_eq!(keys.len(), OBSERVED_CONTRACTS.len());
    }

    #[test]
    fn scored_contracts_name_a_category() {
        for entry in observed_contracts() {
            if entry.kind == ContractKind::ScoredDeterministic {
                assert!(entry.scoring_category.is_some(), "{} lacks a category", entry.label);
            }
            if entry.kind == ContractKind::Randomizer {
                assert!(entry.scoring_category.is_none());
            }
        }
    }

    #[test]
    fn lookup_distinguishes_source_tags() {
        let block = roll_type_contract("ResultRoll", Some(2)).unwrap();
        assert_eq!(block.label, "block_check");
        assert_eq!(block.scoring_category, Some(LuckCategory::Block));

        let summary = roll_type_contract("ResultBlockRoll", Some(3)).unwrap();
        assert_eq!(summary.kind, ContractKind::Summary);
        assert_eq!(
            roll_type_contract("ResultRoll", Some(3)).unwrap().label,
            "dodge_check"
        );
        assert!(roll_type_contract("ResultRoll", Some(999)).is_none());
        assert!(roll_type_contract("ResultRoll", None).is_none());
    }

    #[test]
    fn roll_candidates_are_deterministic_kinds() {
        assert!(ContractKind::ScoredDeterministic.is_roll_candidate());
        assert!(ContractKind::ExcludedDeterministic.is_roll_candidate());
        assert!(!ContractKind::Randomizer.is_roll_candidate());
        assert!(!ContractKind::Summary.is_roll_candidate());
    }

    #[test]
    fn low_confidence_entries_stay_unscored() {
        for entry in observed_contracts() {
            if entry.confidence == Confidence::Low {
                assert_ne!(entry.kind, ContractKind::ScoredDeterministic, "{}", entry.label);
            }
        }
    }
}
