//! Label tables for the numeric codes found in replay payloads.

use serde::{Deserialize, Serialize};

const STEP_TYPES: &[(i32, &str)] = &[
    (0, "move"),
    (1, "dodge"),
    (2, "damage"),
    (3, "ball"),
    (4, "pickup"),
    (5, "pass"),
    (6, "block"),
    (10, "gfi"),
    (13, "throw_team_mate"),
    (17, "leap"),
    (24, "stab"),
    (27, "special_skill"),
    (29, "special_action"),
    (31, "chainsaw"),
    (32, "bomb"),
];

const ACTION_CODES: &[(i32, &str)] = &[
    (1, "move"),
    (2, "blitz"),
    (3, "block"),
    (4, "pass"),
    (5, "handoff"),
    (6, "foul"),
    (15, "special"),
    (16, "special"),
];

const ROLL_TYPES: &[(i32, &str)] = &[
    (1, "armor"),
    (2, "block_dice"),
    (3, "dodge"),
    (4, "injury"),
    (7, "ko_recovery"),
    (8, "kickoff_scatter"),
    (9, "kickoff_event"),
    (10, "gfi"),
    (11, "pickup"),
    (12, "catch"),
    (25, "interception"),
    (26, "touchback"),
    (31, "casualty"),
    (34, "foul_armor"),
    (37, "foul_injury"),
    (41, "regeneration"),
    (43, "apothecary"),
    (71, "secret_weapon"),
    (73, "bombardier"),
];

const END_TURN_REASONS: &[(i32, &str)] = &[
    (1, "manual_end"),
    (2, "turnover"),
    (3, "forced_end"),
    (4, "touchdown_or_half_end"),
];

/// End-turn reason code for a coach voluntarily ending the turn.
pub const MANUAL_END_REASON: i32 = 1;

/// Families of numeric codes tracked by the unknown-code inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeCategory {
    Step,
    Action,
    Roll,
    EndTurnReason,
}

impl CodeCategory {
    pub const ALL: [Self; 4] = [Self::Step, Self::Action, Self::Roll, Self::EndTurnReason];

    const fn table(self) -> &'static [(i32, &'static str)] {
        match self {
            Self::Step => STEP_TYPES,
            Self::Action => ACTION_CODES,
            Self::Roll => ROLL_TYPES,
            Self::EndTurnReason => END_TURN_REASONS,
        }
    }

    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Action => "action",
            Self::Roll => "roll",
            Self::EndTurnReason => "end_turn_reason",
        }
    }

    /// Known label for a code, if the table has one.
    #[must_use]
    pub fn known_label(self, code: i32) -> Option<&'static str> {
        self.table()
            .iter()
            .find_map(|&(known, label)| (known == code).then_some(label))
    }

    #[must_use]
    pub fn is_known(self, code: i32) -> bool {
        self.known_label(code).is_some()
    }

    /// Label for a code, falling back to a predictable `<prefix>_unknown_<code>` form.
    #[must_use]
    pub fn label(self, code: i32) -> String {
        self.known_label(code).map_or_else(
            || format!("{}_unknown_{code}", self.prefix()),
            str::to_string,
        )
    }

    /// Label for an optional code; absent codes have no label.
    #[must_use]
    pub fn label_opt(self, code: Option<i32>) -> Option<String> {
        code.map(|value| self.label(value))
    }
}
