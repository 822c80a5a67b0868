//! Parsed replay model.
//!
//! The model is the artifact consumed by both the luck engine and the coaching
//! layer. It is built once per upload and never mutated after it is returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod attribution;
pub mod decode;
pub mod extract;
pub mod mappings;
pub mod parse;
pub mod timeline;
mod xml;

pub use attribution::{
    PlayerOwnershipIndex, TurnOwnershipInference, annotate_turn_attribution, infer_turn_ownership,
    scope_replay_to_team, scope_turn_to_team,
};
pub use decode::{DecodedReplay, SourceFormat, decode_replay_input};
pub use extract::{ExtractedTurns, extract_structured_turns};
pub use mappings::CodeCategory;
pub use parse::parse_replay_xml;
pub use timeline::{KeywordHits, TimelineTurn, build_timeline};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach: Option<String>,
}

impl Team {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coach: None,
        }
    }

    /// Placeholder names look like `Team 3`.
    #[must_use]
    pub fn has_generic_name(&self) -> bool {
        is_generic_team_name(&self.name)
    }
}

pub(crate) fn is_generic_team_name(name: &str) -> bool {
    let trimmed = name.trim();
    match (trimmed.get(..5), trimmed.get(5..)) {
        (Some(prefix), Some(number)) => {
            prefix.eq_ignore_ascii_case("team ")
                && !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Semantic kind of a replay event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayEventKind {
    Block,
    Blitz,
    Foul,
    Dodge,
    Reroll,
    Casualty,
    BallState,
    Turnover,
    Roll,
}

impl ReplayEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Blitz => "blitz",
            Self::Foul => "foul",
            Self::Dodge => "dodge",
            Self::Reroll => "reroll",
            Self::Casualty => "casualty",
            Self::BallState => "ball_state",
            Self::Turnover => "turnover",
            Self::Roll => "roll",
        }
    }
}

/// How an event's acting team was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSource {
    Explicit,
    PlayerMap,
    TurnInferred,
}

/// Acting team of an event. The id and its provenance are always set together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorTeam {
    #[serde(rename = "actorTeamId")]
    pub team_id: String,
    #[serde(rename = "actorTeamSource")]
    pub source: AttributionSource,
}

impl ActorTeam {
    #[must_use]
    pub fn new(team_id: impl Into<String>, source: AttributionSource) -> Self {
        Self {
            team_id: team_id.into(),
            source,
        }
    }
}

/// Trust tier for an inferred turn owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Die {
    pub value: i32,
    #[serde(default)]
    pub die_type: Option<i32>,
}

impl Die {
    #[must_use]
    pub const fn new(value: i32, die_type: Option<i32>) -> Self {
        Self { value, die_type }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub value: i32,
    #[serde(default)]
    pub skill: Option<i32>,
}

/// Promoted fields of a dice roll payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollFields {
    pub roll_type: Option<i32>,
    pub requirement: Option<i32>,
    pub difficulty: Option<i32>,
    pub outcome: Option<i32>,
    pub dice: SmallVec<[Die; 3]>,
    pub modifiers: Vec<Modifier>,
}

impl RollFields {
    /// Success threshold: difficulty when positive, else a positive requirement.
    #[must_use]
    pub fn target(&self) -> Option<i32> {
        self.difficulty
            .filter(|value| *value > 0)
            .or_else(|| self.requirement.filter(|value| *value > 0))
    }

    #[must_use]
    pub fn dice_values(&self) -> Vec<i32> {
        self.dice.iter().map(|die| die.value).collect()
    }
}

/// Promoted fields of a team reroll question or answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerollFields {
    pub can_use_team_reroll: bool,
    pub can_use_pro_reroll: bool,
    pub used: bool,
}

/// First-class view of a nested payload, chosen by its root tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadDetail {
    Roll(RollFields),
    Reroll(RerollFields),
    #[default]
    Opaque,
}

/// Decoded nested payload: promoted fields plus every other leaf value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub detail: PayloadDetail,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl EventPayload {
    #[must_use]
    pub fn roll(fields: RollFields) -> Self {
        Self {
            detail: PayloadDetail::Roll(fields),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn roll_fields(&self) -> Option<&RollFields> {
        match &self.detail {
            PayloadDetail::Roll(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub const fn reroll_fields(&self) -> Option<&RerollFields> {
        match &self.detail {
            PayloadDetail::Reroll(fields) => Some(fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEvent {
    #[serde(rename = "type")]
    pub kind: ReplayEventKind,
    pub source_tag: String,
    pub source_label: Option<String>,
    pub player_id: Option<String>,
    pub target_id: Option<String>,
    pub team_id: Option<String>,
    #[serde(flatten)]
    pub actor: Option<ActorTeam>,
    pub gamer_id: Option<String>,
    pub action_code: Option<i32>,
    pub action_label: Option<String>,
    pub step_type: Option<i32>,
    pub step_label: Option<String>,
    pub roll_type: Option<i32>,
    pub roll_label: Option<String>,
    pub reason_code: Option<i32>,
    pub reason_label: Option<String>,
    pub finishing_turn_type: Option<i32>,
    pub payload: Option<EventPayload>,
}

impl ReplayEvent {
    #[must_use]
    pub fn new(kind: ReplayEventKind, source_tag: impl Into<String>) -> Self {
        Self {
            kind,
            source_tag: source_tag.into(),
            source_label: None,
            player_id: None,
            target_id: None,
            team_id: None,
            actor: None,
            gamer_id: None,
            action_code: None,
            action_label: None,
            step_type: None,
            step_label: None,
            roll_type: None,
            roll_label: None,
            reason_code: None,
            reason_label: None,
            finishing_turn_type: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_player(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Set an explicit team, which also becomes the explicit actor.
    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        let team_id = team_id.into();
        self.actor = Some(ActorTeam::new(team_id.clone(), AttributionSource::Explicit));
        self.team_id = Some(team_id);
        self
    }

    #[must_use]
    pub fn with_step(mut self, step_type: i32) -> Self {
        self.step_type = Some(step_type);
        self.step_label = CodeCategory::Step.label_opt(Some(step_type));
        self
    }

    /// Attach a roll payload and mirror its roll type onto the event.
    #[must_use]
    pub fn with_roll(mut self, fields: RollFields) -> Self {
        self.roll_type = fields.roll_type;
        self.payload = Some(EventPayload::roll(fields));
        self
    }

    #[must_use]
    pub fn roll_fields(&self) -> Option<&RollFields> {
        self.payload.as_ref().and_then(EventPayload::roll_fields)
    }

    #[must_use]
    pub fn actor_team_id(&self) -> Option<&str> {
        self.actor.as_ref().map(|actor| actor.team_id.as_str())
    }

    /// Labels folded into a turn's action texts.
    pub(crate) fn action_tokens(&self) -> impl Iterator<Item = String> + '_ {
        [
            Some(self.kind.as_str()),
            Some(self.source_tag.as_str()),
            self.action_label.as_deref(),
            self.step_label.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayTurn {
    pub turn_number: u32,
    pub team_id: Option<String>,
    pub inferred_team_id: Option<String>,
    pub team_inference_confidence: Option<Confidence>,
    pub gamer_id: Option<String>,
    pub ball_carrier_player_id: Option<String>,
    /// The turn ended for any reason other than a manual end.
    pub possible_turnover: bool,
    pub end_turn_reason: Option<i32>,
    pub end_turn_reason_label: Option<String>,
    pub finishing_turn_type: Option<i32>,
    pub events: Vec<ReplayEvent>,
    pub action_texts: Vec<String>,
    pub event_count: usize,
}

impl ReplayTurn {
    #[must_use]
    pub const fn new(turn_number: u32) -> Self {
        Self {
            turn_number,
            team_id: None,
            inferred_team_id: None,
            team_inference_confidence: None,
            gamer_id: None,
            ball_carrier_player_id: None,
            possible_turnover: false,
            end_turn_reason: None,
            end_turn_reason_label: None,
            finishing_turn_type: None,
            events: Vec::new(),
            action_texts: Vec::new(),
            event_count: 0,
        }
    }

    /// Owning team: explicit first, then the inferred one.
    #[must_use]
    pub fn owner_team_id(&self) -> Option<&str> {
        self.team_id.as_deref().or(self.inferred_team_id.as_deref())
    }

    /// Recompute action texts and event count from the current events.
    pub fn refresh_summary(&mut self) {
        let mut texts: Vec<String> = Vec::new();
        for token in self.events.iter().flat_map(ReplayEvent::action_tokens) {
            if !texts.contains(&token) {
                texts.push(token);
            }
        }
        self.action_texts = texts;
        self.event_count = self.events.len();
    }
}

/// One unmapped numeric code and how often it appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownCode {
    pub category: CodeCategory,
    pub code: i32,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownCodeTotals {
    pub step: usize,
    pub action: usize,
    pub roll: usize,
    pub end_turn_reason: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnAttributionStats {
    pub total_turns: usize,
    pub explicit_team_turns: usize,
    pub inferred_team_turns: usize,
    pub unresolved_team_turns: usize,
    pub high_confidence_inferences: usize,
    pub medium_confidence_inferences: usize,
    pub low_confidence_inferences: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributionStats {
    pub explicit: usize,
    pub player_map: usize,
    pub turn_inferred: usize,
    pub unresolved: usize,
}

impl EventAttributionStats {
    #[must_use]
    pub const fn attributed(&self) -> usize {
        self.explicit + self.player_map + self.turn_inferred
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserDiagnostics {
    pub unknown_code_total: usize,
    pub unknown_codes_by_category: UnknownCodeTotals,
    pub turn_attribution: TurnAttributionStats,
    pub event_attribution: EventAttributionStats,
}

/// Root aggregate of a parsed replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayModel {
    pub match_id: String,
    pub root_tag: String,
    pub replay_version: Option<String>,
    pub source_format: SourceFormat,
    pub teams: Vec<Team>,
    pub analysis_team_id: Option<String>,
    /// Roster names keyed `teamId:playerId`.
    pub player_names_by_team_and_id: BTreeMap<String, String>,
    /// Roster names keyed by player id; ids with conflicting names are left out.
    pub player_names_by_id: BTreeMap<String, String>,
    pub turns: Vec<ReplayTurn>,
    pub unknown_codes: Vec<UnknownCode>,
    pub diagnostics: ParserDiagnostics,
}

impl ReplayModel {
    #[must_use]
    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == team_id)
    }

    /// Every event with its turn and its index inside that turn.
    pub fn events(&self) -> impl Iterator<Item = (&ReplayTurn, usize, &ReplayEvent)> {
        self.turns.iter().flat_map(|turn| {
            turn.events
                .iter()
                .enumerate()
                .map(move |(index, event)| (turn, index, event))
        })
    }

    #[must_use]
    pub fn player_name(&self, team_id: Option<&str>, player_id: &str) -> Option<&str> {
        team_id
            .and_then(|team| {
                self.player_names_by_team_and_id
                    .get(&team_player_key(team, player_id))
            })
            .or_else(|| self.player_names_by_id.get(player_id))
            .map(String::as_str)
    }
}

/// Composite roster key for a player on a team.
#[must_use]
pub fn team_player_key(team_id: &str, player_id: &str) -> String {
    format!("{team_id}:{player_id}")
}

/// Split a `teamId:playerId` key; both halves must be non-empty.
#[must_use]
pub fn split_team_player_key(key: &str) -> Option<(&str, &str)> {
    let (team, player) = key.split_once(':')?;
    (!team.is_empty() && !player.is_empty()).then_some((team, player))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_team_names_are_detected() {
        assert!(is_generic_team_name("Team 3"));
        assert!(is_generic_team_name(" team 12 "));
        assert!(!is_generic_team_name("Team Rocket"));
        assert!(!is_generic_team_name("Team "));
        assert!(Team::new("1", "Team 1").has_generic_name());
    }

    #[test]
    fn team_player_keys_round_trip() {
        let key = team_player_key("0", "12");
        assert_eq!(split_team_player_key(&key), Some(("0", "12")));
        assert_eq!(split_team_player_key(":12"), None);
        assert_eq!(split_team_player_key("0:"), None);
        assert_eq!(split_team_player_key("nokey"), None);
    }

    #[test]
    fn event_serializes_actor_fields_flat() {
        let event = ReplayEvent::new(ReplayEventKind::Dodge, "ResultRoll")
            .with_player("7")
            .with_team("1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "dodge");
        assert_eq!(value["actorTeamId"], "1");
        assert_eq!(value["actorTeamSource"], "explicit");
        assert_eq!(value["sourceTag"], "ResultRoll");
    }

    #[test]
    fn roll_target_prefers_positive_difficulty() {
        let fields = RollFields {
            requirement: Some(3),
            difficulty: Some(0),
            ..RollFields::default()
        };
        assert_eq!(fields.target(), Some(3));
        let fields = RollFields {
            requirement: Some(3),
            difficulty: Some(4),
            ..RollFields::default()
        };
        assert_eq!(fields.target(), Some(4));
        assert_eq!(RollFields::default().target(), None);
    }

    #[test]
    fn refresh_summary_dedupes_tokens() {
        let mut turn = ReplayTurn::new(1);
        turn.events.push(ReplayEvent::new(ReplayEventKind::Block, "ResultBlockRoll").with_step(6));
        turn.events.push(ReplayEvent::new(ReplayEventKind::Block, "ResultBlockRoll"));
        turn.refresh_summary();
        assert_eq!(turn.event_count, 2);
        assert_eq!(turn.action_texts, vec!["block", "resultblockroll"]);
    }
}
