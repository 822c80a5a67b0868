//! Replay XML to [`ReplayModel`].
//!
//! Structured marker extraction provides turns and events. Teams, rosters and
//! the match id are read from the document tree, with a generic tree walk for
//! flat or legacy layouts that carry no markers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node};

use super::attribution::{PlayerOwnershipIndex, annotate_turn_attribution};
use super::decode::decode_base64_text;
use super::extract::{cached, extract_structured_turns};
use super::mappings::CodeCategory;
use super::xml::{
    all_at_path, child, descendants_named, element_children, field, field_at,
    first_field, leaf_text,
};
use super::{
    AttributionSource, Confidence, ParserDiagnostics, ReplayModel, ReplayTurn, SourceFormat, Team,
    UnknownCode, UnknownCodeTotals, is_generic_team_name, team_player_key,
};
use crate::error::ReplayValidationError;
use crate::fingerprint::short_hex_digest;

const GAMER_INFOS_PATH: &[&str] = &[
    "NotificationGameJoined",
    "GameInfos",
    "GamersInfos",
    "GamerInfos",
];
const TEAM_STATES_PATH: &[&str] = &[
    "NotificationGameJoined",
    "InitialBoardState",
    "ListTeams",
    "TeamState",
];

const MATCH_ID_PATHS: &[&[&str]] = &[
    &["NotificationGameJoined", "GameInfos", "Competition", "CompetitionInfos", "MatchId"],
    &["NotificationGameJoined", "GameInfos", "Id"],
    &["MatchId"],
    &["matchId"],
    &["Metadata", "MatchId"],
    &["Game", "Id"],
    &["id"],
];

const TEAM_PATHS: &[&[&str]] = &[
    TEAM_STATES_PATH,
    &["Teams", "Team"],
    &["Sides", "Side"],
    &["TeamStates", "TeamState"],
];
const TEAM_ELEMENT_NAMES: &[&str] = &["Side", "TeamState", "Team"];

const TURN_PATHS: &[&[&str]] = &[
    &["Turns", "Turn"],
    &["GameTurns", "GameTurn"],
    &["TurnHistory", "Turn"],
];
const TURN_ELEMENT_NAMES: &[&str] = &["Turn", "GameTurn", "PlayerTurn"];
const TURN_NUMBER_FIELDS: &[&str] = &["number", "turn", "Turn", "index", "turnNumber", "Sequence"];
const TURN_TEAM_FIELDS: &[&str] = &["teamId", "TeamId", "team", "Side", "sideId"];
const EVENT_BUCKETS: &[&str] = &[
    "Events", "events", "Actions", "actions", "Steps", "steps", "Plays", "plays",
];
const MAX_ACTION_TOKENS: usize = 4000;

/// Parse replay XML into the model consumed by the luck engine.
///
/// # Errors
///
/// Returns `ReplayValidationError::EmptyXml` for blank input, `MalformedXml`
/// when the document does not parse, and `UnsupportedVersion` when a
/// `ReplayVersion` is present but not four dash-separated numbers.
pub fn parse_replay_xml(
    xml: &str,
    source_format: SourceFormat,
) -> Result<ReplayModel, ReplayValidationError> {
    let xml = xml.trim();
    if xml.is_empty() {
        return Err(ReplayValidationError::EmptyXml);
    }
    let document = Document::parse(xml).map_err(|err| ReplayValidationError::MalformedXml {
        detail: err.to_string(),
    })?;
    let root = document.root_element();

    let replay_version = field(root, "ReplayVersion");
    if let Some(version) = &replay_version
        && !is_supported_version(version)
    {
        return Err(ReplayValidationError::UnsupportedVersion {
            version: version.clone(),
        });
    }

    let extracted = extract_structured_turns(xml);
    let gamer_teams = teams_from_gamer_infos(root);
    let teams = if gamer_teams.len() >= 2 {
        gamer_teams
    } else {
        fallback_teams(root)
    };
    let (player_names_by_team_and_id, player_names_by_id) = player_names(root);

    let base_turns = if extracted.turns.is_empty() {
        let turns = fallback_turns(root);
        log::warn!(
            "replay has no structured markers; recovered {} turns from the document tree",
            turns.len()
        );
        turns
    } else {
        extracted.turns
    };

    let explicit_turns: BTreeSet<usize> = base_turns
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.team_id.is_some())
        .map(|(index, _)| index)
        .collect();
    let ownership = PlayerOwnershipIndex::from_roster(&player_names_by_team_and_id);
    let turns: Vec<ReplayTurn> = base_turns
        .into_iter()
        .map(|turn| annotate_turn_attribution(turn, &ownership))
        .collect();
    let diagnostics = build_diagnostics(&turns, &extracted.unknown_codes, &explicit_turns);

    let match_id = MATCH_ID_PATHS
        .iter()
        .find_map(|path| field_at(root, path))
        .map(|value| decode_readable_text(&value))
        .unwrap_or_else(|| format!("match-{}", short_hex_digest(xml.as_bytes())));

    log::debug!(
        "parsed replay {match_id}: {} teams, {} turns, {} unknown codes",
        teams.len(),
        turns.len(),
        diagnostics.unknown_code_total
    );

    Ok(ReplayModel {
        match_id,
        root_tag: root.tag_name().name().to_string(),
        replay_version,
        source_format,
        teams,
        analysis_team_id: None,
        player_names_by_team_and_id,
        player_names_by_id,
        turns,
        unknown_codes: extracted.unknown_codes,
        diagnostics,
    })
}

/// Versions look like `1-2-3-4`.
fn is_supported_version(version: &str) -> bool {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"^[0-9]+-[0-9]+-[0-9]+-[0-9]+$").is_some_and(|pattern| pattern.is_match(version))
}

fn is_numeric_label(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Names and ids are sometimes base64 of plain ASCII; decode those, keep anything else.
pub(crate) fn decode_readable_text(value: &str) -> String {
    let trimmed = value.trim();
    let body = trimmed.trim_end_matches('=');
    let looks_encoded = !body.is_empty()
        && trimmed.len() - body.len() <= 2
        && trimmed.len() % 4 == 0
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/');
    if !looks_encoded {
        return value.to_string();
    }
    decode_base64_text(trimmed)
        .filter(|decoded| {
            !decoded.is_empty()
                && decoded
                    .chars()
                    .all(|c| matches!(c, ' '..='~' | '\t' | '\r' | '\n'))
        })
        .unwrap_or_else(|| value.to_string())
}

fn choose_team_name(candidate: &str, index: usize) -> String {
    let clean = candidate.trim();
    if clean.is_empty() || is_generic_team_name(clean) || is_numeric_label(clean) {
        format!("Team {}", index + 1)
    } else {
        clean.to_string()
    }
}

fn choose_coach_name(candidate: &str) -> Option<String> {
    let clean = candidate.trim();
    (!clean.is_empty() && !is_numeric_label(clean)).then(|| clean.to_string())
}

/// Keep one team per id, upgrading to a real name or a known coach.
fn dedupe_teams(teams: Vec<Team>) -> Vec<Team> {
    let mut deduped: Vec<Team> = Vec::with_capacity(teams.len());
    for team in teams {
        match deduped.iter_mut().find(|existing| existing.id == team.id) {
            None => deduped.push(team),
            Some(existing) => {
                let better_name = existing.has_generic_name() && !team.has_generic_name();
                let adds_coach = existing.coach.is_none() && team.coach.is_some();
                if better_name || adds_coach {
                    *existing = team;
                }
            }
        }
    }
    deduped
}

fn field_in(node: Option<Node<'_, '_>>, name: &str) -> Option<String> {
    node.and_then(|node| field(node, name))
}

fn teams_from_gamer_infos(root: Node<'_, '_>) -> Vec<Team> {
    let teams = all_at_path(root, GAMER_INFOS_PATH)
        .into_iter()
        .enumerate()
        .map(|(index, gamer)| {
            let roster = child(gamer, "Roster");
            let roster_team = roster.and_then(|node| child(node, "Team"));
            let id = field_in(roster_team, "TeamId")
                .or_else(|| field(gamer, "TeamId"))
                .or_else(|| field_in(roster, "TeamId"))
                .or_else(|| field(gamer, "Slot"))
                .unwrap_or_else(|| index.to_string());
            let name = field_in(roster, "Name")
                .or_else(|| field_in(roster_team, "Name"))
                .map(|name| decode_readable_text(&name))
                .unwrap_or_default();
            let coach = field(gamer, "Name")
                .or_else(|| field_in(roster, "Coach"))
                .or_else(|| field_in(roster_team, "Coach"))
                .map(|coach| decode_readable_text(&coach))
                .and_then(|coach| choose_coach_name(&coach));

            Team {
                id,
                name: choose_team_name(&name, index),
                coach,
            }
        })
        .collect();
    dedupe_teams(teams)
}

fn push_unique<'a, 'input>(
    nodes: &mut Vec<Node<'a, 'input>>,
    candidates: impl IntoIterator<Item = Node<'a, 'input>>,
) {
    for candidate in candidates {
        if !nodes.contains(&candidate) {
            nodes.push(candidate);
        }
    }
}

fn team_candidates<'a, 'input>(root: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut strict = Vec::new();
    for path in TEAM_PATHS {
        push_unique(&mut strict, all_at_path(root, path));
    }
    if !strict.is_empty() {
        return strict;
    }

    let scope = child(root, "NotificationGameJoined").unwrap_or(root);
    let mut walked = Vec::new();
    for name in TEAM_ELEMENT_NAMES {
        push_unique(&mut walked, descendants_named(scope, name));
    }
    walked
}

fn normalize_team(node: Node<'_, '_>, index: usize) -> Team {
    let id = first_field(node, &["id", "teamId", "TeamId", "ID", "SideId", "GamerSlot"])
        .unwrap_or_else(|| format!("team-{}", index + 1));
    let name = first_field(node, &["name", "teamName", "TeamName", "Name", "SideName"])
        .map_or_else(|| format!("Team {}", index + 1), |name| decode_readable_text(&name));
    let coach = first_field(node, &["coach", "Coach", "CoachName"])
        .map(|coach| decode_readable_text(&coach));
    Team { id, name, coach }
}

fn fallback_teams(root: Node<'_, '_>) -> Vec<Team> {
    let normalized = team_candidates(root)
        .into_iter()
        .enumerate()
        .map(|(index, node)| normalize_team(node, index))
        .collect();
    let deduped = dedupe_teams(normalized);
    let named: Vec<Team> = deduped
        .iter()
        .filter(|team| !team.has_generic_name())
        .cloned()
        .collect();
    if named.len() >= 2 { named } else { deduped }
}

fn player_names(root: Node<'_, '_>) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut by_team_and_id = BTreeMap::new();
    let mut by_id: BTreeMap<String, String> = BTreeMap::new();
    let mut conflicting: BTreeSet<String> = BTreeSet::new();

    for state in all_at_path(root, TEAM_STATES_PATH) {
        let state_team = field_at(state, &["Data", "TeamId"])
            .or_else(|| field(state, "TeamId"))
            .or_else(|| field(state, "Side"));
        for player in all_at_path(state, &["ListPitchPlayers", "PlayerState"]) {
            let Some(player_id) = first_field(player, &["Id", "PlayerId", "id"]) else {
                continue;
            };
            let Some(name) = field_at(player, &["Data", "Name"])
                .or_else(|| field(player, "Name"))
                .map(|name| decode_readable_text(&name).trim().to_string())
                .filter(|name| !name.is_empty() && !is_numeric_label(name))
            else {
                continue;
            };
            let team = field_at(player, &["Data", "TeamId"])
                .or_else(|| field(player, "TeamId"))
                .or_else(|| state_team.clone());

            if let Some(team) = team {
                by_team_and_id.insert(team_player_key(&team, &player_id), name.clone());
            }
            if conflicting.contains(&player_id) {
                continue;
            }
            let existing = by_id.get(&player_id).cloned();
            match existing {
                None => {
                    by_id.insert(player_id, name);
                }
                Some(existing) if existing != name => {
                    by_id.remove(&player_id);
                    conflicting.insert(player_id);
                }
                Some(_) => {}
            }
        }
    }
    (by_team_and_id, by_id)
}

/// Lowercase word tokens, splitting camelCase and any non-alphanumeric run.
fn tokenize(raw: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let mut previous_lower = false;
    for c in raw.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            spaced.push(' ');
        }
        previous_lower = c.is_ascii_lowercase();
        spaced.push(c.to_ascii_lowercase());
    }
    spaced
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_number(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

fn push_text(text: &str, tokens: &mut Vec<String>) {
    if tokens.len() <= MAX_ACTION_TOKENS && !is_number(text) {
        tokens.extend(tokenize(text));
    }
}

fn action_texts(turn: Node<'_, '_>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for node in turn.descendants().filter(Node::is_element) {
        if node != turn {
            push_text(node.tag_name().name(), &mut tokens);
        }
        for attribute in node.attributes() {
            push_text(attribute.name(), &mut tokens);
            push_text(attribute.value(), &mut tokens);
        }
        if node != turn
            && let Some(text) = leaf_text(node)
        {
            push_text(&text, &mut tokens);
        }
    }

    let mut seen = BTreeSet::new();
    tokens.retain(|token| seen.insert(token.clone()));
    tokens
}

/// Rough event count for a turn without structured events.
fn estimate_event_count(turn: Node<'_, '_>) -> usize {
    for bucket in EVENT_BUCKETS {
        let matches: Vec<Node<'_, '_>> = element_children(turn)
            .filter(|node| node.tag_name().name() == *bucket)
            .collect();
        match matches.as_slice() {
            [] => {}
            [single] => return element_children(*single).count().max(1),
            many => return many.len(),
        }
    }
    (turn.attributes().count() + distinct_child_names(turn)).max(1)
}

fn distinct_child_names(node: Node<'_, '_>) -> usize {
    element_children(node)
        .map(|child| child.tag_name().name())
        .collect::<BTreeSet<_>>()
        .len()
}

fn normalize_turn(node: Node<'_, '_>, index: usize) -> ReplayTurn {
    let fallback_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
    let turn_number = first_field(node, TURN_NUMBER_FIELDS)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(fallback_number);
    let mut turn = ReplayTurn::new(turn_number);
    turn.team_id = first_field(node, TURN_TEAM_FIELDS);
    turn.action_texts = action_texts(node);
    turn.event_count = estimate_event_count(node);
    turn
}

fn has_content(node: Node<'_, '_>) -> bool {
    node.attributes().next().is_some() || element_children(node).next().is_some()
}

fn fallback_turns(root: Node<'_, '_>) -> Vec<ReplayTurn> {
    let mut candidates = Vec::new();
    for path in TURN_PATHS {
        push_unique(&mut candidates, all_at_path(root, path));
    }
    for name in TURN_ELEMENT_NAMES {
        push_unique(
            &mut candidates,
            descendants_named(root, name).filter(|node| has_content(*node)),
        );
    }
    candidates
        .into_iter()
        .enumerate()
        .map(|(index, node)| normalize_turn(node, index))
        .collect()
}

fn unknown_code_totals(unknown_codes: &[UnknownCode]) -> UnknownCodeTotals {
    let mut totals = UnknownCodeTotals::default();
    for unknown in unknown_codes {
        let slot = match unknown.category {
            CodeCategory::Step => &mut totals.step,
            CodeCategory::Action => &mut totals.action,
            CodeCategory::Roll => &mut totals.roll,
            CodeCategory::EndTurnReason => &mut totals.end_turn_reason,
        };
        *slot += unknown.occurrences;
    }
    totals
}

fn build_diagnostics(
    turns: &[ReplayTurn],
    unknown_codes: &[UnknownCode],
    explicit_turns: &BTreeSet<usize>,
) -> ParserDiagnostics {
    let mut diagnostics = ParserDiagnostics {
        unknown_code_total: unknown_codes.iter().map(|code| code.occurrences).sum(),
        unknown_codes_by_category: unknown_code_totals(unknown_codes),
        ..ParserDiagnostics::default()
    };
    let turn_stats = &mut diagnostics.turn_attribution;
    let event_stats = &mut diagnostics.event_attribution;
    turn_stats.total_turns = turns.len();
    turn_stats.explicit_team_turns = explicit_turns.len();

    for (index, turn) in turns.iter().enumerate() {
        let explicit = explicit_turns.contains(&index);
        match (explicit, turn.inferred_team_id.is_some()) {
            (false, true) => turn_stats.inferred_team_turns += 1,
            (false, false) => turn_stats.unresolved_team_turns += 1,
            _ => {}
        }
        match turn.team_inference_confidence {
            Some(Confidence::High) => turn_stats.high_confidence_inferences += 1,
            Some(Confidence::Medium) => turn_stats.medium_confidence_inferences += 1,
            Some(Confidence::Low) => turn_stats.low_confidence_inferences += 1,
            None => {}
        }
        for event in &turn.events {
            match event.actor.as_ref().map(|actor| actor.source) {
                Some(AttributionSource::Explicit) => event_stats.explicit += 1,
                Some(AttributionSource::PlayerMap) => event_stats.player_map += 1,
                Some(AttributionSource::TurnInferred) => event_stats.turn_inferred += 1,
                None => event_stats.unresolved += 1,
            }
        }
    }
    diagnostics
}
