//! Team ownership of players, events and turns.
//!
//! Replays often omit the acting team. Roster entries give a player to team
//! map, and turns without an explicit owner are scored by weighted evidence.
//! A player id listed under two teams is ambiguous and never resolves.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    ActorTeam, AttributionSource, Confidence, ReplayEvent, ReplayEventKind, ReplayModel,
    ReplayTurn, split_team_player_key,
};

const EXPLICIT_TURN_TEAM_WEIGHT: u32 = 3;
const CARRIER_WEIGHT: u32 = 3;

/// Roster-derived lookup between players and teams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerOwnershipIndex {
    player_to_team: BTreeMap<String, String>,
    ambiguous_player_ids: BTreeSet<String>,
    team_to_players: BTreeMap<String, BTreeSet<String>>,
}

impl PlayerOwnershipIndex {
    /// Build from names keyed `teamId:playerId`. Malformed keys are skipped.
    #[must_use]
    pub fn from_roster(names_by_team_and_id: &BTreeMap<String, String>) -> Self {
        let mut index = Self::default();
        for key in names_by_team_and_id.keys() {
            let Some((team_id, player_id)) = split_team_player_key(key) else {
                continue;
            };
            let existing = index.player_to_team.get(player_id).cloned();
            match existing {
                None if !index.ambiguous_player_ids.contains(player_id) => {
                    index
                        .player_to_team
                        .insert(player_id.to_string(), team_id.to_string());
                }
                Some(existing) if existing != team_id => {
                    index.player_to_team.remove(player_id);
                    index.ambiguous_player_ids.insert(player_id.to_string());
                }
                _ => {}
            }
            index
                .team_to_players
                .entry(team_id.to_string())
                .or_default()
                .insert(player_id.to_string());
        }
        index
    }

    #[must_use]
    pub fn from_replay(replay: &ReplayModel) -> Self {
        Self::from_roster(&replay.player_names_by_team_and_id)
    }

    /// Team of an unambiguous player.
    #[must_use]
    pub fn player_team(&self, player_id: &str) -> Option<&str> {
        self.player_to_team.get(player_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_ambiguous(&self, player_id: &str) -> bool {
        self.ambiguous_player_ids.contains(player_id)
    }

    /// Every player id rostered under `team_id`, ambiguous ones included.
    pub fn team_players(&self, team_id: &str) -> impl Iterator<Item = &str> {
        self.team_to_players
            .get(team_id)
            .into_iter()
            .flat_map(|players| players.iter().map(String::as_str))
    }
}

/// Evidence-weighted owner of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOwnershipInference {
    pub team_id: Option<String>,
    pub confidence: Confidence,
    pub scores: BTreeMap<String, u32>,
}

const fn event_weight(kind: ReplayEventKind) -> u32 {
    match kind {
        ReplayEventKind::Dodge
        | ReplayEventKind::Blitz
        | ReplayEventKind::Foul
        | ReplayEventKind::Reroll => 4,
        ReplayEventKind::Block => 3,
        ReplayEventKind::BallState => 2,
        _ => 1,
    }
}

const fn confidence_from(top: u32, runner_up: u32) -> Confidence {
    let lead = top.saturating_sub(runner_up);
    if top >= 10 && lead >= 5 {
        Confidence::High
    } else if top >= 5 && lead >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Team an event resolves to without looking at its turn.
fn resolve_event_team(event: &ReplayEvent, index: &PlayerOwnershipIndex) -> Option<ActorTeam> {
    if let Some(actor) = &event.actor {
        return Some(actor.clone());
    }
    if let Some(team_id) = &event.team_id {
        return Some(ActorTeam::new(team_id.clone(), AttributionSource::Explicit));
    }
    event
        .player_id
        .as_deref()
        .and_then(|player| index.player_team(player))
        .map(|team_id| ActorTeam::new(team_id, AttributionSource::PlayerMap))
}

/// Score every candidate owner of `turn`.
///
/// An explicit turn team and a known carrier add 3 each; events add their
/// kind weight to the team they resolve to. Ties produce no owner.
#[must_use]
pub fn infer_turn_ownership(
    turn: &ReplayTurn,
    index: &PlayerOwnershipIndex,
) -> TurnOwnershipInference {
    let mut scores: BTreeMap<String, u32> = BTreeMap::new();
    let mut add = |team_id: &str, weight: u32| {
        *scores.entry(team_id.to_string()).or_default() += weight;
    };

    if let Some(team_id) = &turn.team_id {
        add(team_id, EXPLICIT_TURN_TEAM_WEIGHT);
    }
    for event in &turn.events {
        if let Some(actor) = resolve_event_team(event, index) {
            add(&actor.team_id, event_weight(event.kind));
        }
    }
    if let Some(team_id) = turn
        .ball_carrier_player_id
        .as_deref()
        .and_then(|carrier| index.player_team(carrier))
    {
        add(team_id, CARRIER_WEIGHT);
    }

    let mut ranked: Vec<(&String, u32)> =
        scores.iter().map(|(team, score)| (team, *score)).collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1));

    let (team_id, confidence) = match ranked.as_slice() {
        [] => (None, Confidence::Low),
        [(_, top), (_, second), ..] if top == second => (None, Confidence::Low),
        [(team, top), rest @ ..] => {
            let runner_up = rest.first().map_or(0, |(_, score)| *score);
            (Some((*team).clone()), confidence_from(*top, runner_up))
        }
    };

    TurnOwnershipInference {
        team_id,
        confidence,
        scores,
    }
}

fn attribute_events(
    events: &mut [ReplayEvent],
    turn_team: Option<&str>,
    index: &PlayerOwnershipIndex,
) {
    for event in events {
        event.actor = resolve_event_team(event, index).or_else(|| {
            turn_team.map(|team_id| ActorTeam::new(team_id, AttributionSource::TurnInferred))
        });
    }
}

/// Fill actor teams on every event and record the inferred turn owner.
///
/// An inferred owner only becomes the turn's team at medium confidence or better.
#[must_use]
pub fn annotate_turn_attribution(mut turn: ReplayTurn, index: &PlayerOwnershipIndex) -> ReplayTurn {
    let inferred = infer_turn_ownership(&turn, index);
    attribute_events(&mut turn.events, inferred.team_id.as_deref(), index);

    if turn.team_id.is_none() && inferred.confidence >= Confidence::Medium {
        turn.team_id.clone_from(&inferred.team_id);
    }
    turn.inferred_team_id = inferred.team_id;
    turn.team_inference_confidence = Some(inferred.confidence);
    turn
}

/// View of `turn` restricted to `team_id`.
///
/// Events that resolve to another team are dropped, as are events whose player
/// belongs to another team. The ball carrier is blanked when it is an opponent.
#[must_use]
pub fn scope_turn_to_team(
    turn: &ReplayTurn,
    team_id: &str,
    index: &PlayerOwnershipIndex,
    turn_number: u32,
) -> ReplayTurn {
    let inferred = infer_turn_ownership(turn, index);
    let turn_team = inferred.team_id.clone().or_else(|| turn.team_id.clone());

    let mut events = turn.events.clone();
    attribute_events(&mut events, turn_team.as_deref(), index);
    events.retain(|event| {
        let actor_matches = event.actor_team_id().is_none_or(|actor| actor == team_id);
        let player_matches = event
            .player_id
            .as_deref()
            .and_then(|player| index.player_team(player))
            .is_none_or(|owner| owner == team_id);
        actor_matches && player_matches
    });

    let carrier = turn.ball_carrier_player_id.clone().filter(|carrier| {
        index
            .player_team(carrier)
            .is_none_or(|owner| owner == team_id)
    });

    let mut scoped = ReplayTurn {
        turn_number,
        team_id: Some(team_id.to_string()),
        inferred_team_id: turn_team,
        team_inference_confidence: Some(inferred.confidence),
        ball_carrier_player_id: carrier,
        events,
        ..turn.clone()
    };
    scoped.refresh_summary();
    scoped
}

/// Replay seen from one team's side, with turns renumbered from 1.
///
/// Roster names of other teams are dropped so nothing identifies the opponent's
/// players.
#[must_use]
pub fn scope_replay_to_team(replay: &ReplayModel, team_id: &str) -> ReplayModel {
    let index = PlayerOwnershipIndex::from_replay(replay);
    let turns = replay
        .turns
        .iter()
        .zip(1_u32..)
        .map(|(turn, number)| scope_turn_to_team(turn, team_id, &index, number))
        .collect();

    let player_names_by_team_and_id = replay
        .player_names_by_team_and_id
        .iter()
        .filter(|(key, _)| split_team_player_key(key).is_some_and(|(team, _)| team == team_id))
        .map(|(key, name)| (key.clone(), name.clone()))
        .collect();
    let player_names_by_id = replay
        .player_names_by_id
        .iter()
        .filter(|(player, _)| {
            index
                .player_team(player)
                .is_none_or(|owner| owner == team_id)
                && !index.is_ambiguous(player)
        })
        .map(|(player, name)| (player.clone(), name.clone()))
        .collect();

    log::debug!(
        "scoped replay {} to team {team_id} across {} turns",
        replay.match_id,
        replay.turns.len()
    );

    ReplayModel {
        analysis_team_id: Some(team_id.to_string()),
        player_names_by_team_and_id,
        player_names_by_id,
        turns,
        ..replay.clone()
    }
}
