//! Fold chained block results into the roll that decided the block.

use std::cmp::{Ordering, Reverse};

use super::{ExclusionReason, LuckCategory, LuckEvent};

/// Result tags that restate a block already judged by its anchor roll.
const BLOCK_CHAIN_TAGS: [&str; 3] = ["ResultBlockRoll", "ResultBlockOutcome", "ResultPushBack"];

#[derive(Debug, Clone)]
struct Anchor {
    id: String,
    turn: u32,
    event_index: usize,
    team_id: String,
    player_id: Option<String>,
    target_id: Option<String>,
}

impl Anchor {
    fn from_event(event: &LuckEvent) -> Option<Self> {
        let is_anchor = event.is_scored()
            && event.category == Some(LuckCategory::Block)
            && event.metadata.source_tag == "ResultRoll"
            && event.metadata.roll_type == Some(2);
        is_anchor.then(|| Self {
            id: event.id.clone(),
            turn: event.turn,
            event_index: event.event_index,
            team_id: event.team_id.clone(),
            player_id: event.player_id.clone(),
            target_id: event.metadata.target_id.clone(),
        })
    }
}

#[derive(Debug)]
struct Candidate<'a> {
    anchor: &'a Anchor,
    team_match: bool,
    match_score: u8,
    distance: usize,
}

impl Candidate<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        other
            .team_match
            .cmp(&self.team_match)
            .then_with(|| Reverse(self.match_score).cmp(&Reverse(other.match_score)))
            .then_with(|| self.distance.cmp(&other.distance))
            .then_with(|| self.anchor.event_index.cmp(&other.anchor.event_index))
    }
}

fn same_present(left: Option<&String>, right: Option<&String>) -> bool {
    matches!((left, right), (Some(left), Some(right)) if left == right)
}

/// Mark chained block results as excluded in favour of their best anchor.
///
/// Candidates share the chained event's turn and sit within `window` event
/// indices of it. Ranking: same team, then most of player and target matching,
/// then nearest, then earliest. Returns how many events were merged.
pub fn merge_block_chains(events: &mut [LuckEvent], window: usize) -> usize {
    let anchors: Vec<Anchor> = events.iter().filter_map(Anchor::from_event).collect();
    if anchors.is_empty() {
        return 0;
    }

    let mut merged = 0;
    for event in events.iter_mut() {
        if !BLOCK_CHAIN_TAGS.contains(&event.metadata.source_tag.as_str()) {
            continue;
        }
        let best = anchors
            .iter()
            .filter(|anchor| anchor.turn == event.turn)
            .filter_map(|anchor| {
                let distance = anchor.event_index.abs_diff(event.event_index);
                (distance <= window).then(|| Candidate {
                    anchor,
                    team_match: anchor.team_id == event.team_id,
                    match_score: u8::from(same_present(
                        event.player_id.as_ref(),
                        anchor.player_id.as_ref(),
                    )) + u8::from(same_present(
                        event.metadata.target_id.as_ref(),
                        anchor.target_id.as_ref(),
                    )),
                    distance,
                })
            })
            .min_by(Candidate::rank);

        if let Some(best) = best {
            event.exclude(&ExclusionReason::MergedIntoBlockAnchor(best.anchor.id.clone()));
            event.metadata.merged_block_anchor_id = Some(best.anchor.id.clone());
            merged += 1;
        }
    }

    if merged > 0 {
        log::debug!("merged {merged} chained block results into anchors");
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::luck::{Explainability, LuckEventMetadata, ScoringStatus};

    fn event(turn: u32, index: usize, tag: &str, team: &str, player: Option<&str>) -> LuckEvent {
        LuckEvent {
            id: format!("{turn}-{index}-{tag}"),
            turn,
            event_index: index,
            team_id: team.to_string(),
            team_name: team.to_string(),
            player_id: player.map(str::to_string),
            category: Some(LuckCategory::Block),
            probability_success: 0.0,
            actual_success: None,
            delta: 0.0,
            weighted_delta: 0.0,
            label: String::new(),
            tags: Vec::new(),
            scoring_status: ScoringStatus::Excluded,
            status_reason: "excluded: outcome summary without dice threshold".to_string(),
            explainability: Explainability {
                target: "unspecified target".to_string(),
                base_odds: None,
                reroll_adjusted_odds: None,
                mechanic: None,
                calculation: None,
                weight: 0.75,
                formula_summary: None,
                inputs_summary: String::new(),
            },
            metadata: LuckEventMetadata {
                source_tag: tag.to_string(),
                ..LuckEventMetadata::default()
            },
        }
    }

    fn anchor(turn: u32, index: usize, team: &str, player: Option<&str>) -> LuckEvent {
        let mut anchor = event(turn, index, "ResultRoll", team, player);
        anchor.scoring_status = ScoringStatus::Scored;
        anchor.metadata.roll_type = Some(2);
        anchor.weighted_delta = 0.3;
        anchor
    }

    #[test]
    fn push_back_after_anchor_is_merged() {
        let mut events = vec![
            anchor(1, 0, "0", Some("5")),
            event(1, 1, "ResultPushBack", "0", Some("5")),
        ];
        assert_eq!(merge_block_chains(&mut events, 6), 1);
        assert_eq!(
            events[1].status_reason,
            "excluded: merged into block anchor 1-0-ResultRoll"
        );
        assert_eq!(
            events[1].metadata.merged_block_anchor_id.as_deref(),
            Some("1-0-ResultRoll")
        );
        assert!(events[0].is_scored());
        assert!(events[1].weighted_delta.abs() < f64::EPSILON);
    }

    #[test]
    fn ranking_prefers_team_then_player_then_distance() {
        let mut events = vec![
            anchor(1, 0, "1", Some("5")),
            anchor(1, 2, "0", Some("9")),
            anchor(1, 6, "0", Some("5")),
            event(1, 4, "ResultBlockOutcome", "0", Some("5")),
        ];
        merge_block_chains(&mut events, 6);
        assert_eq!(
            events[3].metadata.merged_block_anchor_id.as_deref(),
            Some("1-6-ResultRoll")
        );

        let mut tie = vec![
            anchor(2, 1, "0", None),
            anchor(2, 5, "0", None),
            event(2, 3, "ResultBlockRoll", "0", None),
        ];
        merge_block_chains(&mut tie, 6);
        assert_eq!(
            tie[2].metadata.merged_block_anchor_id.as_deref(),
            Some("2-1-ResultRoll")
        );
    }

    #[test]
    fn window_and_turn_bound_candidates() {
        let mut events = vec![
            anchor(1, 0, "0", Some("5")),
            event(1, 7, "ResultPushBack", "0", Some("5")),
            event(2, 1, "ResultPushBack", "0", Some("5")),
        ];
        assert_eq!(merge_block_chains(&mut events, 6), 0);
        assert!(events[1].metadata.merged_block_anchor_id.is_none());
    }
}
