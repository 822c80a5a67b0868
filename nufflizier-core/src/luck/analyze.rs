//! Turn a parsed replay into a team-level luck report.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use super::classify::coverage_reason_key;
use super::explain::{
    EVEN_VERDICT, formula_summary, how_scored_summary, inputs_summary, moment_label, target_label,
    verdict_summary,
};
use super::{
    CategoryCoverage, CategoryScores, Classification, Coverage, CoverageCounts, ExclusionReason,
    Explainability, LuckCategory, LuckEvent, LuckEventMetadata, LuckReport, LuckTeamAggregate,
    LuckVerdict, LuckierTeam, MatchSummary, MomentTag, NormalizationFlag, ReasonCount,
    ScoringStatus, classify_event, compute_probability, dice_are_scorable, merge_block_chains,
    resolve_actual_success,
};
use crate::config::AnalysisConfig;
use crate::contracts::CONTRACT_REVISION;
use crate::fingerprint::short_hex_digest;
use crate::numbers::{clamp_unit, round_to, usize_to_f64};
use crate::replay::{ReplayEvent, ReplayModel, ReplayTurn, RollFields, Team};

const BLESSED_MAX_PROBABILITY: f64 = 0.3;
const SHAFTAROONIE_MIN_PROBABILITY: f64 = 0.7;

/// Analyse a replay, stamping the report with the current time.
#[must_use]
pub fn analyze_luck(replay: &ReplayModel, config: &AnalysisConfig) -> LuckReport {
    analyze_luck_at(replay, config, Utc::now())
}

/// Analyse a replay with a fixed generation timestamp.
///
/// Everything except `generated_at` depends only on the replay and config.
#[must_use]
pub fn analyze_luck_at(
    replay: &ReplayModel,
    config: &AnalysisConfig,
    generated_at: DateTime<Utc>,
) -> LuckReport {
    let (home, away) = select_match_teams(replay);

    let mut events = Vec::new();
    for turn in &replay.turns {
        for (index, event) in turn.events.iter().enumerate() {
            let Some(team_id) = resolve_team_id(turn, event) else {
                continue;
            };
            if team_id != home.id && team_id != away.id {
                continue;
            }
            let team_name = replay.team(team_id).map_or(team_id, |team| team.name.as_str());
            events.push(build_luck_event(
                &EventContext {
                    turn,
                    index,
                    event,
                    team_id,
                    team_name,
                },
                config,
            ));
        }
    }

    merge_block_chains(&mut events, config.block_merge_window);

    let mut home_tally = TeamTally::new(&home);
    let mut away_tally = TeamTally::new(&away);
    let mut coverage = CoverageTally::default();
    for event in &events {
        let tally = if event.team_id == home.id {
            &mut home_tally
        } else if event.team_id == away.id {
            &mut away_tally
        } else {
            continue;
        };
        tally.record(event, config);
        coverage.record(event);
    }

    let home_aggregate = home_tally.finish();
    let away_aggregate = away_tally.finish();
    let verdict = summarize_verdict(&home_aggregate, &away_aggregate);
    let coverage = coverage.finish();
    let how_scored =
        how_scored_summary(&verdict.summary, &coverage, &home_aggregate, &away_aggregate);

    let report_events: Vec<LuckEvent> = events.iter().map(rounded_event).collect();
    let mut key_moments: Vec<LuckEvent> = report_events
        .iter()
        .filter(|event| event.is_scored())
        .cloned()
        .collect();
    key_moments.sort_by(|a, b| b.weighted_delta.abs().total_cmp(&a.weighted_delta.abs()));
    key_moments.truncate(config.key_moment_limit);

    let id = report_id(&replay.match_id, &events, &home_aggregate, &away_aggregate);
    log::info!(
        "luck report {id}: {} {:.1} vs {} {:.1}, {} of {} events scored",
        home_aggregate.team_name,
        home_aggregate.luck_score,
        away_aggregate.team_name,
        away_aggregate.luck_score,
        coverage.all_events.scored_count,
        events.len()
    );

    LuckReport {
        id,
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        match_summary: MatchSummary {
            id: replay.match_id.clone(),
            home_team_id: home.id.clone(),
            home_team: home.name.clone(),
            away_team_id: away.id.clone(),
            away_team: away.name.clone(),
        },
        verdict,
        coverage,
        weight_table: config.category_weights,
        contract_revision: CONTRACT_REVISION,
        how_scored_summary: how_scored,
        teams: [home_aggregate, away_aggregate],
        key_moments,
        events: report_events,
    }
}

/// Acting team: actor, then event team, then the turn's explicit or inferred owner.
fn resolve_team_id<'a>(turn: &'a ReplayTurn, event: &'a ReplayEvent) -> Option<&'a str> {
    event
        .actor_team_id()
        .or(event.team_id.as_deref())
        .or(turn.team_id.as_deref())
        .or(turn.inferred_team_id.as_deref())
}

/// Home and away sides: most active first, real names preferred over placeholders.
fn select_match_teams(replay: &ReplayModel) -> (Team, Team) {
    let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
    for turn in &replay.turns {
        if let Some(team_id) = turn.owner_team_id() {
            *usage.entry(team_id).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<&Team> = replay.teams.iter().collect();
    ranked.sort_by_key(|team| Reverse(usage.get(team.id.as_str()).copied().unwrap_or(0)));

    let named: Vec<&Team> = ranked
        .iter()
        .copied()
        .filter(|team| !team.has_generic_name())
        .collect();
    if let [first, second, ..] = named.as_slice() {
        return ((*first).clone(), (*second).clone());
    }
    if let [first, second, ..] = ranked.as_slice() {
        return ((*first).clone(), (*second).clone());
    }

    let home = replay
        .teams
        .first()
        .cloned()
        .unwrap_or_else(|| Team::new("home", "Home Team"));
    let away = if home.id == "away" {
        Team::new("away-placeholder", "Away Team")
    } else {
        Team::new("away", "Away Team")
    };
    (home, away)
}

struct EventContext<'a> {
    turn: &'a ReplayTurn,
    index: usize,
    event: &'a ReplayEvent,
    team_id: &'a str,
    team_name: &'a str,
}

#[derive(Debug, Default, Clone, Copy)]
struct RerollFlags {
    available: bool,
    used: bool,
}

/// Inspect the events right after a roll for a team reroll offer or use.
fn reroll_flags(turn_events: &[ReplayEvent], index: usize, lookahead: usize) -> RerollFlags {
    let mut flags = RerollFlags::default();
    let upcoming = turn_events.iter().skip(index + 1).take(lookahead);
    for next in upcoming {
        let Some(fields) = next.payload.as_ref().and_then(|payload| payload.reroll_fields()) else {
            continue;
        };
        match next.source_tag.as_str() {
            "QuestionTeamRerollUsage" => {
                flags.available |= fields.can_use_team_reroll || fields.can_use_pro_reroll;
            }
            "ResultTeamRerollUsage" if fields.used => {
                flags.available = true;
                flags.used = true;
            }
            _ => {}
        }
    }
    flags
}

fn build_metadata(
    ctx: &EventContext<'_>,
    classification: &Classification,
    config: &AnalysisConfig,
) -> LuckEventMetadata {
    let event = ctx.event;
    let roll = event.roll_fields();
    let reroll = reroll_flags(&ctx.turn.events, ctx.index, config.reroll_lookahead);

    let dice = roll.map(RollFields::dice_values).unwrap_or_default();
    let die_types: Vec<Option<i32>> = roll
        .map(|fields| fields.dice.iter().map(|die| die.die_type).collect())
        .unwrap_or_default();
    let modifiers: Vec<i32> = roll
        .map(|fields| fields.modifiers.iter().map(|modifier| modifier.value).collect())
        .unwrap_or_default();
    let mut skills_used: Vec<i32> = Vec::new();
    for skill in roll
        .into_iter()
        .flat_map(|fields| fields.modifiers.iter().filter_map(|modifier| modifier.skill))
        .filter(|skill| *skill >= 0)
    {
        if !skills_used.contains(&skill) {
            skills_used.push(skill);
        }
    }

    let mut flags = Vec::new();
    let mut notes = Vec::new();
    if let (Some(actor), Some(team)) = (event.actor_team_id(), event.team_id.as_deref())
        && actor != team
    {
        flags.push(NormalizationFlag::AmbiguousTeamAttribution);
        notes.push(format!("actor team {actor} differs from event team {team}"));
    }
    if roll.is_some_and(|fields| fields.difficulty.is_none() && fields.requirement.is_none()) {
        flags.push(NormalizationFlag::MissingTargetThreshold);
        notes.push("difficulty and requirement were both missing".to_string());
    }
    if die_types.iter().any(|die_type| matches!(die_type, None | Some(0))) {
        flags.push(NormalizationFlag::InsufficientDiceMetadata);
        notes.push("one or more dice lacked a die type; sides were inferred".to_string());
    }
    if !reroll.available && !skills_used.is_empty() {
        flags.push(NormalizationFlag::SkillModifierPresentWithoutExplicitReroll);
        notes.push("skill modifiers observed without an explicit team reroll question".to_string());
    }

    LuckEventMetadata {
        source_tag: event.source_tag.clone(),
        is_roll_candidate: classification.is_roll_candidate(),
        contract_label: classification.contract().map(|contract| contract.label.to_string()),
        target_id: event.target_id.clone(),
        roll_type: event.roll_type.or_else(|| roll.and_then(|fields| fields.roll_type)),
        roll_label: event.roll_label.clone(),
        step_type: event.step_type,
        step_label: event.step_label.clone(),
        action_code: event.action_code,
        action_label: event.action_label.clone(),
        outcome_code: roll.and_then(|fields| fields.outcome),
        requirement: roll.and_then(|fields| fields.requirement),
        difficulty: roll.and_then(|fields| fields.difficulty),
        modifiers_sum: modifiers.iter().fold(0_i32, |sum, value| sum.saturating_add(*value)),
        dice,
        die_types,
        modifiers,
        reroll_available: reroll.available,
        reroll_used: reroll.used,
        skills_used,
        normalization_flags: flags,
        normalization_notes: notes,
        merged_block_anchor_id: None,
    }
}

fn outcome_reason(outcome: Option<i32>, dice: &[i32], target: i32) -> String {
    match outcome {
        Some(code @ (0 | 1)) => format!("explicit outcome code {code}"),
        _ => {
            let total: i64 = dice.iter().map(|value| i64::from(*value)).sum();
            format!("dice total {total} against {target}+")
        }
    }
}

fn build_luck_event(ctx: &EventContext<'_>, config: &AnalysisConfig) -> LuckEvent {
    let classification = classify_event(ctx.event);
    let metadata = build_metadata(ctx, &classification, config);
    let category = classification.category();
    let weight = category.map_or(0.0, |category| config.category_weights.weight(category));
    let target = ctx.event.roll_fields().and_then(RollFields::target);
    let target_text = target_label(target);
    let actual_success = resolve_actual_success(metadata.outcome_code, &metadata.dice, target);

    let mut event = LuckEvent {
        id: format!("{}-{}-{}", ctx.turn.turn_number, ctx.index, ctx.event.source_tag),
        turn: ctx.turn.turn_number,
        event_index: ctx.index,
        team_id: ctx.team_id.to_string(),
        team_name: ctx.team_name.to_string(),
        player_id: ctx.event.player_id.clone(),
        category,
        probability_success: 0.0,
        actual_success,
        delta: 0.0,
        weighted_delta: 0.0,
        label: moment_label(category, actual_success, None, target),
        tags: Vec::new(),
        scoring_status: ScoringStatus::Excluded,
        status_reason: String::new(),
        explainability: Explainability {
            inputs_summary: inputs_summary(
                category,
                &target_text,
                &metadata.dice,
                metadata.reroll_available,
                ScoringStatus::Excluded,
            ),
            target: target_text,
            base_odds: None,
            reroll_adjusted_odds: None,
            mechanic: None,
            calculation: None,
            weight,
            formula_summary: None,
        },
        metadata,
    };

    let (category, target, contract) = match classification {
        Classification::Scored {
            category,
            target,
            contract,
        } => (category, target, contract),
        Classification::Excluded { reason, .. } => {
            event.status_reason = reason.to_string();
            return event;
        }
    };
    let Some(actual) = actual_success else {
        event.status_reason = ExclusionReason::IndeterminateOutcome.to_string();
        return event;
    };

    let dice = ctx
        .event
        .roll_fields()
        .map(|fields| fields.dice.as_slice())
        .unwrap_or_default();
    if !dice_are_scorable(dice) {
        let flags = &mut event.metadata.normalization_flags;
        if !flags.contains(&NormalizationFlag::InsufficientDiceMetadata) {
            flags.push(NormalizationFlag::InsufficientDiceMetadata);
        }
        event
            .metadata
            .normalization_notes
            .push(format!("{} dice outside the modelled range", dice.len()));
        event.status_reason = ExclusionReason::UnusableDiceMetadata.to_string();
        return event;
    }
    let probability = compute_probability(category, target, dice, event.metadata.reroll_available);
    let probability_success = clamp_unit(probability.probability_success);
    let delta = f64::from(u8::from(actual)) - probability_success;
    let weighted_delta = delta * weight;

    if actual && probability_success <= BLESSED_MAX_PROBABILITY {
        event.tags.push(MomentTag::Blessed);
    }
    if !actual && probability_success >= SHAFTAROONIE_MIN_PROBABILITY {
        event.tags.push(MomentTag::Shaftaroonie);
    }

    event.scoring_status = ScoringStatus::Scored;
    event.status_reason = format!(
        "scored: {}; {}; {}",
        contract.label,
        probability.description,
        outcome_reason(event.metadata.outcome_code, &event.metadata.dice, target)
    );
    event.probability_success = probability_success;
    event.delta = delta;
    event.weighted_delta = weighted_delta;
    event.label = moment_label(
        Some(category),
        Some(actual),
        Some(probability_success),
        Some(target),
    );
    event.explainability.base_odds = Some(probability.base_odds);
    event.explainability.reroll_adjusted_odds = Some(probability.reroll_adjusted_odds);
    event.explainability.mechanic = Some(probability.mechanic);
    event.explainability.calculation = Some(probability.description);
    event.explainability.formula_summary = Some(formula_summary(
        actual,
        probability_success,
        weight,
        weighted_delta,
    ));
    event.explainability.inputs_summary = inputs_summary(
        Some(category),
        &event.explainability.target,
        &event.metadata.dice,
        event.metadata.reroll_available,
        ScoringStatus::Scored,
    );
    event
}

struct TeamTally {
    aggregate: LuckTeamAggregate,
    weight_sum: f64,
    weighted_total: f64,
}

impl TeamTally {
    fn new(team: &Team) -> Self {
        Self {
            aggregate: LuckTeamAggregate {
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                luck_score: 0.0,
                category_scores: CategoryScores::default(),
                event_count: 0,
            },
            weight_sum: 0.0,
            weighted_total: 0.0,
        }
    }

    fn record(&mut self, event: &LuckEvent, config: &AnalysisConfig) {
        self.aggregate.event_count += 1;
        let Some(category) = event.category.filter(|_| event.is_scored()) else {
            return;
        };
        self.aggregate.category_scores.add(category, event.weighted_delta);
        self.weight_sum += config.category_weights.weight(category);
        self.weighted_total += event.weighted_delta;
    }

    fn finish(mut self) -> LuckTeamAggregate {
        self.aggregate.luck_score = if self.weight_sum > 0.0 {
            round_to(100.0 * self.weighted_total / self.weight_sum, 1)
        } else {
            0.0
        };
        self.aggregate.category_scores = self.aggregate.category_scores.rounded(3);
        self.aggregate
    }
}

#[derive(Default)]
struct CoverageTally {
    all: (usize, usize),
    candidates: (usize, usize),
    by_category: BTreeMap<LuckCategory, (usize, usize)>,
    excluded_uncategorized: usize,
    reasons: BTreeMap<String, usize>,
}

impl CoverageTally {
    fn record(&mut self, event: &LuckEvent) {
        let candidate = event.metadata.is_roll_candidate;
        if event.is_scored() {
            self.all.0 += 1;
            self.candidates.0 += usize::from(candidate);
            if let Some(category) = event.category {
                self.by_category.entry(category).or_default().0 += 1;
            }
            return;
        }

        self.all.1 += 1;
        self.candidates.1 += usize::from(candidate);
        match event.category {
            Some(category) => self.by_category.entry(category).or_default().1 += 1,
            None => self.excluded_uncategorized += 1,
        }
        *self
            .reasons
            .entry(coverage_reason_key(&event.status_reason).to_string())
            .or_insert(0) += 1;
    }

    fn finish(self) -> Coverage {
        let mut by_category: Vec<CategoryCoverage> = self
            .by_category
            .into_iter()
            .map(|(category, (scored_count, excluded_count))| CategoryCoverage {
                category,
                scored_count,
                excluded_count,
            })
            .collect();
        by_category.sort_by_key(|entry| Reverse(entry.scored_count + entry.excluded_count));

        let mut excluded_by_reason: Vec<ReasonCount> = self
            .reasons
            .into_iter()
            .map(|(reason, count)| ReasonCount { reason, count })
            .collect();
        excluded_by_reason.sort_by_key(|entry| Reverse(entry.count));

        Coverage {
            all_events: counts(self.all),
            roll_candidates: counts(self.candidates),
            by_category,
            excluded_uncategorized: self.excluded_uncategorized,
            excluded_by_reason,
        }
    }
}

fn counts((scored_count, excluded_count): (usize, usize)) -> CoverageCounts {
    let total = scored_count + excluded_count;
    CoverageCounts {
        scored_count,
        excluded_count,
        scored_rate: if total > 0 {
            round_to(usize_to_f64(scored_count) / usize_to_f64(total), 3)
        } else {
            0.0
        },
    }
}

fn summarize_verdict(home: &LuckTeamAggregate, away: &LuckTeamAggregate) -> LuckVerdict {
    let score_gap = round_to((home.luck_score - away.luck_score).abs(), 1);
    if score_gap < 0.05 {
        return LuckVerdict {
            luckier_team: LuckierTeam::Even,
            score_gap: 0.0,
            summary: EVEN_VERDICT.to_string(),
        };
    }
    let (luckier_team, luckier) = if home.luck_score > away.luck_score {
        (LuckierTeam::Home, home)
    } else {
        (LuckierTeam::Away, away)
    };
    LuckVerdict {
        luckier_team,
        score_gap,
        summary: verdict_summary(&luckier.team_name, score_gap),
    }
}

fn rounded_event(event: &LuckEvent) -> LuckEvent {
    let mut rounded = event.clone();
    rounded.probability_success = round_to(event.probability_success, 3);
    rounded.delta = round_to(event.delta, 3);
    rounded.weighted_delta = round_to(event.weighted_delta, 3);
    rounded.explainability.weight = round_to(event.explainability.weight, 3);
    rounded.explainability.base_odds = event.explainability.base_odds.map(|odds| round_to(odds, 3));
    rounded.explainability.reroll_adjusted_odds = event
        .explainability
        .reroll_adjusted_odds
        .map(|odds| round_to(odds, 3));
    rounded
}

fn report_id(
    match_id: &str,
    events: &[LuckEvent],
    home: &LuckTeamAggregate,
    away: &LuckTeamAggregate,
) -> String {
    let mut seed = String::from(match_id);
    for event in events {
        let _ = write!(seed, "|{}:{}", event.id, event.scoring_status.as_str());
    }
    let _ = write!(seed, "|{:.1}|{:.1}", home.luck_score, away.luck_score);
    short_hex_digest(seed.as_bytes())
}
