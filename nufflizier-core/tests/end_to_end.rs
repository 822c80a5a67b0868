mod common;

use std::hash::Hasher;

use chrono::{TimeZone, Utc};
use nufflizier_core::luck::{MomentTag, NormalizationFlag};
use nufflizier_core::{
    AnalysisConfig, LuckCategory, LuckierTeam, ReplayValidationError, ScoringStatus, SourceFormat,
    analyze_replay_input, analyze_replay_input_at, parse_replay_input,
};
use serde_json::json;
use twox_hash::XxHash64;

use common::{
    block_step, carrier, dodge_pair_xml, end_turn, move_step, replay_xml, roll, sequence, wrap,
};

fn digest(value: &serde_json::Value) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(value.to_string().as_bytes());
    hasher.finish()
}

#[test]
fn dodge_pair_end_to_end() {
    let config = AnalysisConfig::default();
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
    let report = analyze_replay_input_at(&dodge_pair_xml(), &config, at).unwrap();

    assert_eq!(report.match_summary.id, "dodge-pair");
    assert_eq!(report.match_summary.home_team, "Reavers");
    assert_eq!(report.match_summary.away_team, "Marauders");

    let scored: Vec<_> = report.events.iter().filter(|event| event.is_scored()).collect();
    assert_eq!(scored.len(), 2);
    let made = scored[0];
    assert_eq!(made.category, Some(LuckCategory::Dodge));
    assert!((made.probability_success - 0.5).abs() < 1e-9);
    assert_eq!(made.actual_success, Some(true));
    let failed = scored[1];
    assert!((failed.probability_success - 0.833).abs() < 1e-9);
    assert_eq!(failed.actual_success, Some(false));
    assert_eq!(failed.tags, vec![MomentTag::Shaftaroonie]);
    assert!(made.tags.is_empty());

    // The abnormal end of turn two adds an unscored turnover event.
    assert_eq!(report.coverage.all_events.scored_count, 2);
    assert_eq!(report.coverage.all_events.excluded_count, 1);
    assert_eq!(report.coverage.roll_candidates.excluded_count, 0);
    assert_eq!(
        report.coverage.all_events.scored_count + report.coverage.all_events.excluded_count,
        report.events.len()
    );

    assert_eq!(report.verdict.luckier_team, LuckierTeam::Home);
    assert_eq!(report.teams[0].luck_score, 50.0);
    assert_eq!(report.teams[1].luck_score, -83.3);
    assert_eq!(report.verdict.summary, "Reavers was decisively blessed by Nuffle.");
    assert_eq!(report.key_moments[0].turn, 2);
    assert_eq!(report.generated_at, "2026-03-01T09:30:00.000Z");
}

#[test]
fn wrapped_upload_matches_plain_xml() {
    let config = AnalysisConfig::default();
    let xml = dodge_pair_xml();
    let plain = parse_replay_input(&xml, &config).unwrap();
    let packed = parse_replay_input(&wrap(&xml), &config).unwrap();
    assert_eq!(plain.source_format, SourceFormat::Xml);
    assert_eq!(packed.source_format, SourceFormat::Bbr);
    assert_eq!(plain.turns, packed.turns);
    assert_eq!(plain.teams, packed.teams);
}

#[test]
fn repeated_analysis_is_deterministic() {
    let config = AnalysisConfig::default();
    let input = wrap(&dodge_pair_xml());
    let stable = |report: &nufflizier_core::LuckReport| {
        json!({
            "id": report.id,
            "verdict": report.verdict,
            "coverage": report.coverage,
            "scores": report.teams.iter().map(|team| team.luck_score).collect::<Vec<_>>(),
            "events": report.events,
        })
    };
    let first = analyze_replay_input(&input, &config).unwrap();
    let second = analyze_replay_input(&input, &config).unwrap();
    assert_eq!(digest(&stable(&first)), digest(&stable(&second)));
    assert_eq!(first.id, second.id);
}

#[test]
fn block_chain_is_counted_once() {
    let xml = replay_xml(
        "block-chain",
        [("0", "Reavers"), ("1", "Marauders")],
        &[],
        &[
            sequence(
                &block_step("4", "20", "0"),
                &[
                    roll(2, 3, &[4], Some(1)),
                    "<ResultBlockOutcome><PlayerId>4</PlayerId></ResultBlockOutcome>".to_string(),
                    "<ResultPushBack><PushedPlayerId>20</PushedPlayerId></ResultPushBack>"
                        .to_string(),
                ],
            ),
            end_turn(1),
        ],
    );
    let report = analyze_replay_input(&xml, &AnalysisConfig::default()).unwrap();
    let anchor = &report.events[0];
    assert_eq!(anchor.scoring_status, ScoringStatus::Scored);
    assert_eq!(anchor.category, Some(LuckCategory::Block));
    for chained in &report.events[1..] {
        assert_eq!(chained.scoring_status, ScoringStatus::Excluded);
        assert_eq!(
            chained.status_reason,
            format!("excluded: merged into block anchor {}", anchor.id)
        );
        assert!(chained.weighted_delta.abs() < f64::EPSILON);
    }
    assert_eq!(report.coverage.by_category[0].category, LuckCategory::Block);
}

#[test]
fn roster_attribution_drives_turn_ownership() {
    let xml = replay_xml(
        "roster-only",
        [("0", "Reavers"), ("1", "Marauders")],
        &[("0", "3", "Grak"), ("1", "14", "Lissa")],
        &[
            carrier("14"),
            sequence(&move_step("14", None), &[roll(3, 3, &[4], Some(1))]),
            sequence(&move_step("14", None), &[roll(3, 3, &[2], Some(0))]),
            end_turn(1),
        ],
    );
    let replay = parse_replay_input(&xml, &AnalysisConfig::default()).unwrap();
    let turn = &replay.turns[0];
    assert_eq!(turn.inferred_team_id.as_deref(), Some("1"));
    assert_eq!(turn.team_id.as_deref(), Some("1"));
    assert_eq!(replay.diagnostics.turn_attribution.inferred_team_turns, 1);
    assert_eq!(replay.diagnostics.event_attribution.player_map, 3);
    assert_eq!(replay.player_name(Some("1"), "14"), Some("Lissa"));

    let scoped = nufflizier_core::scope_replay_to_team(&replay, "0");
    assert!(scoped.turns.iter().all(|turn| turn.events.is_empty()));
    assert!(scoped.turns.iter().all(|turn| turn.ball_carrier_player_id.is_none()));
    assert!(!scoped.player_names_by_id.contains_key("14"));
}

#[test]
fn unknown_codes_are_inventoried_not_fatal() {
    let xml = replay_xml(
        "unknown-codes",
        [("0", "Reavers"), ("1", "Marauders")],
        &[],
        &[
            sequence(
                "<OddStep><StepType>99</StepType><PlayerId>1</PlayerId>\
                 <TeamId>0</TeamId></OddStep>",
                &[roll(250, 4, &[6], Some(1))],
            ),
            end_turn(77),
        ],
    );
    let report_input = parse_replay_input(&xml, &AnalysisConfig::default()).unwrap();
    assert!(report_input.diagnostics.unknown_code_total >= 3);
    let report = analyze_replay_input(&xml, &AnalysisConfig::default()).unwrap();
    assert!(
        report
            .events
            .iter()
            .any(|event| event.status_reason == "excluded: unsupported roll family")
    );
    assert_eq!(report.verdict.luckier_team, LuckierTeam::Even);
}

#[test]
fn oversized_dice_faces_degrade_coverage() {
    let xml = replay_xml(
        "oversized-dice",
        [("0", "Reavers"), ("1", "Marauders")],
        &[],
        &[
            sequence(
                &block_step("4", "20", "0"),
                &[roll(10, 8, &[2_000_000_000, 2_000_000_000], Some(2))],
            ),
            end_turn(1),
        ],
    );
    let report = analyze_replay_input(&xml, &AnalysisConfig::default()).unwrap();
    let armor = report
        .events
        .iter()
        .find(|event| event.status_reason == "excluded: unusable dice metadata")
        .unwrap();
    assert_eq!(armor.scoring_status, ScoringStatus::Excluded);
    assert!(
        armor
            .metadata
            .normalization_flags
            .contains(&NormalizationFlag::InsufficientDiceMetadata)
    );
    assert_eq!(report.verdict.luckier_team, LuckierTeam::Even);
}

#[test]
fn legacy_fixture_uses_tree_fallback() {
    let xml = include_str!("fixtures/sample-basic.xml");
    let replay = parse_replay_input(xml, &AnalysisConfig::default()).unwrap();
    assert_eq!(replay.match_id, "sample-basic-001");
    assert_eq!(replay.teams.len(), 2);
    assert_eq!(replay.teams[0].name, "Ironjaw Raiders");
    assert_eq!(replay.turns.len(), 3);
    assert!(replay.turns.iter().all(|turn| turn.events.is_empty()));
    assert!(replay.turns[1].action_texts.iter().any(|text| text == "blitz"));

    let report = analyze_replay_input(xml, &AnalysisConfig::default()).unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.verdict.luckier_team, LuckierTeam::Even);
    assert_eq!(report.verdict.summary, "Nuffle called this one even.");
}

#[test]
fn validation_failures_are_typed() {
    let config = AnalysisConfig::default();
    assert_eq!(
        analyze_replay_input("", &config).unwrap_err(),
        ReplayValidationError::EmptyInput
    );
    let bad_version = "<Replay><ReplayVersion>beta</ReplayVersion></Replay>";
    let err = analyze_replay_input(&wrap(bad_version), &config).unwrap_err();
    assert!(err.is_parse_failure());
    assert_eq!(err.to_string(), "Unsupported replay version format: beta");

    let tight = config.with_max_decoded_chars(16);
    assert!(matches!(
        analyze_replay_input(&dodge_pair_xml(), &tight),
        Err(ReplayValidationError::DecodedSizeExceeded { limit: 16, .. })
    ));
}
