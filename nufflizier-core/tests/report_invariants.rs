mod common;

use nufflizier_core::{AnalysisConfig, LuckierTeam, analyze_replay_input};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use common::{active_gamer, block_step, end_turn, move_step, replay_xml, roll, sequence};

const MATCHES: usize = 24;

/// Random but well-formed match: dodges, blocks and armour rolls over a dozen turns.
fn random_match(rng: &mut ChaCha8Rng, index: usize) -> String {
    let mut stream = Vec::new();
    for turn in 0..12 {
        let team = if turn % 2 == 0 { "0" } else { "1" };
        stream.push(active_gamer(team));
        for _ in 0..rng.gen_range(1..4) {
            let player = format!("{}", rng.gen_range(1..12) + if team == "0" { 0 } else { 20 });
            let step = match rng.gen_range(0..3) {
                0 => sequence(
                    &move_step(&player, Some(team)),
                    &[roll(3, rng.gen_range(2..7), &[rng.gen_range(1..7)], None)],
                ),
                1 => sequence(
                    &block_step(&player, "40", team),
                    &[roll(
                        2,
                        rng.gen_range(2..6),
                        &[rng.gen_range(1..7)],
                        Some(rng.gen_range(0..2)),
                    )],
                ),
                _ => sequence(
                    &block_step(&player, "40", team),
                    &[roll(
                        1,
                        rng.gen_range(6..11),
                        &[rng.gen_range(1..7), rng.gen_range(1..7)],
                        None,
                    )],
                ),
            };
            stream.push(step);
        }
        stream.push(end_turn(if rng.gen_bool(0.3) { 2 } else { 1 }));
    }
    replay_xml(
        &format!("sweep-{index}"),
        [("0", "Reavers"), ("1", "Marauders")],
        &[],
        &stream,
    )
}

#[test]
fn probabilities_and_coverage_hold_across_random_matches() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x00C0_FFEE);
    let config = AnalysisConfig::default();
    for index in 0..MATCHES {
        let report = analyze_replay_input(&random_match(&mut rng, index), &config).unwrap();

        for event in report.events.iter().filter(|event| event.is_scored()) {
            assert!(
                (0.0..=1.0).contains(&event.probability_success),
                "{} has probability {}",
                event.id,
                event.probability_success
            );
            assert!(event.actual_success.is_some());
            assert!(event.explainability.formula_summary.is_some());
        }

        let all = &report.coverage.all_events;
        assert_eq!(all.scored_count + all.excluded_count, report.events.len());
        let candidates = &report.coverage.roll_candidates;
        assert!(candidates.scored_count <= all.scored_count);
        assert!(report.key_moments.len() <= config.key_moment_limit);
        assert!(
            report
                .key_moments
                .windows(2)
                .all(|pair| pair[0].weighted_delta.abs() >= pair[1].weighted_delta.abs())
        );

        let [home, away] = &report.teams;
        let expected = if (home.luck_score - away.luck_score).abs() < 0.05 {
            LuckierTeam::Even
        } else if home.luck_score > away.luck_score {
            LuckierTeam::Home
        } else {
            LuckierTeam::Away
        };
        assert_eq!(report.verdict.luckier_team, expected);
    }
}
