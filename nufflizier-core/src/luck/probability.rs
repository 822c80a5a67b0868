//! Exact success probabilities for threshold dice rolls.

use serde::{Deserialize, Serialize};

use super::LuckCategory;
use crate::numbers::{clamp_unit, i32_to_usize};
use crate::replay::Die;

const STANDARD_SIDES: [u32; 4] = [6, 8, 12, 20];

/// Largest die the engine models; bigger faces are corrupt metadata.
pub const MAX_DIE_SIDES: u32 = 20;
/// Most dice a single scored roll may carry.
pub const MAX_SCORED_DICE: usize = 8;

/// How several dice combine against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiceMechanic {
    SingleDie,
    /// At least one die meets the target.
    AnyDie,
    /// The dice total meets the target.
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityResult {
    pub probability_success: f64,
    pub base_odds: f64,
    pub reroll_adjusted_odds: f64,
    pub mechanic: DiceMechanic,
    pub sides: Vec<u32>,
    pub description: String,
}

/// Whether a roll's dice can be scored: a bounded count of faces no larger
/// than the biggest modelled die.
#[must_use]
pub fn dice_are_scorable(dice: &[Die]) -> bool {
    dice.len() <= MAX_SCORED_DICE
        && dice
            .iter()
            .all(|die| u32::try_from(die.value).is_ok_and(|value| value <= MAX_DIE_SIDES))
}

/// Side count for a die. Die type 1 is a d8 and type 2 a d6; otherwise the
/// smallest standard die able to show the observed face. Never above
/// [`MAX_DIE_SIDES`].
#[must_use]
pub fn die_sides(die_type: Option<i32>, observed: i32) -> u32 {
    let observed = u32::try_from(observed).unwrap_or(0).min(MAX_DIE_SIDES);
    let nominal = match die_type {
        Some(1) => 8,
        Some(2) => 6,
        _ => STANDARD_SIDES
            .iter()
            .copied()
            .find(|sides| *sides >= observed)
            .unwrap_or(MAX_DIE_SIDES),
    };
    nominal.max(observed).max(1)
}

/// `max(0, sides - target + 1) / sides`, clamped to `[0, 1]`.
#[must_use]
pub fn single_die_probability(target: i32, sides: u32) -> f64 {
    if sides == 0 {
        return 0.0;
    }
    let successful = (i64::from(sides) - i64::from(target) + 1).clamp(0, i64::from(sides));
    clamp_unit(f64::from(u32::try_from(successful).unwrap_or(0)) / f64::from(sides))
}

/// Chance that at least one die meets the target.
#[must_use]
pub fn any_die_probability(target: i32, sides: &[u32]) -> f64 {
    let all_fail = sides
        .iter()
        .map(|sides| 1.0 - single_die_probability(target, *sides))
        .product::<f64>();
    clamp_unit(1.0 - all_fail)
}

/// Chance that the dice total meets the target, by exact convolution.
///
/// Returns 0 for more than [`MAX_SCORED_DICE`] dice or any die outside
/// `1..=MAX_DIE_SIDES`.
#[must_use]
pub fn sum_probability(target: i32, sides: &[u32]) -> f64 {
    if sides.is_empty()
        || sides.len() > MAX_SCORED_DICE
        || sides.iter().any(|die| !(1..=MAX_DIE_SIDES).contains(die))
    {
        return 0.0;
    }
    // ways[s] counts the combinations totalling s.
    let mut ways: Vec<f64> = vec![1.0];
    for die in sides {
        let die = usize::try_from(*die).unwrap_or(0);
        let mut next = vec![0.0; ways.len() + die];
        for (total, count) in ways.iter().enumerate() {
            if *count == 0.0 {
                continue;
            }
            for face in 1..=die {
                next[total + face] += count;
            }
        }
        ways = next;
    }
    let outcomes: f64 = sides.iter().map(|die| f64::from(*die)).product();
    let threshold = i32_to_usize(target.max(0));
    let successful: f64 = ways.iter().skip(threshold).sum();
    clamp_unit(successful / outcomes)
}

/// One reroll attempt on failure: `1 - (1 - p)^2`.
#[must_use]
pub fn with_reroll(probability: f64) -> f64 {
    let probability = clamp_unit(probability);
    clamp_unit(1.0 - (1.0 - probability) * (1.0 - probability))
}

/// Pick the combining rule for a roll.
#[must_use]
pub fn select_mechanic(category: LuckCategory, target: i32, sides: &[u32]) -> DiceMechanic {
    if sides.len() <= 1 {
        return DiceMechanic::SingleDie;
    }
    let largest = sides.iter().copied().max().unwrap_or(0);
    if category.sums_dice() || i64::from(target) > i64::from(largest) {
        DiceMechanic::Sum
    } else {
        DiceMechanic::AnyDie
    }
}

/// Probability of a scored roll succeeding.
///
/// Without any dice the roll is treated as a single d6.
#[must_use]
pub fn compute_probability(
    category: LuckCategory,
    target: i32,
    dice: &[Die],
    reroll_available: bool,
) -> ProbabilityResult {
    let sides: Vec<u32> = if dice.is_empty() {
        vec![6]
    } else {
        dice.iter()
            .map(|die| die_sides(die.die_type, die.value))
            .collect()
    };
    let mechanic = select_mechanic(category, target, &sides);
    let base_odds = match mechanic {
        DiceMechanic::SingleDie => single_die_probability(target, sides[0]),
        DiceMechanic::AnyDie => any_die_probability(target, &sides),
        DiceMechanic::Sum => sum_probability(target, &sides),
    };
    let reroll_adjusted_odds = if reroll_available {
        with_reroll(base_odds)
    } else {
        base_odds
    };

    ProbabilityResult {
        probability_success: reroll_adjusted_odds,
        base_odds,
        reroll_adjusted_odds,
        mechanic,
        description: describe(mechanic, target, &sides, reroll_available),
        sides,
    }
}

fn describe(mechanic: DiceMechanic, target: i32, sides: &[u32], reroll_available: bool) -> String {
    let dice = sides
        .iter()
        .map(|sides| format!("d{sides}"))
        .collect::<Vec<_>>();
    let mut text = match mechanic {
        DiceMechanic::SingleDie => format!("single {} needs {target}+", dice.join("")),
        DiceMechanic::AnyDie => format!("any of {} needs {target}+", dice.join(", ")),
        DiceMechanic::Sum => format!("sum of {} needs {target}+", dice.join(" + ")),
    };
    if reroll_available {
        text.push_str(", one reroll");
    }
    text
}

/// Settle whether a roll succeeded.
///
/// An explicit outcome code wins (1 success, 0 failure). Otherwise the dice
/// total is compared with the target. With neither, the result is unknown.
#[must_use]
pub fn resolve_actual_success(
    outcome: Option<i32>,
    dice: &[i32],
    target: Option<i32>,
) -> Option<bool> {
    match outcome {
        Some(1) => return Some(true),
        Some(0) => return Some(false),
        _ => {}
    }
    let target = target.filter(|value| *value > 0)?;
    if dice.is_empty() {
        return None;
    }
    let total: i64 = dice.iter().map(|value| i64::from(*value)).sum();
    Some(total >= i64::from(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn d6(value: i32) -> Die {
        Die::new(value, Some(0))
    }

    #[test]
    fn single_die_target_four() {
        let result = compute_probability(LuckCategory::Dodge, 4, &[d6(3)], false);
        assert_eq!(result.mechanic, DiceMechanic::SingleDie);
        assert!(close(result.probability_success, 0.5));

        let rerolled = compute_probability(LuckCategory::Dodge, 4, &[d6(3)], true);
        assert!(close(rerolled.base_odds, 0.5));
        assert!(close(rerolled.probability_success, 0.75));
        assert!(rerolled.description.ends_with("one reroll"));
    }

    #[test]
    fn two_dice_sum_to_eight() {
        let result = compute_probability(LuckCategory::ArmorBreak, 8, &[d6(3), d6(4)], false);
        assert_eq!(result.mechanic, DiceMechanic::Sum);
        assert!(close(result.probability_success, 15.0 / 36.0));
    }

    #[test]
    fn any_die_combines_independent_chances() {
        let result = compute_probability(LuckCategory::Block, 5, &[d6(1), d6(2)], false);
        assert_eq!(result.mechanic, DiceMechanic::AnyDie);
        assert!(close(result.probability_success, 1.0 - (4.0 / 6.0) * (4.0 / 6.0)));
    }

    #[test]
    fn oversized_target_forces_sum() {
        assert_eq!(
            select_mechanic(LuckCategory::Block, 9, &[6, 6]),
            DiceMechanic::Sum
        );
        assert_eq!(
            select_mechanic(LuckCategory::Block, 4, &[6, 6]),
            DiceMechanic::AnyDie
        );
    }

    #[test]
    fn die_sides_respect_type_and_observation() {
        assert_eq!(die_sides(Some(1), 3), 8);
        assert_eq!(die_sides(Some(2), 4), 6);
        assert_eq!(die_sides(None, 5), 6);
        assert_eq!(die_sides(Some(0), 7), 8);
        assert_eq!(die_sides(None, 11), 12);
        assert_eq!(die_sides(None, 30), MAX_DIE_SIDES);
        assert_eq!(die_sides(Some(2), 9), 9);
    }

    #[test]
    fn missing_dice_default_to_one_d6() {
        let result = compute_probability(LuckCategory::Injury, 2, &[], false);
        assert_eq!(result.sides, vec![6]);
        assert!(close(result.probability_success, 5.0 / 6.0));
    }

    #[test]
    fn resolve_actual_success_prefers_outcome_code() {
        assert_eq!(resolve_actual_success(Some(1), &[1], Some(6)), Some(true));
        assert_eq!(resolve_actual_success(Some(0), &[6], Some(2)), Some(false));
        assert_eq!(resolve_actual_success(None, &[5], Some(4)), Some(true));
        assert_eq!(resolve_actual_success(None, &[1], Some(4)), Some(false));
        assert_eq!(resolve_actual_success(Some(2), &[3, 4], Some(7)), Some(true));
        assert_eq!(resolve_actual_success(None, &[], Some(4)), None);
        assert_eq!(resolve_actual_success(None, &[4], None), None);
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EED_0D1C);
        for _ in 0..2_000 {
            let count = rng.gen_range(1..=4);
            let dice: Vec<Die> = (0..count)
                .map(|_| Die::new(rng.gen_range(1..=20), Some(rng.gen_range(0..=2))))
                .collect();
            let target = rng.gen_range(-2..=30);
            let category = LuckCategory::ALL[rng.gen_range(0..LuckCategory::ALL.len())];
            let result = compute_probability(category, target, &dice, rng.gen_bool(0.5));
            assert!((0.0..=1.0).contains(&result.probability_success));
            assert!(result.reroll_adjusted_odds >= result.base_odds - 1e-12);
        }
    }

    #[test]
    fn oversized_faces_stay_bounded() {
        assert_eq!(die_sides(Some(2), 2_000_000_000), MAX_DIE_SIDES);
        assert_eq!(die_sides(None, 500), MAX_DIE_SIDES);
        assert!(!dice_are_scorable(&[d6(2_000_000_000), d6(3)]));
        assert!(!dice_are_scorable(&[d6(-1)]));
        assert!(!dice_are_scorable(&vec![d6(3); MAX_SCORED_DICE + 1]));
        assert!(dice_are_scorable(&[d6(6), d6(1)]));

        assert!(close(sum_probability(8, &[u32::MAX, 6]), 0.0));
        assert!(close(sum_probability(8, &[6; MAX_SCORED_DICE + 1]), 0.0));
        let huge = compute_probability(
            LuckCategory::ArmorBreak,
            8,
            &[d6(2_000_000_000), d6(2_000_000_000)],
            false,
        );
        assert_eq!(huge.sides, vec![MAX_DIE_SIDES, MAX_DIE_SIDES]);
        assert!((0.0..=1.0).contains(&huge.probability_success));
    }

    #[test]
    fn sum_distribution_is_monotone_in_target() {
        let sides = [6, 8, 6];
        let mut previous = 1.0;
        for target in 0..=22 {
            let probability = sum_probability(target, &sides);
            assert!(probability <= previous + 1e-12);
            previous = probability;
        }
        assert!(close(sum_probability(3, &sides), 1.0));
        assert!(close(sum_probability(21, &sides), 0.0));
    }
}
