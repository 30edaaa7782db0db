//! Property-based tests for archetype resolution
//!
//! Tests the following properties:
//! 1. Path resolution lands in the bucket containing the weight sum
//! 2. Path resolution ignores label order and is repeatable
//! 3. Any strictly increasing bound set partitions the achievable sums
//! 4. The rubric aggregate stays between the lowest and highest score
//! 5. Local recomputation agrees with authoritative resolution
//! 6. Every score tuple resolves to the archetype at its rounded mean

use proptest::prelude::*;

use turnwise::domain::models::{
    achievable_range, path_archetypes, rubric_archetype, rubric_archetypes, BucketTable, IntentLabel,
    PartialTraitScores, TraitName, TraitScore, TraitScores,
};
use turnwise::services::{resolve_path, weight_sum, RubricResolver};

fn label_strategy() -> impl Strategy<Value = IntentLabel> {
    prop::sample::select(IntentLabel::ALL.to_vec())
}

fn path_strategy(len: usize) -> impl Strategy<Value = Vec<IntentLabel>> {
    prop::collection::vec(label_strategy(), len..=len)
}

fn score_strategy() -> impl Strategy<Value = TraitScore> {
    (1u8..=9).prop_map(|v| TraitScore::new(v).expect("within range"))
}

fn scores_strategy() -> impl Strategy<Value = TraitScores> {
    (score_strategy(), score_strategy(), score_strategy(), score_strategy()).prop_map(
        |(organization, perfectionism, prudence, diligence)| TraitScores {
            organization,
            perfectionism,
            prudence,
            diligence,
        },
    )
}

/// Path length plus three strictly increasing bounds inside its sum range
fn bounds_strategy() -> impl Strategy<Value = (usize, Vec<u32>)> {
    (2usize..=6).prop_flat_map(|len| {
        let (min, max) = achievable_range(len).expect("short path");
        let candidates: Vec<u32> = (min..max).collect();
        (Just(len), prop::sample::subsequence(candidates, 3))
    })
}

proptest! {
    #[test]
    fn proptest_path_resolves_to_bucket_of_sum(path in path_strategy(3)) {
        let table = BucketTable::with_defaults(3).expect("default table");
        let archetypes = path_archetypes();
        let expected = match weight_sum(&path) {
            3..=4 => &archetypes[0],
            5..=6 => &archetypes[1],
            7..=8 => &archetypes[2],
            _ => &archetypes[3],
        };

        let resolved = resolve_path(&table, &path).expect("full path resolves");
        prop_assert_eq!(&resolved, expected);
    }

    #[test]
    fn proptest_path_resolution_ignores_order(path in path_strategy(3), rotate in 0usize..3) {
        let table = BucketTable::with_defaults(3).expect("default table");
        let mut reordered = path.clone();
        reordered.rotate_left(rotate);
        reordered.swap(0, 2);

        let first = resolve_path(&table, &path).expect("resolves");
        let again = resolve_path(&table, &path).expect("resolves");
        let shuffled = resolve_path(&table, &reordered).expect("resolves");
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(&first, &shuffled);
    }

    #[test]
    fn proptest_wrong_length_path_is_rejected(len in 0usize..6) {
        prop_assume!(len != 3);
        let table = BucketTable::with_defaults(3).expect("default table");
        let path = vec![IntentLabel::Probe; len];
        prop_assert!(resolve_path(&table, &path).is_err());
    }

    #[test]
    fn proptest_bounds_partition_achievable_sums((len, bounds) in bounds_strategy()) {
        let table = BucketTable::from_upper_bounds(len, &bounds).expect("valid bounds");
        let (min, max) = achievable_range(len).expect("short path");

        for sum in min..=max {
            let hits = table.buckets().iter().filter(|b| b.contains(sum)).count();
            prop_assert_eq!(hits, 1, "sum {} hit {} buckets", sum, hits);
        }
        prop_assert_eq!(table.buckets()[0].min, min);
        prop_assert!(table.buckets().last().is_some_and(|b| b.max.is_none()));
    }

    #[test]
    fn proptest_aggregate_within_score_range(scores in scores_strategy()) {
        let values: Vec<u8> = TraitName::ALL.iter().map(|&n| scores.get(n).value()).collect();
        let lowest = *values.iter().min().expect("four scores");
        let highest = *values.iter().max().expect("four scores");

        let aggregate = RubricResolver::aggregate(&scores).value();
        prop_assert!(aggregate >= lowest && aggregate <= highest);
        prop_assert_eq!(RubricResolver::resolve(&scores), rubric_archetype(TraitScore::new(aggregate).expect("valid")));
    }

    #[test]
    fn proptest_local_recompute_matches_resolve(scores in scores_strategy()) {
        let local: PartialTraitScores = TraitName::ALL.iter().map(|&n| (n, scores.get(n))).collect();
        let recomputed = RubricResolver::resolve_with_fallback(None, &local);
        prop_assert_eq!(recomputed, Some(RubricResolver::resolve(&scores)));
    }
}

fn scores(o: u8, p: u8, r: u8, d: u8) -> TraitScores {
    let s = |v| TraitScore::new(v).expect("valid score");
    TraitScores {
        organization: s(o),
        perfectionism: s(p),
        prudence: s(r),
        diligence: s(d),
    }
}

#[test]
fn test_assertive_path_is_challenger() {
    use IntentLabel::{Escalate, Frame};
    let table = BucketTable::with_defaults(3).unwrap();
    let archetype = resolve_path(&table, &[Frame, Escalate, Frame]).unwrap();
    assert_eq!(archetype.name, "The Challenger");
}

#[test]
fn test_yielding_path_is_peacekeeper() {
    use IntentLabel::{Accommodate, Defer, Withdraw};
    let table = BucketTable::with_defaults(3).unwrap();
    let archetype = resolve_path(&table, &[Defer, Withdraw, Accommodate]).unwrap();
    assert_eq!(archetype.name, "The Peacekeeper");
}

#[test]
fn test_mid_scores_round_half_up_to_dependable() {
    // 25 / 4 = 6.25
    let result = scores(6, 6, 7, 6);
    assert_eq!(RubricResolver::aggregate(&result).value(), 6);
    assert_eq!(RubricResolver::resolve(&result).name, "The Dependable");

    // 26 / 4 = 6.5 rounds up
    assert_eq!(RubricResolver::aggregate(&scores(6, 7, 7, 6)).value(), 7);
}

#[test]
fn test_every_score_tuple_resolves_to_rounded_mean() {
    let archetypes = rubric_archetypes();
    let range = 1u8..=9;
    for o in range.clone() {
        for p in range.clone() {
            for r in range.clone() {
                for d in range.clone() {
                    let sum = u32::from(o) + u32::from(p) + u32::from(r) + u32::from(d);
                    let unclamped = (sum + 2) / 4;
                    assert!((1..=9).contains(&unclamped), "{o},{p},{r},{d} needs clamping");

                    let rounded = (f64::from(sum) / 4.0 + 0.5).floor();
                    let expected = u8::try_from(unclamped).unwrap();
                    assert!((rounded - f64::from(expected)).abs() < f64::EPSILON);

                    let tuple = scores(o, p, r, d);
                    assert_eq!(RubricResolver::aggregate(&tuple).value(), expected);
                    assert_eq!(
                        RubricResolver::resolve(&tuple),
                        archetypes[usize::from(expected) - 1],
                        "{o},{p},{r},{d}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_incomplete_local_scores_resolve_to_nothing() {
    let mut local = PartialTraitScores::new();
    local.insert(TraitName::Organization, TraitScore::new(5).unwrap());
    assert_eq!(RubricResolver::resolve_with_fallback(None, &local), None);

    let authoritative = rubric_archetype(TraitScore::new(2).unwrap());
    assert_eq!(
        RubricResolver::resolve_with_fallback(Some(&authoritative), &local),
        Some(authoritative)
    );
}
