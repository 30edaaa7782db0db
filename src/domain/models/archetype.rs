//! Archetypes and the fixed tables that map aggregates onto them.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::intent::{MAX_WEIGHT, MIN_WEIGHT};
use super::rubric::TraitScore;

/// Final named outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Archetype {
    pub name: String,
    pub description: String,
}

impl Archetype {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Path archetypes in bucket order (lowest weight sum first).
pub fn path_archetypes() -> [Archetype; 4] {
    [
        Archetype::new(
            "The Peacekeeper",
            "Keeps tension low by yielding or stepping back when pressure rises.",
        ),
        Archetype::new(
            "The Diplomat",
            "Balances accommodation with careful questions and measured trades.",
        ),
        Archetype::new(
            "The Strategist",
            "Steers the exchange deliberately, pushing when it pays to push.",
        ),
        Archetype::new(
            "The Challenger",
            "Takes control of the terms and meets pressure head-on.",
        ),
    ]
}

/// Rubric archetypes, ordered so that index = score - 1.
pub fn rubric_archetypes() -> [Archetype; 9] {
    [
        Archetype::new("The Free Spirit", "Follows impulse over plan; structure feels confining."),
        Archetype::new("The Improviser", "Prefers to work things out on the fly."),
        Archetype::new("The Easygoing", "Relaxed about detail and happy to leave loose ends."),
        Archetype::new("The Adaptable", "Plans lightly and adjusts as things change."),
        Archetype::new("The Balanced", "Mixes planning and flexibility in equal measure."),
        Archetype::new("The Dependable", "Reliably finishes what they start."),
        Archetype::new("The Methodical", "Works in ordered steps and checks before acting."),
        Archetype::new("The Meticulous", "Sweats the details and rarely lets an error slip."),
        Archetype::new("The Perfectionist", "Holds every result to an exacting standard."),
    ]
}

/// Rubric archetype for a validated aggregate score.
pub fn rubric_archetype(score: TraitScore) -> Archetype {
    let index = usize::from(score.value() - 1);
    rubric_archetypes()[index].clone()
}

/// A contiguous inclusive range of weight sums mapped to one archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBucket {
    pub min: u32,
    /// `None` for the open-ended top bucket.
    pub max: Option<u32>,
    pub archetype: Archetype,
}

impl WeightBucket {
    pub fn contains(&self, sum: u32) -> bool {
        sum >= self.min && self.max.is_none_or(|max| sum <= max)
    }

    /// True when only a single achievable sum lands in this bucket.
    pub fn is_degenerate(&self, achievable_max: u32) -> bool {
        let upper = self.max.map_or(achievable_max, |m| m.min(achievable_max));
        upper == self.min
    }
}

/// Reasons a bucket table fails to partition the achievable sum space.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BucketError {
    #[error("Path length must be at least 1")]
    EmptyPath,

    #[error("Path length {0} overflows the weight sum")]
    PathTooLong(usize),

    #[error("Expected {expected} bucket bounds, got {got}")]
    WrongBoundCount { expected: usize, got: usize },

    #[error("Bucket bound {bound} leaves bucket {index} empty or overlapping")]
    NotIncreasing { index: usize, bound: u32 },

    #[error("Bucket bound {bound} is outside the achievable sums [{min}, {max}]")]
    OutOfRange { bound: u32, min: u32, max: u32 },
}

/// Fixed, contiguous, non-overlapping mapping from weight sum to archetype.
///
/// Built once from the configured path length; every achievable sum in
/// `[path_length * MIN_WEIGHT, path_length * MAX_WEIGHT]` lands in exactly
/// one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTable {
    path_length: usize,
    buckets: Vec<WeightBucket>,
}

impl BucketTable {
    /// Default upper bounds for the first three buckets with three turns.
    pub const DEFAULT_UPPER_BOUNDS: [u32; 3] = [4, 6, 8];

    /// Build the table from the inclusive upper bounds of every bucket but the last.
    pub fn from_upper_bounds(path_length: usize, upper_bounds: &[u32]) -> Result<Self, BucketError> {
        if path_length == 0 {
            return Err(BucketError::EmptyPath);
        }
        let archetypes = path_archetypes();
        if upper_bounds.len() != archetypes.len() - 1 {
            return Err(BucketError::WrongBoundCount {
                expected: archetypes.len() - 1,
                got: upper_bounds.len(),
            });
        }

        let (min_sum, max_sum) = achievable_range(path_length)?;
        let mut buckets = Vec::with_capacity(archetypes.len());
        let mut lower = min_sum;

        for (index, (archetype, &bound)) in archetypes.iter().zip(upper_bounds).enumerate() {
            if bound < min_sum || bound >= max_sum {
                return Err(BucketError::OutOfRange {
                    bound,
                    min: min_sum,
                    max: max_sum,
                });
            }
            if bound < lower {
                return Err(BucketError::NotIncreasing { index, bound });
            }
            buckets.push(WeightBucket {
                min: lower,
                max: Some(bound),
                archetype: archetype.clone(),
            });
            lower = bound + 1;
        }

        let top = archetypes[archetypes.len() - 1].clone();
        buckets.push(WeightBucket {
            min: lower,
            max: None,
            archetype: top,
        });

        let table = Self {
            path_length,
            buckets,
        };
        for bucket in table.buckets.iter().filter(|b| b.is_degenerate(max_sum)) {
            tracing::debug!(
                archetype = %bucket.archetype,
                sum = bucket.min,
                "weight bucket admits a single achievable sum"
            );
        }
        Ok(table)
    }

    /// Table for the given path length using the default bounds.
    pub fn with_defaults(path_length: usize) -> Result<Self, BucketError> {
        Self::from_upper_bounds(path_length, &Self::DEFAULT_UPPER_BOUNDS)
    }

    pub const fn path_length(&self) -> usize {
        self.path_length
    }

    pub fn buckets(&self) -> &[WeightBucket] {
        &self.buckets
    }

    /// Bucket for a weight sum; `None` for sums below the achievable range.
    pub fn bucket_for(&self, sum: u32) -> Option<&WeightBucket> {
        self.buckets.iter().find(|b| b.contains(sum))
    }
}

/// Inclusive range of weight sums reachable with `path_length` labels.
///
/// # Errors
/// Returns `PathTooLong` if the largest sum does not fit in a `u32`.
pub fn achievable_range(path_length: usize) -> Result<(u32, u32), BucketError> {
    let n = u32::try_from(path_length).map_err(|_| BucketError::PathTooLong(path_length))?;
    match (n.checked_mul(MIN_WEIGHT), n.checked_mul(MAX_WEIGHT)) {
        (Some(min), Some(max)) => Ok((min, max)),
        _ => Err(BucketError::PathTooLong(path_length)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_partitions_three_to_nine() {
        let table = BucketTable::with_defaults(3).unwrap();
        let names: Vec<_> = (3..=9)
            .map(|sum| table.bucket_for(sum).unwrap().archetype.name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "The Peacekeeper",
                "The Peacekeeper",
                "The Diplomat",
                "The Diplomat",
                "The Strategist",
                "The Strategist",
                "The Challenger",
            ]
        );
    }

    #[test]
    fn test_top_bucket_is_open_and_degenerate() {
        let table = BucketTable::with_defaults(3).unwrap();
        let top = table.buckets().last().unwrap();
        assert_eq!(top.min, 9);
        assert_eq!(top.max, None);
        assert!(top.is_degenerate(9));
        assert!(table.bucket_for(42).is_some());
    }

    #[test]
    fn test_rejects_overlapping_bounds() {
        let err = BucketTable::from_upper_bounds(3, &[4, 4, 8]).unwrap_err();
        assert!(matches!(err, BucketError::NotIncreasing { index: 1, .. }));
    }

    #[test]
    fn test_rejects_bound_beyond_achievable_max() {
        let err = BucketTable::from_upper_bounds(3, &[4, 6, 9]).unwrap_err();
        assert!(matches!(err, BucketError::OutOfRange { bound: 9, .. }));
    }

    #[test]
    fn test_rederived_for_longer_path() {
        // Five turns reach sums in [5, 15].
        let table = BucketTable::from_upper_bounds(5, &[7, 10, 13]).unwrap();
        for sum in 5..=15 {
            let hits = table.buckets().iter().filter(|b| b.contains(sum)).count();
            assert_eq!(hits, 1, "sum {sum} must land in exactly one bucket");
        }
        // The defaults no longer fit the space.
        assert!(BucketTable::with_defaults(5).is_err());
    }

    #[test]
    fn test_absurd_path_length_is_an_error() {
        assert_eq!(achievable_range(3), Ok((3, 9)));
        assert_eq!(achievable_range(usize::MAX), Err(BucketError::PathTooLong(usize::MAX)));
        // fits in u32 but the top sum does not
        let wide = (u32::MAX / MAX_WEIGHT + 1) as usize;
        assert_eq!(achievable_range(wide), Err(BucketError::PathTooLong(wide)));

        let err = BucketTable::from_upper_bounds(usize::MAX, &[4, 6, 8]).unwrap_err();
        assert_eq!(err, BucketError::PathTooLong(usize::MAX));
    }

    #[test]
    fn test_rubric_archetype_index() {
        let score = TraitScore::new(6).unwrap();
        assert_eq!(rubric_archetype(score).name, "The Dependable");
        assert_eq!(rubric_archetype(TraitScore::new(1).unwrap()).name, "The Free Spirit");
        assert_eq!(rubric_archetype(TraitScore::new(9).unwrap()).name, "The Perfectionist");
    }
}
