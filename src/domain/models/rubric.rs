//! Trait names and validated trait scores for rubric sessions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::AssessmentError;

/// Lowest score a trait may carry.
pub const MIN_SCORE: u8 = 1;

/// Highest score a trait may carry.
pub const MAX_SCORE: u8 = 9;

/// The four traits a rubric session scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitName {
    Organization,
    Perfectionism,
    Prudence,
    Diligence,
}

impl TraitName {
    /// Every trait, in rubric order.
    pub const ALL: [Self; 4] = [
        Self::Organization,
        Self::Perfectionism,
        Self::Prudence,
        Self::Diligence,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Perfectionism => "perfectionism",
            Self::Prudence => "prudence",
            Self::Diligence => "diligence",
        }
    }
}

impl fmt::Display for TraitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraitName {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| AssessmentError::Validation(format!("unknown trait: {s}")))
    }
}

/// An integer score in `[1, 9]`.
///
/// Construction never clamps: anything outside the range, or anything that
/// is not an integer, is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TraitScore(u8);

impl TraitScore {
    pub fn new(value: u8) -> Result<Self, AssessmentError> {
        if (MIN_SCORE..=MAX_SCORE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AssessmentError::Validation(format!(
                "score {value} outside [{MIN_SCORE}, {MAX_SCORE}]"
            )))
        }
    }

    /// Validate a raw numeric score as returned by the judgment capability.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_raw(raw: f64) -> Result<Self, AssessmentError> {
        if !raw.is_finite() || raw.fract() != 0.0 {
            return Err(AssessmentError::Validation(format!(
                "score {raw} is not an integer"
            )));
        }
        if raw < f64::from(MIN_SCORE) || raw > f64::from(MAX_SCORE) {
            return Err(AssessmentError::Validation(format!(
                "score {raw} outside [{MIN_SCORE}, {MAX_SCORE}]"
            )));
        }
        Ok(Self(raw as u8))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Numeric-stability guard for derived aggregates; never used on
    /// capability output.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn clamped(value: u32) -> Self {
        if value < MIN_SCORE as u32 {
            Self(MIN_SCORE)
        } else if value > MAX_SCORE as u32 {
            Self(MAX_SCORE)
        } else {
            Self(value as u8)
        }
    }
}

impl TryFrom<u8> for TraitScore {
    type Error = AssessmentError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TraitScore> for u8 {
    fn from(score: TraitScore) -> Self {
        score.0
    }
}

impl fmt::Display for TraitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete set of four trait scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraitScores {
    pub organization: TraitScore,
    pub perfectionism: TraitScore,
    pub prudence: TraitScore,
    pub diligence: TraitScore,
}

impl TraitScores {
    pub const fn get(&self, name: TraitName) -> TraitScore {
        match name {
            TraitName::Organization => self.organization,
            TraitName::Perfectionism => self.perfectionism,
            TraitName::Prudence => self.prudence,
            TraitName::Diligence => self.diligence,
        }
    }

    /// Sum of the four scores, always within `[4, 36]`.
    pub fn sum(&self) -> u32 {
        TraitName::ALL
            .into_iter()
            .map(|name| u32::from(self.get(name).value()))
            .sum()
    }
}

/// Scores collected so far; completes once every trait has one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialTraitScores {
    scores: BTreeMap<TraitName, TraitScore>,
}

impl PartialTraitScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a score; a later score for the same trait replaces the earlier one.
    pub fn insert(&mut self, name: TraitName, score: TraitScore) {
        self.scores.insert(name, score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn complete(&self) -> Option<TraitScores> {
        Some(TraitScores {
            organization: *self.scores.get(&TraitName::Organization)?,
            perfectionism: *self.scores.get(&TraitName::Perfectionism)?,
            prudence: *self.scores.get(&TraitName::Prudence)?,
            diligence: *self.scores.get(&TraitName::Diligence)?,
        })
    }
}

impl FromIterator<(TraitName, TraitScore)> for PartialTraitScores {
    fn from_iter<I: IntoIterator<Item = (TraitName, TraitScore)>>(iter: I) -> Self {
        let mut partial = Self::new();
        for (name, score) in iter {
            partial.insert(name, score);
        }
        partial
    }
}
