/// Rubric score resolver.
///
/// Collects four trait scores and resolves their rounded mean into one of the
/// nine rubric archetypes. The authoritative path and the local fallback path
/// share one pure function so they can never disagree.
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{AssessmentError, AssessmentResult, JudgmentError};
use crate::domain::models::{rubric_archetype, Archetype, PartialTraitScores, TraitName, TraitScore, TraitScores};
use crate::domain::ports::{JudgmentCapability, ScenarioContext};

pub struct RubricResolver {
    judge: Arc<dyn JudgmentCapability>,
    timeout: Duration,
}

impl RubricResolver {
    pub fn new(judge: Arc<dyn JudgmentCapability>, timeout: Duration) -> Self {
        Self { judge, timeout }
    }

    /// Scores one response on one trait.
    ///
    /// # Errors
    /// Returns error if:
    /// - The capability returns a non-integer or out-of-range score (`Validation`)
    /// - The call exceeds the judgment ceiling (`Timeout`)
    /// - The capability fails outright (`Classification`)
    #[instrument(skip(self, text, rubric), fields(step = rubric.step_number), err)]
    pub async fn score_trait(
        &self,
        trait_name: TraitName,
        text: &str,
        rubric: &ScenarioContext,
    ) -> AssessmentResult<TraitScore> {
        let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let outcome = tokio::time::timeout(self.timeout, self.judge.score(trait_name, text, rubric))
            .await
            .map_err(|_| AssessmentError::Timeout {
                operation: "score",
                after_ms,
            })?;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(JudgmentError::Timeout(ms)) => {
                return Err(AssessmentError::Timeout {
                    operation: "score",
                    after_ms: ms,
                })
            }
            Err(JudgmentError::Unparseable(msg)) => return Err(AssessmentError::Validation(msg)),
            Err(err) => return Err(AssessmentError::Classification(err.to_string())),
        };

        let score = TraitScore::from_raw(raw).inspect_err(|err| warn!(raw, error = %err, "rejected trait score"))?;
        debug!(%trait_name, %score, "trait scored");
        Ok(score)
    }

    /// Rounded-half-up mean of the four scores.
    pub fn aggregate(scores: &TraitScores) -> TraitScore {
        aggregate_scores(scores)
    }

    /// Archetype at index `score - 1`.
    pub fn resolve_archetype(score: TraitScore) -> Archetype {
        rubric_archetype(score)
    }

    /// Authoritative resolution of a complete score set.
    pub fn resolve(scores: &TraitScores) -> Archetype {
        resolve_scores(scores)
    }

    /// Returns the authoritative archetype when one exists, otherwise
    /// recomputes it from locally held scores if all four are present.
    pub fn resolve_with_fallback(
        authoritative: Option<&Archetype>,
        local: &PartialTraitScores,
    ) -> Option<Archetype> {
        if let Some(archetype) = authoritative {
            return Some(archetype.clone());
        }
        let scores = local.complete()?;
        debug!(traits = local.len(), "recomputing rubric archetype from local scores");
        Some(resolve_scores(&scores))
    }
}

fn aggregate_scores(scores: &TraitScores) -> TraitScore {
    // floor(sum / 4 + 1/2) in integers
    TraitScore::clamped((scores.sum() + 2) / 4)
}

fn resolve_scores(scores: &TraitScores) -> Archetype {
    rubric_archetype(aggregate_scores(scores))
}
