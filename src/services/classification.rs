/// Classification aggregator.
///
/// Turns judged intent labels into weights and a path of labels into one of
/// the four path archetypes. Only `classify_turn` talks to the judgment
/// capability; everything else is a pure function of committed labels.
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{AssessmentError, AssessmentResult, JudgmentError};
use crate::domain::models::{Archetype, BucketTable, IntentLabel};
use crate::domain::ports::{JudgmentCapability, ScenarioContext};

pub struct ClassificationAggregator {
    judge: Arc<dyn JudgmentCapability>,
    table: BucketTable,
    timeout: Duration,
}

impl ClassificationAggregator {
    pub fn new(judge: Arc<dyn JudgmentCapability>, table: BucketTable, timeout: Duration) -> Self {
        Self { judge, table, timeout }
    }

    pub const fn table(&self) -> &BucketTable {
        &self.table
    }

    pub const fn path_length(&self) -> usize {
        self.table.path_length()
    }

    /// Classifies one response through the judgment capability.
    ///
    /// # Errors
    /// Returns error if:
    /// - The call exceeds the judgment ceiling (`Timeout`)
    /// - The capability fails or returns something unusable (`Classification`)
    ///
    /// The caller chooses the fallback label; none is invented here.
    #[instrument(skip(self, text, context), fields(step = context.step_number), err)]
    pub async fn classify_turn(&self, text: &str, context: &ScenarioContext) -> AssessmentResult<IntentLabel> {
        let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let outcome = tokio::time::timeout(self.timeout, self.judge.classify(text, context))
            .await
            .map_err(|_| AssessmentError::Timeout {
                operation: "classify",
                after_ms,
            })?;

        match outcome {
            Ok(label) => {
                debug!(%label, weight = label.weight(), "turn classified");
                Ok(label)
            }
            Err(JudgmentError::Timeout(ms)) => Err(AssessmentError::Timeout {
                operation: "classify",
                after_ms: ms,
            }),
            Err(err) => {
                warn!(error = %err, "classification failed");
                Err(AssessmentError::Classification(err.to_string()))
            }
        }
    }

    /// Fixed weight of a label.
    pub const fn weight(label: IntentLabel) -> u32 {
        label.weight()
    }

    /// Resolves a complete path of labels into its archetype.
    ///
    /// # Errors
    /// Returns `Validation` if the path length differs from the configured one.
    pub fn resolve_archetype(&self, path: &[IntentLabel]) -> AssessmentResult<Archetype> {
        resolve_path(&self.table, path)
    }
}

/// Sum of label weights.
pub fn weight_sum(path: &[IntentLabel]) -> u32 {
    path.iter().map(|label| label.weight()).sum()
}

/// Pure path resolution against a bucket table.
///
/// # Errors
/// Returns `Validation` if the path length differs from the table's.
pub fn resolve_path(table: &BucketTable, path: &[IntentLabel]) -> AssessmentResult<Archetype> {
    if path.len() != table.path_length() {
        return Err(AssessmentError::Validation(format!(
            "path has {} labels, expected {}",
            path.len(),
            table.path_length()
        )));
    }

    let sum = weight_sum(path);
    table
        .bucket_for(sum)
        .map(|bucket| bucket.archetype.clone())
        .ok_or_else(|| AssessmentError::Validation(format!("weight sum {sum} falls outside every bucket")))
}
