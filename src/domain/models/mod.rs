pub mod archetype;
pub mod config;
pub mod game;
pub mod intent;
pub mod message;
pub mod rubric;
pub mod session;

pub use archetype::{
    achievable_range, path_archetypes, rubric_archetype, rubric_archetypes, Archetype,
    BucketError, BucketTable, WeightBucket,
};
pub use config::{
    Config, DatabaseConfig, ExchangeConfig, JudgeConfig, JudgeProvider, LoggingConfig,
    ScoringConfig, SnapshotConfig, MAX_HORIZON_HOURS,
};
pub use game::{GameDefinition, GameKind, TurnMode, TurnSpec};
pub use intent::{IntentLabel, UnknownLabel, MAX_WEIGHT, MIN_WEIGHT};
pub use message::{ConversationMessage, Sender, Transcript};
pub use rubric::{PartialTraitScores, TraitName, TraitScore, TraitScores, MAX_SCORE, MIN_SCORE};
pub use session::{
    JudgmentSource, Session, SessionPhase, TurnJudgment, TurnRecord, TurnResponse,
};
