//! Service layer: sequencing, scheduling, aggregation and the engine that
//! ties them to a game.

pub mod assessment_engine;
pub mod classification;
pub mod exchange;
pub mod rubric_resolver;
pub mod session_manager;
pub mod snapshot_service;

pub use assessment_engine::{AssessmentEngine, AssessmentRun};
pub use classification::{resolve_path, weight_sum, ClassificationAggregator};
pub use exchange::{ExchangeHandle, ExchangeOutcome, ExchangePhase, ExchangeSettings, ExchangeView};
pub use rubric_resolver::RubricResolver;
pub use session_manager::SessionManager;
pub use snapshot_service::SnapshotService;
