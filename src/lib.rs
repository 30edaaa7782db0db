//! Turnwise - assessment turn engine
//!
//! Drives short behavioral assessments: a participant answers a fixed
//! number of turns, each answer is judged by an external capability, and
//! the session resolves into one archetype. Reactive turns hold a short
//! conversation with a counterpart whose replies are scheduled on idle
//! time rather than on every keystroke.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, error taxonomy and port traits
//! - **Service Layer** (`services`): session sequencing, the idle-response
//!   scheduler, label and rubric resolution, and the per-session engine
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   snapshot stores and judgment adapters
//! - **CLI Layer** (`cli`): inspection and operator commands
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use turnwise::{AssessmentEngine, ConfigLoader, GameDefinition};
//! use turnwise::domain::ports::NullObserver;
//! use turnwise::infrastructure::judge::build_judge;
//! use turnwise::infrastructure::snapshot::InMemorySnapshotStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let game = GameDefinition::from_yaml_str(&std::fs::read_to_string("game.yaml")?, 3)?;
//!     let engine = AssessmentEngine::new(
//!         &config,
//!         build_judge(&config.judge)?,
//!         Arc::new(InMemorySnapshotStore::new()),
//!     )?;
//!     let mut run = engine.start(game, None, Arc::new(NullObserver)).await?;
//!     if let Some(prompt) = run.current_turn().await {
//!         println!("{}", prompt.question);
//!         run.submit("I'd ask what they need first", 4_200).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AssessmentError, AssessmentResult, ErrorKind, JudgmentError, StoreError};
pub use domain::models::{
    Archetype, Config, GameDefinition, GameKind, IntentLabel, Session, TraitName, TraitScore,
    TraitScores, TurnResponse,
};
pub use domain::ports::{AssessmentObserver, JudgmentCapability, SnapshotStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AssessmentEngine, AssessmentRun, ClassificationAggregator, ExchangeHandle, RubricResolver,
    SessionManager, SnapshotService,
};
