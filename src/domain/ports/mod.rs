//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the engine consumes and produces:
//! - JudgmentCapability: classification, scoring, turn generation, exchange reactions
//! - SnapshotStore: session persistence for resumption
//! - AssessmentObserver: callbacks for the presentation layer
//!
//! These traits keep the domain independent of specific infrastructure.

pub mod judgment;
pub mod observer;
pub mod snapshot_store;

pub use judgment::{
    ExchangeContext, ExchangeJudgment, GeneratedTurn, GenerationContext, JudgmentCapability,
    ScenarioContext,
};
pub use observer::{AssessmentObserver, CompletionReport, NullObserver, TurnPrompt};
pub use snapshot_store::{Snapshot, SnapshotStore, SNAPSHOT_VERSION};
