//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Snapshot persistence (SQLite with sqlx, and in-memory)
//! - Judgment adapters (Anthropic Messages API, scripted)
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod database;
pub mod judge;
pub mod logging;
pub mod snapshot;
