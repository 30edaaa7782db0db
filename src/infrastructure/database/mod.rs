//! `SQLite` persistence for session snapshots

pub mod connection;
pub mod snapshot_repo;
pub mod utils;

pub use connection::DatabaseConnection;
pub use snapshot_repo::SqliteSnapshotStore;
