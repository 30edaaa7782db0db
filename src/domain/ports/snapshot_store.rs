/// Snapshot store port (trait) for dependency injection.
///
/// Defines the contract for persisting session state so an interrupted
/// assessment can resume. Services depend on this trait, not on concrete
/// adapters.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::Session;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized copy of session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub session: Session,
}

impl Snapshot {
    pub fn new(session: Session, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            session,
        }
    }
}

/// Keyed snapshot persistence.
///
/// Implementations should handle:
/// - JSON serialization of the session
/// - Upsert semantics on `put`
/// - Returning `Ok(None)` for unknown ids rather than an error
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Allocates a fresh session id
    ///
    /// # Errors
    /// Returns error if the store cannot be reached
    async fn allocate_id(&self) -> Result<Uuid, StoreError> {
        Ok(Uuid::new_v4())
    }

    /// Writes (or replaces) the snapshot for a session
    ///
    /// # Errors
    /// Returns error if:
    /// - The store cannot be reached
    /// - Serialization fails
    async fn put(&self, session_id: Uuid, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Reads the snapshot for a session regardless of its age
    ///
    /// # Returns
    /// - `Some(Snapshot)` if found
    /// - `None` if not found
    async fn get(&self, session_id: Uuid) -> Result<Option<Snapshot>, StoreError>;

    /// Removes a snapshot; returns whether one existed
    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError>;

    /// Removes every snapshot saved before `cutoff`; returns how many were removed
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
