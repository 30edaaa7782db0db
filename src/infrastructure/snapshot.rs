//! In-memory snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::ports::{Snapshot, SnapshotStore};

/// Process-local `SnapshotStore`, for tests and runs without a database.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<Uuid, Snapshot>>,
    unavailable: AtomicBool,
    read_only: AtomicBool,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes fail with `StoreError::Unavailable` while reads still succeed.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check()?;
        if self.read_only.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn allocate_id(&self) -> Result<Uuid, StoreError> {
        self.check()?;
        Ok(Uuid::new_v4())
    }

    async fn put(&self, session_id: Uuid, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.check_write()?;
        self.snapshots.write().await.insert(session_id, snapshot.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Snapshot>, StoreError> {
        self.check()?;
        Ok(self.snapshots.read().await.get(&session_id).cloned())
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        Ok(self.snapshots.write().await.remove(&session_id).is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_write()?;
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|_, s| s.saved_at >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }
}
