//! Snapshot persistence with a staleness horizon.
//!
//! Wraps any `SnapshotStore` so that a snapshot older than the horizon is
//! indistinguishable from no snapshot at all.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{AssessmentError, AssessmentResult, StoreError};
use crate::domain::models::{Session, MAX_HORIZON_HOURS};
use crate::domain::ports::{Snapshot, SnapshotStore, SNAPSHOT_VERSION};

/// Horizon-aware access to the snapshot store.
#[derive(Clone)]
pub struct SnapshotService {
    store: Arc<dyn SnapshotStore>,
    horizon: Duration,
}

impl SnapshotService {
    /// # Errors
    /// Returns `Validation` if `horizon_hours` is zero or above [`MAX_HORIZON_HOURS`].
    pub fn new(store: Arc<dyn SnapshotStore>, horizon_hours: u64) -> AssessmentResult<Self> {
        let horizon = i64::try_from(horizon_hours)
            .ok()
            .filter(|_| (1..=MAX_HORIZON_HOURS).contains(&horizon_hours))
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                AssessmentError::Validation(format!(
                    "snapshot horizon of {horizon_hours} hours is outside 1..={MAX_HORIZON_HOURS}"
                ))
            })?;
        Ok(Self { store, horizon })
    }

    pub const fn horizon(&self) -> Duration {
        self.horizon
    }

    pub async fn allocate_id(&self) -> Result<Uuid, StoreError> {
        self.store.allocate_id().await
    }

    /// Persist the session stamped with the current time.
    #[instrument(skip(self, session), fields(session_id = %session.id, steps = session.steps.len()), err)]
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let snapshot = Snapshot::new(session.clone(), Utc::now());
        self.store.put(session.id, &snapshot).await
    }

    /// Load a session unless its snapshot is missing, stale, or from another format version.
    #[instrument(skip(self), err)]
    pub async fn load(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        self.load_at(session_id, Utc::now()).await
    }

    /// `load` evaluated against an explicit clock reading.
    pub async fn load_at(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<Option<Session>, StoreError> {
        let Some(snapshot) = self.store.get(session_id).await? else {
            return Ok(None);
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                %session_id,
                version = snapshot.version,
                "ignoring snapshot with unsupported version"
            );
            return Ok(None);
        }

        if !self.is_fresh(&snapshot, now) {
            debug!(%session_id, saved_at = %snapshot.saved_at, "snapshot is past the horizon");
            return Ok(None);
        }

        Ok(Some(snapshot.session))
    }

    pub fn is_fresh(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.saved_at) <= self.horizon
    }

    pub async fn discard(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.store.delete(session_id).await
    }

    /// Remove every snapshot past the horizon.
    #[instrument(skip(self), err)]
    pub async fn purge_stale(&self) -> Result<u64, StoreError> {
        let cutoff = Utc::now()
            .checked_sub_signed(self.horizon)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.store.purge_older_than(cutoff).await?;
        debug!(removed, "purged stale snapshots");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::snapshot::InMemorySnapshotStore;

    fn session() -> Session {
        Session::new(Uuid::new_v4(), "standoff", 3, None)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let service = SnapshotService::new(Arc::new(InMemorySnapshotStore::new()), 24).unwrap();
        let s = session();
        service.save(&s).await.unwrap();
        assert_eq!(service.load(s.id).await.unwrap(), Some(s));
    }

    #[tokio::test]
    async fn test_stale_snapshot_behaves_as_absent() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone(), 24).unwrap();

        let stale = session();
        let old = Snapshot::new(stale.clone(), Utc::now() - Duration::hours(25));
        store.put(stale.id, &old).await.unwrap();

        let missing = service.load(Uuid::new_v4()).await.unwrap();
        let expired = service.load(stale.id).await.unwrap();
        assert_eq!(expired, missing);
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_horizon_boundary_is_inclusive() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone(), 24).unwrap();
        let s = session();
        let saved_at = Utc::now();
        store.put(s.id, &Snapshot::new(s.clone(), saved_at)).await.unwrap();

        let at_horizon = saved_at + Duration::hours(24);
        assert!(service.load_at(s.id, at_horizon).await.unwrap().is_some());
        let past = at_horizon + Duration::seconds(1);
        assert!(service.load_at(s.id, past).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_version_is_ignored() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone(), 24).unwrap();
        let s = session();
        let mut snapshot = Snapshot::new(s.clone(), Utc::now());
        snapshot.version = SNAPSHOT_VERSION + 1;
        store.put(s.id, &snapshot).await.unwrap();
        assert!(service.load(s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone(), 24).unwrap();
        let fresh = session();
        let stale = session();
        service.save(&fresh).await.unwrap();
        store
            .put(stale.id, &Snapshot::new(stale.clone(), Utc::now() - Duration::hours(48)))
            .await
            .unwrap();

        assert_eq!(service.purge_stale().await.unwrap(), 1);
        assert!(store.get(stale.id).await.unwrap().is_none());
        assert!(store.get(fresh.id).await.unwrap().is_some());
    }

    #[test]
    fn test_horizon_out_of_range_is_rejected() {
        let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
        for hours in [0, MAX_HORIZON_HOURS + 1, 10_000_000_000_000, u64::MAX] {
            let err = SnapshotService::new(Arc::clone(&store), hours).err();
            assert!(matches!(err, Some(AssessmentError::Validation(_))), "{hours} hours");
        }

        let widest = SnapshotService::new(store, MAX_HORIZON_HOURS).unwrap();
        assert_eq!(widest.horizon(), Duration::hours(24 * 365 * 10));
    }

    #[tokio::test]
    async fn test_purge_with_widest_horizon_keeps_everything() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone(), MAX_HORIZON_HOURS).unwrap();
        let s = session();
        store
            .put(s.id, &Snapshot::new(s.clone(), Utc::now() - Duration::days(365)))
            .await
            .unwrap();

        assert_eq!(service.purge_stale().await.unwrap(), 0);
        assert!(service.load(s.id).await.unwrap().is_some());
    }
}
