use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::utils::{format_timestamp, parse_timestamp};
use crate::domain::errors::StoreError;
use crate::domain::models::Session;
use crate::domain::ports::{Snapshot, SnapshotStore, SNAPSHOT_VERSION};

/// `SQLite` implementation of `SnapshotStore`
///
/// One row per session. The session itself is stored as JSON in `state`;
/// `version` and `saved_at` are columns so staleness and compatibility can
/// be decided without deserializing.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored snapshots, fresh or not
    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn put(&self, session_id: Uuid, snapshot: &Snapshot) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(&snapshot.session)?;

        sqlx::query(
            r"
            INSERT INTO snapshots (session_id, game_id, version, state, completed, saved_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                game_id = excluded.game_id,
                version = excluded.version,
                state = excluded.state,
                completed = excluded.completed,
                saved_at = excluded.saved_at
            ",
        )
        .bind(session_id.to_string())
        .bind(&snapshot.session.game_id)
        .bind(i64::from(snapshot.version))
        .bind(state_json)
        .bind(snapshot.session.completed)
        .bind(format_timestamp(snapshot.saved_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query("SELECT version, state, saved_at FROM snapshots WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_version: i64 = row.try_get("version")?;
        let state: String = row.try_get("state")?;
        let saved_at: String = row.try_get("saved_at")?;

        let version = u32::try_from(raw_version)
            .map_err(|_| StoreError::Corrupt(session_id, format!("invalid version {raw_version}")))?;
        let saved_at = parse_timestamp(&saved_at)
            .map_err(|e| StoreError::Corrupt(session_id, format!("invalid saved_at: {e}")))?;

        match serde_json::from_str::<Session>(&state) {
            Ok(session) => Ok(Some(Snapshot {
                version,
                saved_at,
                session,
            })),
            // Older formats may not deserialize at all; they are treated as absent.
            Err(e) if version != SNAPSHOT_VERSION => {
                warn!(%session_id, version, error = %e, "unreadable snapshot from another version");
                Ok(None)
            }
            Err(e) => Err(StoreError::Corrupt(session_id, e.to_string())),
        }
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM snapshots WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        // julianday normalises hand-written and offset timestamps before comparing
        let result = sqlx::query("DELETE FROM snapshots WHERE julianday(saved_at) < julianday(?)")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
