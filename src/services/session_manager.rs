/// Turn session manager.
///
/// Sole writer of a session's step list. Every mutation is computed on a copy,
/// persisted through the snapshot service, and only handed back to the caller
/// once the store has confirmed the write.
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{AssessmentError, AssessmentResult};
use crate::domain::models::{Archetype, Session, TurnRecord, TurnResponse};
use crate::services::snapshot_service::SnapshotService;

/// Creates, advances and completes sessions.
#[derive(Clone)]
pub struct SessionManager {
    snapshots: SnapshotService,
}

impl SessionManager {
    pub fn new(snapshots: SnapshotService) -> Self {
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &SnapshotService {
        &self.snapshots
    }

    /// Starts a session with no steps.
    ///
    /// # Errors
    /// Returns error if:
    /// - `total_turns` is zero
    /// - The store cannot allocate an id or persist the new session
    #[instrument(skip(self), err)]
    pub async fn start_session(
        &self,
        game_id: &str,
        total_turns: u32,
        participant_id: Option<String>,
    ) -> AssessmentResult<Session> {
        if total_turns == 0 {
            return Err(AssessmentError::Validation(
                "a session needs at least one turn".to_string(),
            ));
        }

        let id = self.snapshots.allocate_id().await?;
        let session = Session::new(id, game_id, total_turns, participant_id);
        self.snapshots.save(&session).await?;

        info!(session_id = %session.id, game_id, total_turns, "session started");
        Ok(session)
    }

    /// Appends a turn and persists the result.
    ///
    /// The returned session is the only one that advanced; `session` itself is
    /// never modified.
    ///
    /// # Errors
    /// Returns error if:
    /// - The session is already complete (`SessionComplete`)
    /// - The step number is not the next one, or exceeds the configured total (`Sequence`)
    /// - The store did not confirm the write (`Recoverable`)
    #[instrument(skip(self, session, response), fields(session_id = %session.id, step = response.step_number), err)]
    pub async fn record_turn(&self, session: &Session, response: TurnResponse) -> AssessmentResult<Session> {
        let next = append_turn(session, response)?;
        self.persist(&next).await?;
        info!(step = next.steps.len(), total = next.total_turns, "turn recorded");
        Ok(next)
    }

    /// Appends a turn in memory only.
    ///
    /// Counterpart of [`SessionManager::complete_unpersisted`] for sessions
    /// that carry on after the store stopped confirming writes. Such a session
    /// can no longer be resumed past its last persisted step.
    ///
    /// # Errors
    /// Same sequencing errors as [`SessionManager::record_turn`].
    pub fn record_turn_unpersisted(session: &Session, response: TurnResponse) -> AssessmentResult<Session> {
        let next = append_turn(session, response)?;
        warn!(
            session_id = %next.id,
            step = next.steps.len(),
            total = next.total_turns,
            "turn recorded without a persisted snapshot"
        );
        Ok(next)
    }

    /// True once every configured turn is recorded.
    pub fn is_complete(session: &Session) -> bool {
        session.all_turns_recorded()
    }

    /// Sets the result and marks the session complete.
    ///
    /// # Errors
    /// Returns error if:
    /// - The session is already complete (`SessionComplete`)
    /// - Turns are still outstanding (`SessionIncomplete`)
    /// - The store did not confirm the write (`Recoverable`)
    #[instrument(skip(self, session), fields(session_id = %session.id, archetype = %archetype.name), err)]
    pub async fn complete(&self, session: &Session, archetype: Archetype) -> AssessmentResult<Session> {
        let next = mark_complete(session, archetype)?;
        self.persist(&next).await?;
        info!("session complete");
        Ok(next)
    }

    /// Completes the session in memory only.
    ///
    /// Used when the store keeps refusing the completion write so the
    /// participant still receives a result.
    ///
    /// # Errors
    /// Same sequencing errors as [`SessionManager::complete`].
    pub fn complete_unpersisted(session: &Session, archetype: Archetype) -> AssessmentResult<Session> {
        let next = mark_complete(session, archetype)?;
        warn!(session_id = %next.id, "session completed without a persisted snapshot");
        Ok(next)
    }

    /// Restores a session from its snapshot, honoring the staleness horizon.
    #[instrument(skip(self), err)]
    pub async fn resume(&self, session_id: Uuid) -> AssessmentResult<Option<Session>> {
        let restored = self.snapshots.load(session_id).await?;
        match &restored {
            Some(session) => info!(steps = session.steps.len(), completed = session.completed, "session resumed"),
            None => info!("no usable snapshot"),
        }
        Ok(restored)
    }

    async fn persist(&self, session: &Session) -> AssessmentResult<()> {
        self.snapshots
            .save(session)
            .await
            .map_err(AssessmentError::Recoverable)
    }
}

fn append_turn(session: &Session, response: TurnResponse) -> AssessmentResult<Session> {
    if session.completed {
        return Err(AssessmentError::SessionComplete(session.id));
    }

    let expected = session.next_step();
    if response.step_number != expected || response.step_number > session.total_turns {
        return Err(AssessmentError::Sequence {
            expected,
            got: response.step_number,
        });
    }

    let now = Utc::now();
    let mut next = session.clone();
    next.steps.push(TurnRecord::from_response(response, now));
    next.updated_at = now;
    Ok(next)
}

fn mark_complete(session: &Session, archetype: Archetype) -> AssessmentResult<Session> {
    if session.completed || session.result.is_some() {
        return Err(AssessmentError::SessionComplete(session.id));
    }
    if !session.all_turns_recorded() {
        return Err(AssessmentError::SessionIncomplete(session.id));
    }

    let mut next = session.clone();
    next.result = Some(archetype);
    next.completed = true;
    next.updated_at = Utc::now();
    Ok(next)
}
