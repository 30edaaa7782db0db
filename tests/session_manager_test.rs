//! Integration tests for turn sequencing and persistence confirmation

use std::sync::Arc;

use turnwise::domain::errors::{AssessmentError, ErrorKind};
use turnwise::domain::models::{path_archetypes, SessionPhase, TurnResponse};
use turnwise::infrastructure::snapshot::InMemorySnapshotStore;
use turnwise::services::{SessionManager, SnapshotService};

fn manager() -> (SessionManager, Arc<InMemorySnapshotStore>) {
    let store = Arc::new(InMemorySnapshotStore::new());
    let manager = SessionManager::new(SnapshotService::new(store.clone(), 24).unwrap());
    (manager, store)
}

fn response(step: u32) -> TurnResponse {
    TurnResponse::new(step, format!("Question {step}"), format!("Answer {step}"))
}

#[tokio::test]
async fn test_turns_advance_in_order_and_persist() {
    let (manager, _store) = manager();
    let session = manager.start_session("standoff", 3, None).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::NotStarted);

    let session = manager.record_turn(&session, response(1)).await.unwrap();
    let session = manager.record_turn(&session, response(2)).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::InProgress(2));

    let restored = manager.resume(session.id).await.unwrap().expect("snapshot present");
    assert_eq!(restored, session);
}

#[tokio::test]
async fn test_out_of_order_step_is_a_sequence_error() {
    let (manager, _store) = manager();
    let session = manager.start_session("standoff", 3, None).await.unwrap();

    let err = manager.record_turn(&session, response(2)).await.unwrap_err();
    assert!(matches!(err, AssessmentError::Sequence { expected: 1, got: 2 }));
    assert_eq!(err.kind(), ErrorKind::Sequence);

    let session = manager.record_turn(&session, response(1)).await.unwrap();
    let err = manager.record_turn(&session, response(1)).await.unwrap_err();
    assert!(matches!(err, AssessmentError::Sequence { expected: 2, got: 1 }));
}

#[tokio::test]
async fn test_step_beyond_total_is_rejected() {
    let (manager, _store) = manager();
    let mut session = manager.start_session("standoff", 1, None).await.unwrap();
    session = manager.record_turn(&session, response(1)).await.unwrap();
    assert!(SessionManager::is_complete(&session));

    let err = manager.record_turn(&session, response(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sequence);
}

#[tokio::test]
async fn test_unconfirmed_write_leaves_session_unchanged() {
    let (manager, store) = manager();
    let session = manager.start_session("standoff", 3, None).await.unwrap();

    store.set_unavailable(true);
    let err = manager.record_turn(&session, response(1)).await.unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(err.kind(), ErrorKind::Recoverable);
    assert!(session.steps.is_empty());

    // the same call succeeds once the store is back
    store.set_unavailable(false);
    let advanced = manager.record_turn(&session, response(1)).await.unwrap();
    assert_eq!(advanced.steps.len(), 1);
}

#[tokio::test]
async fn test_completion_requires_every_turn_and_happens_once() {
    let (manager, _store) = manager();
    let archetype = path_archetypes()[1].clone();
    let mut session = manager.start_session("standoff", 2, None).await.unwrap();
    session = manager.record_turn(&session, response(1)).await.unwrap();

    let err = manager.complete(&session, archetype.clone()).await.unwrap_err();
    assert!(matches!(err, AssessmentError::SessionIncomplete(_)));

    session = manager.record_turn(&session, response(2)).await.unwrap();
    let done = manager.complete(&session, archetype.clone()).await.unwrap();
    assert!(done.completed);
    assert_eq!(done.result.as_ref(), Some(&archetype));
    assert_eq!(done.phase(), SessionPhase::Complete);

    let err = manager.complete(&done, archetype).await.unwrap_err();
    assert!(matches!(err, AssessmentError::SessionComplete(_)));
    let err = manager.record_turn(&done, response(3)).await.unwrap_err();
    assert!(matches!(err, AssessmentError::SessionComplete(_)));
}

#[tokio::test]
async fn test_zero_turn_session_is_invalid() {
    let (manager, store) = manager();
    let err = manager.start_session("standoff", 0, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.is_empty().await);
}
