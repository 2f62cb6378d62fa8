//! Event recording from the client-side buffer down to the store.

use std::sync::Arc;
use std::time::Duration;

use proctor::error::ValidationError;
use proctor::ids::CandidateId;
use proctor::recorder::{
    BufferConfig, BufferError, EventBuffer, EventRecorder, IngestRequest, RecordError,
    RecorderSink, SessionEvent,
};
use proctor::store::{CandidateRecord, InMemoryStore, Store};
use proctor::transport::{ResilientTransport, TransportConfig, TransportError};
use serde_json::json;

fn candidate() -> CandidateId {
    CandidateId::new("cand-1")
}

fn setup() -> (Arc<InMemoryStore>, Arc<EventRecorder>) {
    let store = Arc::new(InMemoryStore::new());
    store.insert_candidate(CandidateRecord::new(candidate(), "javascript"));
    let recorder = Arc::new(EventRecorder::new(store.clone()));
    (store, recorder)
}

fn buffer(recorder: Arc<EventRecorder>, config: TransportConfig) -> EventBuffer {
    EventBuffer::new(
        Arc::new(RecorderSink::new(recorder, candidate())),
        ResilientTransport::new(config),
        BufferConfig {
            max_batch: 50,
            flush_interval: Duration::from_secs(5),
        },
    )
}

#[tokio::test]
async fn keystrokes_then_checkpoint_flush_as_one_batch() {
    let (store, recorder) = setup();
    let buffer = buffer(recorder, TransportConfig::no_retries());

    assert_eq!(buffer.push(SessionEvent::new("keystroke")).await.unwrap(), 0);
    assert_eq!(buffer.push(SessionEvent::new("keystroke")).await.unwrap(), 0);
    let flushed = buffer
        .push(SessionEvent::new("agent.question_answered").checkpoint())
        .await
        .unwrap();
    assert_eq!(flushed, 3);
    assert!(buffer.is_empty());

    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recording.event_count, 3);
    assert_eq!(store.stats().count_increments(), 1);
    assert_eq!(store.stats().event_writes(), 1);

    let events = store.list_events(&recording.id).await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, ["keystroke", "keystroke", "agent.question_answered"]);
    assert!(events[2].checkpoint);
    assert!(!events[0].checkpoint);
}

#[tokio::test]
async fn k_events_increment_counter_by_k_once_per_batch() {
    let (store, recorder) = setup();
    for k in [1usize, 4, 7] {
        let events = (0..k).map(|i| SessionEvent::new("file.edit").with_data(json!({"i": i})));
        recorder
            .record_events(&candidate(), events.collect())
            .await
            .unwrap();
    }
    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recording.event_count, 12);
    assert_eq!(store.stats().count_increments(), 3);
    assert_eq!(store.stats().recordings_created(), 1);
}

#[tokio::test]
async fn invalid_batches_write_nothing() {
    let (store, recorder) = setup();

    let empty = recorder.record_events(&candidate(), Vec::new()).await;
    assert!(matches!(
        empty,
        Err(RecordError::Validation(ValidationError::EmptyBatch))
    ));

    let missing_type = recorder
        .record_events(
            &candidate(),
            vec![SessionEvent::new("keystroke"), SessionEvent::new("  ")],
        )
        .await;
    assert!(matches!(
        missing_type,
        Err(RecordError::Validation(ValidationError::MissingEventType { index: 1 }))
    ));

    let raw: IngestRequest = serde_json::from_value(json!({
        "events": [{"type": "keystroke"}, {"data": {"key": "a"}}]
    }))
    .unwrap();
    let err = recorder.ingest(&candidate(), raw).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    assert_eq!(store.stats().event_writes(), 0);
    assert_eq!(store.stats().count_increments(), 0);
}

#[tokio::test]
async fn outage_keeps_checkpoint_until_next_flush() {
    let (store, recorder) = setup();
    let buffer = buffer(recorder, TransportConfig::no_retries());

    store.set_fail_writes(true);
    let err = buffer
        .push(SessionEvent::new("agent.question_answered").checkpoint())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(buffer.len(), 1);

    store.set_fail_writes(false);
    buffer.push(SessionEvent::new("keystroke")).await.unwrap();
    assert_eq!(buffer.flush().await.unwrap(), 2);

    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    let events = store.list_events(&recording.id).await.unwrap();
    assert_eq!(events[0].event_type, "agent.question_answered");
    assert!(events[0].checkpoint);
    assert_eq!(recording.event_count, 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_through_the_transport() {
    let (store, recorder) = setup();
    let buffer = Arc::new(buffer(recorder, TransportConfig::default()));

    store.set_fail_writes(true);
    let flusher = {
        let buffer = buffer.clone();
        tokio::spawn(async move {
            buffer
                .push(SessionEvent::new("agent.question_answered").checkpoint())
                .await
        })
    };
    // First attempt fails; recover during the 2s backoff.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    store.set_fail_writes(false);

    assert_eq!(flusher.await.unwrap().unwrap(), 1);
    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recording.event_count, 1);
}

#[tokio::test]
async fn unknown_candidate_is_terminal_404() {
    let store = Arc::new(InMemoryStore::new());
    let recorder = Arc::new(EventRecorder::new(store.clone()));
    let buffer = buffer(recorder, TransportConfig::default());
    let err = buffer
        .push(SessionEvent::new("x").checkpoint())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BufferError::Delivery(TransportError::Status { status: 404, .. })
    ));
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn typeless_event_does_not_block_later_checkpoints() {
    let (store, recorder) = setup();
    let buffer = buffer(recorder, TransportConfig::default());

    let err = buffer.push(SessionEvent::new("")).await.unwrap_err();
    assert!(matches!(
        err,
        BufferError::Invalid(ValidationError::MissingEventType { .. })
    ));

    for _ in 0..3 {
        let delivered = buffer
            .push(SessionEvent::new("agent.question_answered").checkpoint())
            .await
            .unwrap();
        assert_eq!(delivered, 1);
    }
    assert!(buffer.is_empty());

    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recording.event_count, 3);
    let events = store.list_events(&recording.id).await.unwrap();
    assert!(events.iter().all(|e| e.checkpoint));
}

#[tokio::test]
async fn failed_counter_update_leaves_no_rows_behind() {
    let (store, recorder) = setup();
    let buffer = buffer(recorder, TransportConfig::no_retries());

    store.set_fail_increments(true);
    let err = buffer
        .push(SessionEvent::new("agent.question_answered").checkpoint())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    assert!(store.list_events(&recording.id).await.unwrap().is_empty());
    assert_eq!(recording.event_count, 0);

    store.set_fail_increments(false);
    assert_eq!(buffer.flush().await.unwrap(), 1);
    let recording = store
        .get_session_recording(&candidate())
        .await
        .unwrap()
        .unwrap();
    let events = store.list_events(&recording.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(recording.event_count, 1);
}
