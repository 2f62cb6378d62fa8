//! In-memory [`Store`] for tests and the CLI.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::{CandidateRecord, SessionRecording, StorageError, StorageResult, Store, TestOutcome};
use crate::error::NotFoundError;
use crate::ids::{CandidateId, RecordingId};
use crate::recorder::{EventBatch, SessionEvent};
use crate::sandbox::SandboxSession;

#[derive(Debug, Default)]
struct State {
    candidates: HashMap<CandidateId, CandidateRecord>,
    recordings: HashMap<CandidateId, SessionRecording>,
    recording_owner: HashMap<RecordingId, CandidateId>,
    events: HashMap<RecordingId, Vec<SessionEvent>>,
    outcomes: Vec<TestOutcome>,
}

/// Call counters, for asserting how many round trips a code path made.
#[derive(Debug, Default)]
pub struct StoreStats {
    recordings_created: AtomicU64,
    event_writes: AtomicU64,
    count_increments: AtomicU64,
    outcome_writes: AtomicU64,
}

impl StoreStats {
    pub fn recordings_created(&self) -> u64 {
        self.recordings_created.load(Ordering::SeqCst)
    }

    /// Event writes that persisted rows.
    pub fn event_writes(&self) -> u64 {
        self.event_writes.load(Ordering::SeqCst)
    }

    pub fn count_increments(&self) -> u64 {
        self.count_increments.load(Ordering::SeqCst)
    }

    /// Calls to `create_test_outcomes` that persisted rows.
    pub fn outcome_writes(&self) -> u64 {
        self.outcome_writes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    stats: StoreStats,
    fail_writes: AtomicBool,
    fail_increments: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_candidate(&self, record: CandidateRecord) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.candidates.insert(record.id.clone(), record);
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Make every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make counter increments fail while other writes still succeed.
    pub fn set_fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    fn check_countable(&self) -> StorageResult<()> {
        self.check_writable()?;
        if self.fail_increments.load(Ordering::SeqCst) {
            Err(StorageError::Backend("counter update failed".into()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Backend("writes disabled".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_candidate(&self, id: &CandidateId) -> StorageResult<Option<CandidateRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.candidates.get(id).cloned())
    }

    async fn bind_sandbox(
        &self,
        candidate: &CandidateId,
        session: &SandboxSession,
    ) -> StorageResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let record = state
            .candidates
            .get_mut(candidate)
            .ok_or_else(|| NotFoundError::Candidate(candidate.clone()))?;
        record.sandbox = Some(session.clone());
        Ok(())
    }

    async fn get_or_create_session_recording(
        &self,
        candidate: &CandidateId,
    ) -> StorageResult<SessionRecording> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = state.recordings.get(candidate) {
            return Ok(existing.clone());
        }
        if !state.candidates.contains_key(candidate) {
            return Err(NotFoundError::Candidate(candidate.clone()).into());
        }
        self.check_writable()?;

        let recording = SessionRecording {
            id: RecordingId::generate(),
            candidate_id: candidate.clone(),
            event_count: 0,
            created_at: Utc::now(),
        };
        state
            .recording_owner
            .insert(recording.id.clone(), candidate.clone());
        state.recordings.insert(candidate.clone(), recording.clone());
        self.stats.recordings_created.fetch_add(1, Ordering::SeqCst);
        Ok(recording)
    }

    async fn get_session_recording(
        &self,
        candidate: &CandidateId,
    ) -> StorageResult<Option<SessionRecording>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.recordings.get(candidate).cloned())
    }

    async fn create_test_outcomes(&self, outcomes: Vec<TestOutcome>) -> StorageResult<usize> {
        self.check_writable()?;
        let n = outcomes.len();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.outcomes.extend(outcomes);
        self.stats.outcome_writes.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    async fn list_test_outcomes(&self, candidate: &CandidateId) -> StorageResult<Vec<TestOutcome>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .outcomes
            .iter()
            .filter(|o| &o.candidate_id == candidate)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        recording: &RecordingId,
        events: &EventBatch,
    ) -> StorageResult<usize> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.recording_owner.contains_key(recording) {
            return Err(NotFoundError::Recording(recording.clone()).into());
        }
        state
            .events
            .entry(recording.clone())
            .or_default()
            .extend(events.iter().cloned());
        self.stats.event_writes.fetch_add(1, Ordering::SeqCst);
        Ok(events.len())
    }

    async fn increment_event_count(&self, recording: &RecordingId, n: u64) -> StorageResult<u64> {
        self.check_countable()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let owner = state
            .recording_owner
            .get(recording)
            .cloned()
            .ok_or_else(|| NotFoundError::Recording(recording.clone()))?;
        let rec = state
            .recordings
            .get_mut(&owner)
            .ok_or_else(|| NotFoundError::Recording(recording.clone()))?;
        rec.event_count += n;
        self.stats.count_increments.fetch_add(1, Ordering::SeqCst);
        Ok(rec.event_count)
    }

    async fn record_event_batch(
        &self,
        recording: &RecordingId,
        events: &EventBatch,
    ) -> StorageResult<u64> {
        self.check_countable()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let owner = state
            .recording_owner
            .get(recording)
            .cloned()
            .ok_or_else(|| NotFoundError::Recording(recording.clone()))?;
        let rec = state
            .recordings
            .get_mut(&owner)
            .ok_or_else(|| NotFoundError::Recording(recording.clone()))?;
        rec.event_count += events.len() as u64;
        let total = rec.event_count;
        state
            .events
            .entry(recording.clone())
            .or_default()
            .extend(events.iter().cloned());
        self.stats.event_writes.fetch_add(1, Ordering::SeqCst);
        self.stats.count_increments.fetch_add(1, Ordering::SeqCst);
        Ok(total)
    }

    async fn list_events(&self, recording: &RecordingId) -> StorageResult<Vec<SessionEvent>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.recording_owner.contains_key(recording) {
            return Err(NotFoundError::Recording(recording.clone()).into());
        }
        Ok(state.events.get(recording).cloned().unwrap_or_default())
    }
}
