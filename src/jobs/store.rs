//! Job Store
//!
//! Persistence seam for job records. The store enforces the two write
//! invariants every backend must keep regardless of who calls it: terminal
//! states absorb (no write leaves Completed or Failed), and progress never
//! decreases. `update` reports whether the write applied, so concurrent
//! writers (orchestrator vs cancel vs progress reporter) resolve races by
//! observing their own outcome instead of locking.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::types::{AnalysisOutcome, JobError, JobId, JobRecord, JobState, JobStatusView};

// =============================================================================
// Job Update
// =============================================================================

/// One atomic partial write to a job record. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub progress: Option<u8>,
    pub error: Option<JobError>,
    pub result: Option<Box<AnalysisOutcome>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn error(mut self, error: JobError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn result(mut self, result: AnalysisOutcome) -> Self {
        self.result = Some(Box::new(result));
        self
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Job record persistence. Implementations must apply `update` atomically
/// per record and uphold the absorbing-terminal and monotonic-progress
/// rules.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, record: JobRecord);

    /// Apply a partial write. Returns `false` without side effects when the
    /// job is unknown, already terminal, or the write would move progress
    /// backwards.
    async fn update(&self, id: JobId, update: JobUpdate) -> bool;

    async fn get(&self, id: JobId) -> Option<JobRecord>;

    async fn status(&self, id: JobId) -> Option<JobStatusView> {
        self.get(id).await.map(|r| r.status_view())
    }
}

// =============================================================================
// In-memory Store
// =============================================================================

/// Concurrent in-memory backend, the default for a single-process service.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, record: JobRecord) {
        self.jobs.insert(record.id, record);
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> bool {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return false;
        };
        let record = entry.value_mut();

        if record.state.is_terminal() {
            return false;
        }
        if let Some(progress) = update.progress
            && progress < record.progress
        {
            return false;
        }

        if let Some(progress) = update.progress {
            record.progress = progress;
        }
        if let Some(state) = update.state {
            record.state = state;
            if state.is_terminal() {
                record.completed_at = Some(Utc::now());
            }
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        if let Some(result) = update.result {
            record.result = Some(*result);
        }
        record.updated_at = Utc::now();
        true
    }

    async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(&id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Depth;
    use crate::types::{FailureKind, JobConfig};

    fn record() -> JobRecord {
        JobRecord::new(
            JobConfig { depth: Depth::Quick, genre: None, comps: vec![] },
            "deadbeef".into(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryJobStore::new();
        let r = record();
        let id = r.id;
        store.create(r).await;
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.state, JobState::Queued);
        assert_eq!(fetched.progress, 0);
    }

    #[tokio::test]
    async fn test_update_unknown_job_is_refused() {
        let store = InMemoryJobStore::new();
        assert!(!store.update(JobId::new(), JobUpdate::new().progress(10)).await);
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = InMemoryJobStore::new();
        let r = record();
        let id = r.id;
        store.create(r).await;

        assert!(store.update(id, JobUpdate::new().progress(40)).await);
        assert!(!store.update(id, JobUpdate::new().progress(35)).await);
        assert_eq!(store.get(id).await.unwrap().progress, 40);
    }

    #[tokio::test]
    async fn test_terminal_state_absorbs() {
        let store = InMemoryJobStore::new();
        let r = record();
        let id = r.id;
        store.create(r).await;

        assert!(
            store
                .update(id, JobUpdate::new().state(JobState::Failed).error(JobError {
                    kind: FailureKind::Cancelled,
                    message: "job cancelled by caller".into(),
                }))
                .await
        );
        // A late completion write loses the race and reports it
        assert!(
            !store
                .update(id, JobUpdate::new().state(JobState::Completed).progress(100))
                .await
        );
        let after = store.get(id).await.unwrap();
        assert_eq!(after.state, JobState::Failed);
        assert_eq!(after.error.unwrap().kind, FailureKind::Cancelled);
    }

    #[tokio::test]
    async fn test_terminal_write_stamps_completed_at() {
        let store = InMemoryJobStore::new();
        let r = record();
        let id = r.id;
        store.create(r).await;

        store
            .update(id, JobUpdate::new().state(JobState::Completed).progress(100))
            .await;
        let after = store.get(id).await.unwrap();
        assert!(after.completed_at.is_some());
        assert_eq!(after.progress, 100);
    }

    #[tokio::test]
    async fn test_status_view_through_trait() {
        let store = InMemoryJobStore::new();
        let r = record();
        let id = r.id;
        store.create(r).await;
        let view = store.status(id).await.unwrap();
        assert_eq!(view.state, JobState::Queued);
        assert!(view.error_kind.is_none());
    }
}
