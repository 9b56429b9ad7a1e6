//! Job Entity
//!
//! The unit of orchestration. A job record is created at submission, mutated
//! only by the orchestrator (single-writer invariant), and reaches exactly
//! one of two absorbing terminal states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Depth;
use crate::types::error::FailureKind;
use crate::types::report::AnalysisOutcome;

// =============================================================================
// Job Id
// =============================================================================

/// Opaque unique job identifier, created at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Job State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Terminal states are absorbing; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Job Config Snapshot
// =============================================================================

/// Immutable copy of the request parameters captured at enqueue time,
/// kept for retry and audit. The document itself is never stored; only
/// its digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub depth: Depth,
    pub genre: Option<String>,
    pub comps: Vec<String>,
}

// =============================================================================
// Job Record
// =============================================================================

/// Persisted job state, keyed by id in the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    /// 0..=100, monotonically non-decreasing while Processing, frozen once
    /// terminal
    pub progress: u8,
    /// Present only when state is Failed
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub config: JobConfig,
    /// SHA-256 of the document text, hex-encoded. The text itself is held
    /// in memory only for the duration of the analysis.
    pub document_sha256: String,
    /// Present only when state is Completed
    pub result: Option<AnalysisOutcome>,
}

/// Typed error recorded on a failed job. The message may reference token
/// counts and provider identity, never source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl JobRecord {
    pub fn new(config: JobConfig, document_sha256: String) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            state: JobState::Queued,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            config,
            document_sha256,
            result: None,
        }
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            state: self.state,
            progress: self.progress,
            error_kind: self.error.as_ref().map(|e| e.kind),
            error_message: self.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

// =============================================================================
// Status View
// =============================================================================

/// Read-only snapshot returned to polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub state: JobState,
    pub progress: u8,
    pub error_kind: Option<FailureKind>,
    pub error_message: Option<String>,
}
