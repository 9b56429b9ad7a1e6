//! Core domain types: jobs, reports, and the unified error type.

pub mod error;
pub mod job;
pub mod report;

pub use error::{
    CoverageError, FailureKind, ProviderFailure, Result, classify_http_failure,
};
pub use job::{JobConfig, JobError, JobId, JobRecord, JobState, JobStatusView};
pub use report::{
    AnalysisOutcome, CoverageReport, EvidenceQuote, Recommendation, SubScore, SubScores,
};
