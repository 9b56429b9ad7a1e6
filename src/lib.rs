//! Greenlight - Async Script Coverage Analysis Core
//!
//! The orchestration core of an LLM-based script coverage service: a
//! document goes in, a structured coverage report comes out, and everything
//! between runs as a supervised, cancellable background job.
//!
//! ## Core Features
//!
//! - **Depth-Keyed Budgets**: each analysis depth fixes the output-token
//!   ceiling and request timeout in one place
//! - **Provider Fallback**: content-policy rejections, and only those, are
//!   retried once on a second provider
//! - **Truncation Detection**: cut-off responses are failed before parsing,
//!   never silently repaired
//! - **Chunked Analysis**: long documents split into overlapping windows
//!   and merge through a synthesis call
//! - **Supervised Jobs**: wall-clock deadline, synthetic bounded progress,
//!   absorbing terminal states
//!
//! ## Quick Start
//!
//! ```ignore
//! use greenlight::{AnalysisPipeline, AnalysisRequest, InMemoryJobStore, JobOrchestrator};
//! use greenlight::config::{Depth, SettingsLoader};
//! use std::sync::Arc;
//!
//! let settings = SettingsLoader::load()?;
//! let pipeline = Arc::new(AnalysisPipeline::from_settings(&settings)?);
//! let orchestrator = JobOrchestrator::new(Arc::new(InMemoryJobStore::new()), pipeline);
//!
//! let id = orchestrator.submit(AnalysisRequest::new(script, Depth::Standard)).await?;
//! let status = orchestrator.status(id).await?;
//! ```
//!
//! ## Modules
//!
//! - [`llm`]: provider abstraction, budgets, prompts, fallback, chunking
//! - [`pipeline`]: one analysis end to end
//! - [`jobs`]: job store, progress reporter, orchestrator
//! - [`config`]: settings surface and loader
//! - [`types`]: reports, jobs, and the unified error type

pub mod config;
pub mod constants;
pub mod jobs;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Depth, Settings, SettingsLoader};

// Error Types
pub use types::{CoverageError, FailureKind, Result};

// Reports
pub use types::{AnalysisOutcome, CoverageReport, Recommendation};

// Jobs
pub use jobs::{InMemoryJobStore, JobOrchestrator, JobStore};
pub use types::{JobId, JobState, JobStatusView};

// Pipeline
pub use pipeline::{AnalysisPipeline, AnalysisRequest};
