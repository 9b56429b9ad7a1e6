//! Job Layer
//!
//! Submission, supervision, and polling of analysis jobs: the store that
//! holds records and enforces the state-machine invariants, the synthetic
//! progress reporter, and the orchestrator tying them to the pipeline.

pub mod orchestrator;
pub mod progress;
pub mod store;

pub use orchestrator::JobOrchestrator;
pub use progress::ProgressReporter;
pub use store::{InMemoryJobStore, JobStore, JobUpdate};
