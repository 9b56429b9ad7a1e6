//! Job Orchestrator
//!
//! Owns the job lifecycle: accepts submissions, runs each analysis in a
//! supervised task under a wall-clock deadline, drives progress through the
//! store, and exposes polling reads. The orchestrator is the only writer of
//! job state apart from the progress reporter it spawns; every transition
//! goes through `JobStore::update`, whose absorbing-terminal rule makes the
//! cancel-vs-finish race resolve to exactly one terminal write.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::progress::ProgressReporter;
use super::store::{JobStore, JobUpdate};
use crate::constants::progress as progress_constants;
use crate::pipeline::{AnalysisPipeline, AnalysisRequest};
use crate::types::{
    AnalysisOutcome, CoverageError, JobConfig, JobError, JobId, JobRecord, JobState,
    JobStatusView, Result,
};

pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    pipeline: Arc<AnalysisPipeline>,
    tasks: DashMap<JobId, JoinHandle<()>>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<AnalysisPipeline>) -> Arc<Self> {
        Arc::new(Self { store, pipeline, tasks: DashMap::new() })
    }

    /// Enqueue an analysis and start it immediately. Returns once the job
    /// record exists; the analysis itself runs in a background task.
    ///
    /// Only the document's digest is persisted. The text stays in the
    /// spawned task and is dropped when the run ends.
    pub async fn submit(self: &Arc<Self>, request: AnalysisRequest) -> Result<JobId> {
        if request.document.trim().is_empty() {
            return Err(CoverageError::Validation("document is empty".to_string()));
        }

        let digest = Sha256::digest(request.document.as_bytes());
        let document_sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();

        let record = JobRecord::new(
            JobConfig {
                depth: request.depth,
                genre: request.genre.clone(),
                comps: request.comps.clone(),
            },
            document_sha256,
        );
        let id = record.id;
        self.store.create(record).await;

        info!(job = %id, depth = %request.depth, chars = request.document.len(), "Job submitted");

        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            orchestrator.run_job(id, request).await;
            orchestrator.tasks.remove(&id);
        });
        self.tasks.insert(id, handle);
        // The task may have finished before its handle was registered
        let finished = self.tasks.get(&id).is_some_and(|h| h.is_finished());
        if finished {
            self.tasks.remove(&id);
        }

        Ok(id)
    }

    async fn run_job(&self, id: JobId, request: AnalysisRequest) {
        let deadline = self.pipeline.budget_for(request.depth).job_deadline();

        self.store
            .update(
                id,
                JobUpdate::new()
                    .state(JobState::Processing)
                    .progress(progress_constants::PROCESSING_START),
            )
            .await;

        let reporter =
            tokio::spawn(ProgressReporter::new(Arc::clone(&self.store), id).run());

        let outcome = tokio::time::timeout(deadline, self.pipeline.analyze(&request)).await;
        reporter.abort();

        match outcome {
            Ok(Ok(outcome)) => self.complete(id, outcome).await,
            Ok(Err(error)) => self.fail(id, &error).await,
            Err(_) => {
                self.fail(id, &CoverageError::JobTimeout { deadline }).await;
            }
        }
    }

    async fn complete(&self, id: JobId, outcome: AnalysisOutcome) {
        self.store
            .update(id, JobUpdate::new().progress(progress_constants::RESULT_PERSISTING))
            .await;

        let applied = self
            .store
            .update(
                id,
                JobUpdate::new()
                    .state(JobState::Completed)
                    .progress(progress_constants::DONE)
                    .result(outcome),
            )
            .await;
        if applied {
            info!(job = %id, "Job completed");
        } else {
            // Lost the race to a cancel; the result is discarded
            debug!(job = %id, "Completion write refused, job already terminal");
        }
    }

    async fn fail(&self, id: JobId, error: &CoverageError) {
        warn!(job = %id, kind = %error.failure_kind(), error = %error, "Job failed");
        let applied = self
            .store
            .update(
                id,
                JobUpdate::new().state(JobState::Failed).error(JobError {
                    kind: error.failure_kind(),
                    message: error.to_string(),
                }),
            )
            .await;
        if !applied {
            debug!(job = %id, "Failure write refused, job already terminal");
        }
    }

    /// Cancel a running job: abort its task and record the terminal state.
    /// Cancelling a job that already finished is a no-op.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        if self.store.get(id).await.is_none() {
            return Err(CoverageError::JobNotFound(id.to_string()));
        }

        if let Some((_, handle)) = self.tasks.remove(&id) {
            handle.abort();
        }

        let applied = self
            .store
            .update(
                id,
                JobUpdate::new().state(JobState::Failed).error(JobError {
                    kind: CoverageError::Cancelled.failure_kind(),
                    message: CoverageError::Cancelled.to_string(),
                }),
            )
            .await;
        if applied {
            info!(job = %id, "Job cancelled");
        }
        Ok(())
    }

    /// Read-only status snapshot for polling clients.
    pub async fn status(&self, id: JobId) -> Result<JobStatusView> {
        self.store
            .status(id)
            .await
            .ok_or_else(|| CoverageError::JobNotFound(id.to_string()))
    }

    /// Fetch the completed result. Errors until the job reaches Completed.
    pub async fn fetch_result(&self, id: JobId) -> Result<AnalysisOutcome> {
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| CoverageError::JobNotFound(id.to_string()))?;
        if record.state != JobState::Completed {
            return Err(CoverageError::NotReady(id.to_string()));
        }
        record
            .result
            .ok_or_else(|| CoverageError::NotReady(id.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Depth, Settings};
    use crate::jobs::store::InMemoryJobStore;
    use crate::llm::TokenBudget;
    use crate::llm::provider::{
        ProviderClient, ProviderRequest, ProviderResponse, SharedProvider, TokenUsage,
    };
    use crate::types::{FailureKind, ProviderFailure};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    enum Behavior {
        Succeed,
        Hang,
    }

    struct MockProvider {
        behavior: Behavior,
    }

    #[async_trait]
    impl ProviderClient for MockProvider {
        async fn submit(
            &self,
            _request: &ProviderRequest,
            _budget: &TokenBudget,
        ) -> std::result::Result<ProviderResponse, ProviderFailure> {
            match self.behavior {
                Behavior::Succeed => Ok(ProviderResponse {
                    content: json!({
                        "logline": "A fixer takes one last case.",
                        "synopsis": "Setup, complication, cliffhanger.",
                        "overall_comments": "Strong pilot.",
                        "strengths": ["momentum"],
                        "weaknesses": ["thin antagonist"],
                        "subscores": {
                            "concept": 8, "character": 7, "structure": 8,
                            "dialogue": 8, "market": 8
                        }
                    }),
                    usage: TokenUsage { input_tokens: 800, output_tokens: 350 },
                    model: "primary-model".to_string(),
                }),
                Behavior::Hang => std::future::pending().await,
            }
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    fn orchestrator(behavior: Behavior) -> (Arc<JobOrchestrator>, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let provider: SharedProvider = Arc::new(MockProvider { behavior });
        let pipeline = Arc::new(AnalysisPipeline::new(
            provider.clone(),
            provider,
            &Settings::default(),
        ));
        (JobOrchestrator::new(store.clone(), pipeline), store)
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            "INT. WAREHOUSE - NIGHT\nThe fixer checks the lock twice.\n".repeat(10),
            Depth::Quick,
        )
    }

    async fn wait_terminal(orch: &Arc<JobOrchestrator>, id: JobId) -> JobStatusView {
        loop {
            let view = orch.status(id).await.unwrap();
            if view.state.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_completes_with_result() {
        let (orch, _store) = orchestrator(Behavior::Succeed);
        let id = orch.submit(request()).await.unwrap();

        let view = wait_terminal(&orch, id).await;
        assert_eq!(view.state, JobState::Completed);
        assert_eq!(view.progress, 100);
        assert!(view.error_kind.is_none());

        let outcome = orch.fetch_result(id).await.unwrap();
        assert_eq!(outcome.model_used, "primary-model");
        assert_eq!(outcome.report.total_score, 39);
    }

    #[tokio::test]
    async fn test_empty_document_rejected_at_submit() {
        let (orch, store) = orchestrator(Behavior::Succeed);
        let err = orch
            .submit(AnalysisRequest::new("  \n ".to_string(), Depth::Quick))
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::ValidationError);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_digest_recorded_not_text() {
        let (orch, store) = orchestrator(Behavior::Succeed);
        let req = request();
        let id = orch.submit(req).await.unwrap();

        let record = store.get(id).await.unwrap();
        assert_eq!(record.document_sha256.len(), 64);
        assert!(record.document_sha256.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run() {
        let (orch, _store) = orchestrator(Behavior::Hang);
        let id = orch.submit(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        orch.cancel(id).await.unwrap();

        let view = orch.status(id).await.unwrap();
        assert_eq!(view.state, JobState::Failed);
        assert_eq!(view.error_kind, Some(FailureKind::Cancelled));
        assert!(matches!(
            orch.fetch_result(id).await.unwrap_err(),
            CoverageError::NotReady(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_completion_is_a_noop() {
        let (orch, _store) = orchestrator(Behavior::Succeed);
        let id = orch.submit(request()).await.unwrap();
        wait_terminal(&orch, id).await;

        orch.cancel(id).await.unwrap();

        let view = orch.status(id).await.unwrap();
        assert_eq!(view.state, JobState::Completed);
        assert!(orch.fetch_result(id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_deadline_fails_the_job() {
        let (orch, _store) = orchestrator(Behavior::Hang);
        let id = orch.submit(request()).await.unwrap();

        let view = wait_terminal(&orch, id).await;
        assert_eq!(view.state, JobState::Failed);
        assert_eq!(view.error_kind, Some(FailureKind::Timeout));
        // Reporter never pushed past its ceiling
        assert!(view.progress <= progress_constants::REPORTER_CEILING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotone_until_done() {
        let (orch, _store) = orchestrator(Behavior::Hang);
        let id = orch.submit(request()).await.unwrap();

        let mut last = 0;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let view = orch.status(id).await.unwrap();
            assert!(view.progress >= last, "progress regressed: {last} -> {}", view.progress);
            last = view.progress;
            if view.state.is_terminal() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_job_reads_fail() {
        let (orch, _store) = orchestrator(Behavior::Succeed);
        let id = JobId::new();
        assert!(matches!(
            orch.status(id).await.unwrap_err(),
            CoverageError::JobNotFound(_)
        ));
        assert!(matches!(
            orch.cancel(id).await.unwrap_err(),
            CoverageError::JobNotFound(_)
        ));
    }
}
