//! Analysis Pipeline
//!
//! Orchestrates one document analysis end to end: validate the request,
//! resolve the depth budget, build the prompt, run single-shot or chunked
//! depending on document length, and normalize the model output into a
//! `CoverageReport`. The pipeline is stateless; everything per-run lives in
//! the request and the returned outcome.

use tracing::info;

use crate::config::{ChunkingSettings, Depth, DepthBudgets, Settings};
use crate::llm::chunking;
use crate::llm::provider::{AnthropicProvider, MoonshotProvider, ProviderRequest};
use crate::llm::{BuiltPrompt, FallbackSubmitter, SharedProvider, TokenBudget};
use crate::types::{AnalysisOutcome, CoverageError, CoverageReport, Result};
use std::sync::Arc;

// =============================================================================
// Analysis Request
// =============================================================================

/// One analysis request. The document is owned: the pipeline is the only
/// place the raw text lives during a run, and it is dropped with the
/// request when the run ends.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document: String,
    pub depth: Depth,
    pub genre: Option<String>,
    pub comps: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(document: String, depth: Depth) -> Self {
        Self { document, depth, genre: None, comps: Vec::new() }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct AnalysisPipeline {
    submitter: FallbackSubmitter,
    depths: DepthBudgets,
    chunking: ChunkingSettings,
}

impl AnalysisPipeline {
    /// Assemble a pipeline over explicit provider handles. Used directly in
    /// tests; production wiring goes through `from_settings`.
    pub fn new(primary: SharedProvider, fallback: SharedProvider, settings: &Settings) -> Self {
        Self {
            submitter: FallbackSubmitter::new(primary, fallback),
            depths: settings.depths.clone(),
            chunking: settings.chunking,
        }
    }

    /// Build the production provider pair from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let primary: SharedProvider = Arc::new(MoonshotProvider::new(&settings.primary)?);
        let fallback: SharedProvider = Arc::new(AnthropicProvider::new(&settings.fallback)?);
        Ok(Self::new(primary, fallback, settings))
    }

    /// Budget the orchestrator uses to derive the job deadline.
    pub fn budget_for(&self, depth: Depth) -> TokenBudget {
        TokenBudget::for_depth(depth, &self.depths)
    }

    /// Run one analysis to a normalized outcome.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        if request.document.trim().is_empty() {
            return Err(CoverageError::Validation("document is empty".to_string()));
        }

        let budget = self.budget_for(request.depth);
        let prompt = BuiltPrompt::build(request.depth, request.genre.as_deref(), &request.comps);

        let (content, model_used, tokens_consumed) =
            if request.document.len() > self.chunking.max_chunk_chars {
                let outcome = chunking::analyze_windows(
                    &self.submitter,
                    &prompt,
                    &request.document,
                    &budget,
                    &self.chunking,
                )
                .await?;
                (outcome.content, outcome.model, outcome.tokens)
            } else {
                let provider_request =
                    ProviderRequest::new(prompt.system(), prompt.user_message(&request.document));
                let response = self.submitter.submit(&provider_request, &budget).await?;
                (response.content, response.model, response.usage.total())
            };

        let report = CoverageReport::from_raw(&content)?;

        info!(
            depth = %request.depth,
            model = %model_used,
            tokens = tokens_consumed,
            total_score = report.total_score,
            recommendation = %report.recommendation,
            "Analysis complete"
        );

        Ok(AnalysisOutcome { report, model_used, tokens_consumed })
    }
}

// =============================================================================
// Tests
// =============================================================================
