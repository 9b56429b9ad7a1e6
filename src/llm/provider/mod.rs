//! LLM Provider Abstraction
//!
//! Defines the `ProviderClient` trait: one completion call under a
//! `TokenBudget`, returning a parsed structured result or a classified
//! failure. All providers report token usage for cost accounting and never
//! log document content.
//!
//! ## Variants
//!
//! - `moonshot`: primary provider (OpenAI-style chat completions)
//! - `anthropic`: fallback provider (Messages API), used only when the
//!   primary rejects input on policy grounds

mod anthropic;
mod moonshot;

pub use anthropic::AnthropicProvider;
pub use moonshot::MoonshotProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::llm::budget::TokenBudget;
use crate::types::{CoverageError, ProviderFailure, Result};

// =============================================================================
// Request / Response
// =============================================================================

/// One fully-assembled chat request: role context plus user payload.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system: String,
    pub user: String,
}

impl ProviderRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into() }
    }
}

/// Token usage metrics for cost accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Parsed result of one successful provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Structured JSON content
    pub content: Value,
    pub usage: TokenUsage,
    /// Model identity that served the call
    pub model: String,
}

// =============================================================================
// Provider Trait
// =============================================================================

/// One LLM backend. `submit` performs exactly one completion call; retry
/// and fallback policy live in the pipeline, not here.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Perform one completion call under the given budget.
    ///
    /// Implementations must classify failures (`ContentRejected` vs
    /// `Truncated` vs `Timeout` vs `Provider`) and must detect truncation
    /// before attempting to parse, because a cut-off JSON payload could
    /// otherwise parse to a silently wrong partial result.
    async fn submit(
        &self,
        request: &ProviderRequest,
        budget: &TokenBudget,
    ) -> std::result::Result<ProviderResponse, ProviderFailure>;

    /// Provider name for logging and `model_used` attribution
    fn name(&self) -> &str;

    /// Model currently in use
    fn model(&self) -> &str;
}

/// Shared provider handle for concurrent use across jobs.
pub type SharedProvider = Arc<dyn ProviderClient>;

// =============================================================================
// Shared helpers
// =============================================================================

/// Build the HTTP client a provider uses. The connect timeout is fixed;
/// per-request timeouts come from the token budget so dropping the request
/// future cancels the in-flight call.
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
        .build()
        .map_err(|e| CoverageError::Http(format!("failed to build HTTP client: {e}")))
}

/// Extract a JSON object from model output, tolerating markdown fences.
///
/// Deliberately performs no structural repair: a payload that does not
/// parse as-is is reported as a provider failure so truncated or mangled
/// output is never silently patched into a wrong result.
pub(crate) fn extract_json(provider: &str, content: &str) -> std::result::Result<Value, ProviderFailure> {
    let trimmed = content.trim();
    let candidate = strip_code_fence(trimmed).unwrap_or(trimmed);
    serde_json::from_str(candidate).map_err(|e| ProviderFailure::Provider {
        provider: provider.to_string(),
        status: None,
        message: format!("response was not valid JSON: {e}"),
    })
}

fn strip_code_fence(s: &str) -> Option<&str> {
    let rest = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))?;
    rest.strip_suffix("```").map(str::trim)
}

/// Map a transport error from one request into a classified failure.
pub(crate) fn classify_transport_error(
    provider: &str,
    budget: &TokenBudget,
    err: &reqwest::Error,
) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout {
            provider: provider.to_string(),
            elapsed: budget.request_timeout,
        }
    } else {
        ProviderFailure::Provider {
            provider: provider.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json("test", r#"{"logline": "a"}"#).unwrap();
        assert_eq!(value, json!({"logline": "a"}));
    }

    #[test]
    fn test_extract_fenced_json() {
        let value = extract_json("test", "```json\n{\"score\": 7}\n```").unwrap();
        assert_eq!(value, json!({"score": 7}));
    }

    #[test]
    fn test_extract_bare_fence() {
        let value = extract_json("test", "```\n{\"score\": 7}\n```").unwrap();
        assert_eq!(value, json!({"score": 7}));
    }

    #[test]
    fn test_cut_off_json_is_a_failure_not_a_repair() {
        // An incomplete object must surface as a failure
        let result = extract_json("test", r#"{"logline": "a", "synopsis": "b"#);
        assert!(matches!(result, Err(ProviderFailure::Provider { .. })));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage { input_tokens: 100, output_tokens: 50 };
        assert_eq!(usage.total(), 150);
    }
}
