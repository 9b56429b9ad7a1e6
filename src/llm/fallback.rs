//! Provider Fallback
//!
//! The single choke point for the two-provider policy: every completion
//! call in the pipeline, single-shot, per-window, or synthesis, goes
//! through `FallbackSubmitter`. A content-policy rejection from the primary
//! is retried once on the fallback provider; any other failure propagates
//! untouched, since retrying infrastructure failures on a second provider
//! doubles cost without addressing the cause.

use tracing::warn;

use super::budget::TokenBudget;
use super::provider::{ProviderRequest, ProviderResponse, SharedProvider};
use crate::types::ProviderFailure;

pub struct FallbackSubmitter {
    primary: SharedProvider,
    fallback: SharedProvider,
}

impl FallbackSubmitter {
    pub fn new(primary: SharedProvider, fallback: SharedProvider) -> Self {
        Self { primary, fallback }
    }

    /// One completion call with the content-rejection fallback applied.
    pub async fn submit(
        &self,
        request: &ProviderRequest,
        budget: &TokenBudget,
    ) -> Result<ProviderResponse, ProviderFailure> {
        match self.primary.submit(request, budget).await {
            Ok(response) => Ok(response),
            Err(failure) if failure.triggers_fallback() => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %failure,
                    "Primary provider rejected content, falling back"
                );
                self.fallback.submit(request, budget).await
            }
            Err(failure) => Err(failure),
        }
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{ProviderClient, TokenUsage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    pub(crate) struct StubProvider {
        name: String,
        model: String,
        outcome: StubOutcome,
        pub calls: AtomicU32,
    }

    pub(crate) enum StubOutcome {
        Succeed,
        Reject,
        Fail,
    }

    impl StubProvider {
        pub fn new(name: &str, outcome: StubOutcome) -> Self {
            Self {
                name: name.to_string(),
                model: format!("{name}-model"),
                outcome,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderClient for StubProvider {
        async fn submit(
            &self,
            _request: &ProviderRequest,
            _budget: &TokenBudget,
        ) -> Result<ProviderResponse, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                StubOutcome::Succeed => Ok(ProviderResponse {
                    content: json!({"served_by": self.name}),
                    usage: TokenUsage { input_tokens: 10, output_tokens: 5 },
                    model: self.model.clone(),
                }),
                StubOutcome::Reject => Err(ProviderFailure::ContentRejected {
                    provider: self.name.clone(),
                    message: "high risk content".to_string(),
                }),
                StubOutcome::Fail => Err(ProviderFailure::Provider {
                    provider: self.name.clone(),
                    status: Some(500),
                    message: "internal error".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            &self.model
        }
    }

    fn budget() -> TokenBudget {
        TokenBudget {
            max_output_tokens: 1_000,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_primary_success_never_touches_fallback() {
        let fallback = Arc::new(StubProvider::new("fallback", StubOutcome::Succeed));
        let submitter = FallbackSubmitter::new(
            Arc::new(StubProvider::new("primary", StubOutcome::Succeed)),
            fallback.clone(),
        );
        let response = submitter
            .submit(&ProviderRequest::new("s", "u"), &budget())
            .await
            .unwrap();
        assert_eq!(response.model, "primary-model");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejection_falls_back_once() {
        let submitter = FallbackSubmitter::new(
            Arc::new(StubProvider::new("primary", StubOutcome::Reject)),
            Arc::new(StubProvider::new("fallback", StubOutcome::Succeed)),
        );
        let response = submitter
            .submit(&ProviderRequest::new("s", "u"), &budget())
            .await
            .unwrap();
        assert_eq!(response.model, "fallback-model");
    }

    #[tokio::test]
    async fn test_infra_failure_does_not_fall_back() {
        let fallback = Arc::new(StubProvider::new("fallback", StubOutcome::Succeed));
        let submitter = FallbackSubmitter::new(
            Arc::new(StubProvider::new("primary", StubOutcome::Fail)),
            fallback.clone(),
        );
        let err = submitter
            .submit(&ProviderRequest::new("s", "u"), &budget())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Provider { .. }));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_failure_surfaces_as_its_own_kind() {
        let submitter = FallbackSubmitter::new(
            Arc::new(StubProvider::new("primary", StubOutcome::Reject)),
            Arc::new(StubProvider::new("fallback", StubOutcome::Fail)),
        );
        let err = submitter
            .submit(&ProviderRequest::new("s", "u"), &budget())
            .await
            .unwrap_err();
        // The surfaced kind is the fallback's failure, not ContentRejected
        assert!(matches!(err, ProviderFailure::Provider { .. }));
    }
}
