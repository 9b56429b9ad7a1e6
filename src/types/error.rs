//! Unified Error Type System
//!
//! Centralized error types for the analysis core. Provider failures carry a
//! classification that drives the fallback decision: only a content-policy
//! rejection may route a request to the second provider; everything else
//! propagates to the job as a terminal failure.
//!
//! ## Design Principles
//!
//! - Single unified error type (`CoverageError`) for the whole crate
//! - Provider failures classified once, at the provider boundary
//! - Error messages never contain document text; token counts and provider
//!   identity are allowed
//! - No panic/unwrap in non-test code

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Provider Failure Classification
// =============================================================================

/// Classified outcome of a single provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// The provider refused the input on policy/moderation grounds.
    /// This is the only class that triggers fallback to a second provider.
    #[error("[{provider}] content rejected by moderation: {message}")]
    ContentRejected { provider: String, message: String },

    /// The response consumed (nearly) the whole output budget and was cut
    /// off mid-generation. Raised before any parse attempt, because an
    /// incomplete JSON document could otherwise parse to a silently wrong
    /// partial result.
    #[error(
        "[{provider}] response truncated: {completion_tokens} of {max_output_tokens} output tokens"
    )]
    Truncated {
        provider: String,
        completion_tokens: u32,
        max_output_tokens: u32,
    },

    /// The call exceeded the budget-derived request timeout. The underlying
    /// request is cancelled, not merely abandoned.
    #[error("[{provider}] request timed out after {elapsed:?}")]
    Timeout { provider: String, elapsed: Duration },

    /// Any other provider-side error: auth, rate limit, 5xx, malformed body.
    #[error("[{provider}] provider error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },
}

impl ProviderFailure {
    /// Whether this failure may be recovered by retrying on the fallback
    /// provider. Strictly policy rejections; retrying infra failures on a
    /// second provider would double cost without addressing the cause.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::ContentRejected { .. })
    }

    /// Provider that produced the failure, for logging.
    pub fn provider(&self) -> &str {
        match self {
            Self::ContentRejected { provider, .. }
            | Self::Truncated { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Provider { provider, .. } => provider,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ContentRejected { .. } => FailureKind::ContentRejected,
            Self::Truncated { .. } => FailureKind::Truncated,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Provider { .. } => FailureKind::ProviderError,
        }
    }
}

/// Patterns providers use when declining input on policy grounds.
/// Matched case-insensitively against 4xx response bodies.
const MODERATION_PATTERNS: &[&str] = &[
    "high risk",
    "content_filter",
    "content filter",
    "content moderation",
    "rejected by moderation",
    "content policy",
    "flagged",
];

/// Classify a non-success provider response into a failure class.
///
/// Moderation refusals usually arrive as 400-level responses with a policy
/// phrase in the body; everything else stays a plain provider error.
pub fn classify_http_failure(
    provider: &str,
    status: u16,
    body: &str,
) -> ProviderFailure {
    let lower = body.to_lowercase();
    if (400..500).contains(&status)
        && MODERATION_PATTERNS.iter().any(|p| lower.contains(p))
    {
        return ProviderFailure::ContentRejected {
            provider: provider.to_string(),
            message: summarize_body(body),
        };
    }
    ProviderFailure::Provider {
        provider: provider.to_string(),
        status: Some(status),
        message: summarize_body(body),
    }
}

/// Error bodies can be large; keep the first line, bounded. The cut must
/// land on a char boundary since provider bodies are often non-ASCII.
fn summarize_body(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    if line.len() > 300 {
        let mut cut = 300;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &line[..cut])
    } else {
        line.to_string()
    }
}

// =============================================================================
// Job Failure Kinds
// =============================================================================

/// Machine-readable failure kind surfaced on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Both providers refused the input (never surfaced when fallback
    /// succeeds)
    ContentRejected,
    /// The configured output budget was insufficient; not retried
    /// automatically since the same budget would reproduce it
    Truncated,
    /// Provider-side error after one raw attempt
    ProviderError,
    /// The job's wall-clock ceiling fired; in-flight work was cancelled
    Timeout,
    /// The caller explicitly cancelled the job
    Cancelled,
    /// Malformed request or configuration, rejected before any network call
    ValidationError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentRejected => write!(f, "CONTENT_REJECTED"),
            Self::Truncated => write!(f, "TRUNCATED"),
            Self::ProviderError => write!(f, "PROVIDER_ERROR"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::ValidationError => write!(f, "VALIDATION_ERROR"),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoverageError {
    // -------------------------------------------------------------------------
    // Provider / Pipeline Errors
    // -------------------------------------------------------------------------
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderFailure),

    /// The whole pipeline run exceeded its wall-clock ceiling.
    #[error("analysis timed out after {deadline:?}")]
    JobTimeout { deadline: Duration },

    /// The job was cancelled by the caller.
    #[error("job cancelled by caller")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Request / Config Errors
    // -------------------------------------------------------------------------
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Job Store Errors
    // -------------------------------------------------------------------------
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// `fetch_result` called before the job completed.
    #[error("job {0} is not completed yet")]
    NotReady(String),

    // -------------------------------------------------------------------------
    // System Errors
    // -------------------------------------------------------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl CoverageError {
    /// Map onto the machine-readable failure kind recorded on a failed job.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Provider(f) => f.kind(),
            Self::JobTimeout { .. } => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Validation(_) | Self::Config(_) => FailureKind::ValidationError,
            _ => FailureKind::ProviderError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_body_classifies_as_content_rejected() {
        let f = classify_http_failure("moonshot", 400, "High risk content detected");
        assert!(matches!(f, ProviderFailure::ContentRejected { .. }));
        assert!(f.triggers_fallback());
    }

    #[test]
    fn test_content_filter_variant() {
        let f = classify_http_failure("moonshot", 400, r#"{"error":{"type":"content_filter"}}"#);
        assert!(f.triggers_fallback());
    }

    #[test]
    fn test_plain_bad_request_is_provider_error() {
        let f = classify_http_failure("moonshot", 400, "missing field: model");
        assert!(matches!(f, ProviderFailure::Provider { status: Some(400), .. }));
        assert!(!f.triggers_fallback());
    }

    #[test]
    fn test_server_error_is_provider_error() {
        // A 5xx mentioning moderation internals must not trigger fallback
        let f = classify_http_failure("moonshot", 503, "content moderation backend down");
        assert!(!f.triggers_fallback());
        assert_eq!(f.kind(), FailureKind::ProviderError);
    }

    #[test]
    fn test_failure_kind_mapping() {
        let truncated = ProviderFailure::Truncated {
            provider: "moonshot".into(),
            completion_tokens: 7_900,
            max_output_tokens: 8_192,
        };
        assert_eq!(
            CoverageError::Provider(truncated).failure_kind(),
            FailureKind::Truncated
        );
        assert_eq!(
            CoverageError::JobTimeout { deadline: Duration::from_secs(720) }.failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(CoverageError::Cancelled.failure_kind(), FailureKind::Cancelled);
        assert_eq!(
            CoverageError::Validation("empty document".into()).failure_kind(),
            FailureKind::ValidationError
        );
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::ContentRejected.to_string(), "CONTENT_REJECTED");
        assert_eq!(FailureKind::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_multibyte_body_summary_cuts_on_char_boundary() {
        // Moonshot refusals can arrive as Chinese-language bodies; the cut
        // point must not land inside a multibyte char
        let body = format!("x{}", "内容安全审核不通过".repeat(60));
        let f = classify_http_failure("moonshot", 400, &body);
        if let ProviderFailure::Provider { message, .. } = f {
            assert!(message.len() <= 303);
            assert!(message.ends_with("..."));
        } else {
            panic!("expected provider error");
        }
    }

    #[test]
    fn test_body_summary_is_bounded() {
        let long = "x".repeat(2000);
        let f = classify_http_failure("moonshot", 500, &long);
        if let ProviderFailure::Provider { message, .. } = f {
            assert!(message.len() <= 303);
        } else {
            panic!("expected provider error");
        }
    }
}
