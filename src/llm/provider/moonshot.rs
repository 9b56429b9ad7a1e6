//! Moonshot API Provider (primary)
//!
//! OpenAI-style chat completions against the Moonshot endpoint. The Kimi
//! long-context models are the default primary backend for script analysis.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    ProviderClient, ProviderRequest, ProviderResponse, TokenUsage, build_http_client,
    classify_transport_error, extract_json,
};
use crate::config::ProviderSettings;
use crate::llm::budget::TokenBudget;
use crate::types::{CoverageError, ProviderFailure, Result, classify_http_failure};

const PROVIDER_NAME: &str = "moonshot";

/// Sampling temperature: low, for consistent analysis
const TEMPERATURE: f32 = 0.3;

/// Moonshot provider with secure API key handling.
pub struct MoonshotProvider {
    /// API key stored securely, never exposed in logs or debug output
    api_key: SecretString,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for MoonshotProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoonshotProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl MoonshotProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("MOONSHOT_API_KEY").ok())
            .ok_or_else(|| {
                CoverageError::Config(
                    "Moonshot API key not found. Set MOONSHOT_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            client: build_http_client()?,
        })
    }

    fn build_request(&self, request: &ProviderRequest, budget: &TokenBudget) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: request.system.clone() },
                ChatMessage { role: "user".to_string(), content: request.user.clone() },
            ],
            temperature: TEMPERATURE,
            max_tokens: budget.max_output_tokens,
            response_format: ResponseFormat { format_type: "json_object".to_string() },
        }
    }
}

#[async_trait]
impl ProviderClient for MoonshotProvider {
    async fn submit(
        &self,
        request: &ProviderRequest,
        budget: &TokenBudget,
    ) -> std::result::Result<ProviderResponse, ProviderFailure> {
        debug!(
            model = %self.model,
            max_output_tokens = budget.max_output_tokens,
            timeout_secs = budget.request_timeout.as_secs(),
            "Sending request to Moonshot API"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request, budget);

        let response = self
            .client
            .post(&url)
            .timeout(budget.request_timeout)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(PROVIDER_NAME, budget, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(PROVIDER_NAME, status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderFailure::Provider {
                provider: PROVIDER_NAME.to_string(),
                status: None,
                message: format!("failed to parse response envelope: {e}"),
            }
        })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage { input_tokens: u.prompt_tokens, output_tokens: u.completion_tokens })
            .unwrap_or_default();

        info!(
            provider = PROVIDER_NAME,
            model = %self.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Provider call completed"
        );

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ProviderFailure::Provider {
                provider: PROVIDER_NAME.to_string(),
                status: None,
                message: "no choices in response".to_string(),
            }
        })?;

        // Truncation is checked before any parse attempt
        if choice.finish_reason.as_deref() == Some("length")
            || budget.is_truncated(usage.output_tokens)
        {
            return Err(ProviderFailure::Truncated {
                provider: PROVIDER_NAME.to_string(),
                completion_tokens: usage.output_tokens,
                max_output_tokens: budget.max_output_tokens,
            });
        }

        let content_str = choice.message.content.ok_or_else(|| ProviderFailure::Provider {
            provider: PROVIDER_NAME.to_string(),
            status: None,
            message: "no content in response".to_string(),
        })?;

        let content = extract_json(PROVIDER_NAME, &content_str)?;

        Ok(ProviderResponse { content, usage, model: self.model.clone() })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}
