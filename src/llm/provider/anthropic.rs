//! Anthropic API Provider (fallback)
//!
//! Messages API client. Serves requests the primary provider refused on
//! content-policy grounds; its own refusals are classified the same way so
//! the pipeline can surface a final `ContentRejected` when both decline.

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

const PROVIDER_NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const TEMPERATURE: f32 = 0.3;

/// Anthropic provider with secure API key handling.
pub struct AnthropicProvider {
    api_key: SecretString,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                CoverageError::Config(
                    "Anthropic API key not found. Set ANTHROPIC_API_KEY env var or provide in config"
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

    fn build_request(&self, request: &ProviderRequest, budget: &TokenBudget) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: budget.max_output_tokens,
            temperature: TEMPERATURE,
            system: request.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    async fn submit(
        &self,
        request: &ProviderRequest,
        budget: &TokenBudget,
    ) -> std::result::Result<ProviderResponse, ProviderFailure> {
        debug!(
            model = %self.model,
            max_output_tokens = budget.max_output_tokens,
            timeout_secs = budget.request_timeout.as_secs(),
            "Sending request to Anthropic API"
        );

        let url = format!("{}/messages", self.base_url);
        let body = self.build_request(request, budget);

        let response = self
            .client
            .post(&url)
            .timeout(budget.request_timeout)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(PROVIDER_NAME, budget, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(PROVIDER_NAME, status.as_u16(), &body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            ProviderFailure::Provider {
                provider: PROVIDER_NAME.to_string(),
                status: None,
                message: format!("failed to parse response envelope: {e}"),
            }
        })?;

        let usage = TokenUsage {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        };

        info!(
            provider = PROVIDER_NAME,
            model = %self.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Provider call completed"
        );

        match parsed.stop_reason.as_deref() {
            // The whole output budget was consumed; the payload is cut off
            Some("max_tokens") => {
                return Err(ProviderFailure::Truncated {
                    provider: PROVIDER_NAME.to_string(),
                    completion_tokens: usage.output_tokens,
                    max_output_tokens: budget.max_output_tokens,
                });
            }
            // The model itself declined to analyze the input
            Some("refusal") => {
                return Err(ProviderFailure::ContentRejected {
                    provider: PROVIDER_NAME.to_string(),
                    message: "model refused to analyze the input".to_string(),
                });
            }
            _ => {}
        }
        if budget.is_truncated(usage.output_tokens) {
            return Err(ProviderFailure::Truncated {
                provider: PROVIDER_NAME.to_string(),
                completion_tokens: usage.output_tokens,
                max_output_tokens: budget.max_output_tokens,
            });
        }

        let content_str = parsed
            .content
            .iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text.as_deref())
            .ok_or_else(|| ProviderFailure::Provider {
                provider: PROVIDER_NAME.to_string(),
                status: None,
                message: "no text content in response".to_string(),
            })?;

        let content = extract_json(PROVIDER_NAME, content_str)?;

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
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    input_tokens: u32,
    output_tokens: u32,
}
