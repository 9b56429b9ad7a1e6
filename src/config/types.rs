//! Configuration Types
//!
//! The configuration surface the core consumes: per-depth token budgets,
//! chunking geometry, and the two provider endpoints. Credentials and
//! endpoints are always supplied externally, never hard-coded.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{budget as budget_constants, chunking as chunking_constants};
use crate::types::{CoverageError, Result};

// =============================================================================
// Analysis Depth
// =============================================================================

/// Caller-selected thoroughness tier. Determines the token budget and the
/// request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    Standard,
    Deep,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }

    pub const ALL: [Depth; 3] = [Depth::Quick, Depth::Standard, Depth::Deep];
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Depth Budgets
// =============================================================================

/// Output budget and request timeout for one depth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthBudget {
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

/// Per-depth budget table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthBudgets {
    pub quick: DepthBudget,
    pub standard: DepthBudget,
    pub deep: DepthBudget,
}

impl Default for DepthBudgets {
    fn default() -> Self {
        Self {
            quick: DepthBudget {
                max_output_tokens: budget_constants::output_tokens::QUICK,
                request_timeout_secs: budget_constants::timeout_secs::QUICK,
            },
            standard: DepthBudget {
                max_output_tokens: budget_constants::output_tokens::STANDARD,
                request_timeout_secs: budget_constants::timeout_secs::STANDARD,
            },
            deep: DepthBudget {
                max_output_tokens: budget_constants::output_tokens::DEEP,
                request_timeout_secs: budget_constants::timeout_secs::DEEP,
            },
        }
    }
}

impl DepthBudgets {
    pub fn budget_for(&self, depth: Depth) -> DepthBudget {
        match depth {
            Depth::Quick => self.quick,
            Depth::Standard => self.standard,
            Depth::Deep => self.deep,
        }
    }

    /// A larger output budget must never be given less time to arrive.
    pub fn validate(&self) -> Result<()> {
        let mut tiers: Vec<DepthBudget> = Depth::ALL.iter().map(|d| self.budget_for(*d)).collect();
        tiers.sort_by_key(|b| b.max_output_tokens);
        for pair in tiers.windows(2) {
            if pair[1].request_timeout_secs < pair[0].request_timeout_secs {
                return Err(CoverageError::Config(format!(
                    "request timeout must be non-decreasing in output budget: \
                     {} tokens -> {}s but {} tokens -> {}s",
                    pair[0].max_output_tokens,
                    pair[0].request_timeout_secs,
                    pair[1].max_output_tokens,
                    pair[1].request_timeout_secs,
                )));
            }
        }
        for depth in Depth::ALL {
            let tier = self.budget_for(depth);
            if tier.max_output_tokens == 0 || tier.request_timeout_secs == 0 {
                return Err(CoverageError::Config(format!(
                    "budget for depth {depth} must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Chunking Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Characters per window; documents longer than this are split
    pub max_chunk_chars: usize,
    /// Overlap between adjacent windows
    pub overlap_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: chunking_constants::DEFAULT_MAX_CHUNK_CHARS,
            overlap_chars: chunking_constants::DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<()> {
        // Windows must be larger than the newline-snap slack, or boundary
        // snapping could eat a whole window
        if self.max_chunk_chars <= chunking_constants::BOUNDARY_SLACK_CHARS {
            return Err(CoverageError::Config(format!(
                "max_chunk_chars ({}) must exceed the boundary slack ({})",
                self.max_chunk_chars,
                chunking_constants::BOUNDARY_SLACK_CHARS
            )));
        }
        if self.overlap_chars >= self.max_chunk_chars {
            return Err(CoverageError::Config(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                self.overlap_chars, self.max_chunk_chars
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Provider Settings
// =============================================================================

/// One provider endpoint: `{base_url, api_key, model}`.
///
/// The API key is never serialized back out and is redacted in debug
/// output; each provider converts it to a `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProviderSettings {
    pub fn validate(&self, label: &str) -> Result<()> {
        Url::parse(&self.base_url).map_err(|e| {
            CoverageError::Config(format!("invalid {label} base_url '{}': {e}", self.base_url))
        })?;
        if self.model.is_empty() {
            return Err(CoverageError::Config(format!("{label} model must be set")));
        }
        Ok(())
    }
}

// =============================================================================
// Settings Root
// =============================================================================

/// Full configuration surface consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Primary provider, tried first for every call
    pub primary: ProviderSettings,
    /// Fallback provider, used only on content-policy rejections
    pub fallback: ProviderSettings,
    #[serde(default)]
    pub depths: DepthBudgets,
    #[serde(default)]
    pub chunking: ChunkingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary: ProviderSettings {
                base_url: "https://api.moonshot.ai/v1".to_string(),
                model: "moonshot-v1-128k".to_string(),
                api_key: None,
            },
            fallback: ProviderSettings {
                base_url: "https://api.anthropic.com/v1".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                api_key: None,
            },
            depths: DepthBudgets::default(),
            chunking: ChunkingSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.primary.validate("primary")?;
        self.fallback.validate("fallback")?;
        self.depths.validate()?;
        self.chunking.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn test_timeout_must_scale_with_budget() {
        let mut budgets = DepthBudgets::default();
        // Deep gets a bigger budget but less time than standard
        budgets.deep.request_timeout_secs = 10;
        assert!(budgets.validate().is_err());
    }

    #[test]
    fn test_default_budgets_monotonic() {
        let budgets = DepthBudgets::default();
        budgets.validate().unwrap();
        assert!(budgets.quick.max_output_tokens < budgets.standard.max_output_tokens);
        assert!(budgets.standard.max_output_tokens < budgets.deep.max_output_tokens);
        assert!(budgets.quick.request_timeout_secs <= budgets.standard.request_timeout_secs);
        assert!(budgets.standard.request_timeout_secs <= budgets.deep.request_timeout_secs);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let chunking = ChunkingSettings { max_chunk_chars: 1_000, overlap_chars: 1_000 };
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn test_window_must_exceed_boundary_slack() {
        let chunking = ChunkingSettings { max_chunk_chars: 50, overlap_chars: 0 };
        assert!(chunking.validate().is_err());
        let chunking = ChunkingSettings { max_chunk_chars: 101, overlap_chars: 0 };
        assert!(chunking.validate().is_ok());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut settings = Settings::default();
        settings.primary.base_url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = ProviderSettings {
            base_url: "https://api.moonshot.ai/v1".to_string(),
            model: "moonshot-v1-128k".to_string(),
            api_key: Some("sk-secret".to_string()),
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_depth_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Depth::Quick).unwrap(), "\"quick\"");
        let d: Depth = serde_json::from_str("\"deep\"").unwrap();
        assert_eq!(d, Depth::Deep);
    }
}
