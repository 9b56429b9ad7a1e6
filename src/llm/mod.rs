//! LLM Layer
//!
//! Everything between the pipeline and the model APIs: depth-keyed token
//! budgets, prompt assembly, the provider trait with its two backends, the
//! content-rejection fallback policy, and chunked analysis of long
//! documents.

pub mod budget;
pub mod chunking;
pub mod fallback;
pub mod prompt;
pub mod provider;

pub use budget::TokenBudget;
pub use fallback::FallbackSubmitter;
pub use prompt::BuiltPrompt;
pub use provider::{
    AnthropicProvider, MoonshotProvider, ProviderClient, ProviderRequest, ProviderResponse,
    SharedProvider, TokenUsage,
};
