//! Configuration: depth tiers, token budgets, chunking geometry, and
//! provider endpoints.

mod loader;
mod types;

pub use loader::SettingsLoader;
pub use types::{
    ChunkingSettings, Depth, DepthBudget, DepthBudgets, ProviderSettings, Settings,
};
