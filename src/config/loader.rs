//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources:
//! 1. Built-in defaults (Serialized)
//! 2. A TOML file, when one is supplied
//! 3. Environment variables (GREENLIGHT_* prefix, `__` as the path
//!    separator so field names may contain underscores)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::Path;
use tracing::debug;

use super::types::Settings;
use crate::types::{CoverageError, Result};

const ENV_PREFIX: &str = "GREENLIGHT_";

/// Configuration loader
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load configuration from defaults and the environment only.
    pub fn load() -> Result<Settings> {
        Self::figment(None).extract::<Settings>().map_err(config_err)?.validated()
    }

    /// Load configuration with a TOML file merged between defaults and env.
    pub fn load_from_file(path: &Path) -> Result<Settings> {
        debug!(path = %path.display(), "Loading settings file");
        Self::figment(Some(path)).extract::<Settings>().map_err(config_err)?.validated()
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
    }
}

fn config_err(e: figment::Error) -> CoverageError {
    CoverageError::Config(format!("configuration error: {e}"))
}

trait Validated: Sized {
    fn validated(self) -> Result<Self>;
}

impl Validated for Settings {
    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}
