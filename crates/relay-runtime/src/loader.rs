//! Config file discovery and loading.
//!
//! Unlike the plugin sections themselves, which [`PipelineConfig`] decodes
//! into typed makers, this only locates a config document and expands its
//! `%ENV[NAME]` tokens — the TOML itself stays a string until
//! [`crate::config::PipelineConfig::preload_from_str`] takes it.
//!
//! [`PipelineConfig`]: crate::config::PipelineConfig

use relay_core::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_NAMES: &[&str] = &["relay.toml", "hekad.toml", "config.toml", ".relay.toml"];

/// Locates and reads a config document, expanding it along the way.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.add_search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.add_search_path(dir.join("relay")),
            None => self,
        }
    }

    /// Finds the first config file on the search path and returns its
    /// env-expanded contents. `Ok(None)` if no search path holds one.
    pub fn load(&self) -> PipelineResult<Option<String>> {
        match self.find_config_file() {
            Some(path) => self.load_from_file(&path).map(Some),
            None => {
                info!("no configuration file found on search path");
                Ok(None)
            }
        }
    }

    /// Reads and expands a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> PipelineResult<String> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::InvalidConfig(format!("{}: {e}", path.display())))?;
        relay_config::expand_env(&content)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!(path = %path.display(), "checking for configuration file");
                if path.exists() {
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}
