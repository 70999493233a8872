//! Configuration service implementation.
//!
//! Loads [`EvidexConfig`] from `~/.config/evidex/config.toml` (or an explicit
//! path) and caches it. A missing file is not an error: every field has a
//! default.

use crate::paths::EvidexPaths;
use anyhow::Context;
use evidex_core::config::EvidexConfig;
use evidex_core::error::{EvidexError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Explicit config location; `None` means the platform default
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<EvidexConfig>>>,
}

impl ConfigService {
    /// Reads from the platform config directory.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Reads from `path` instead of the platform config directory.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the configuration, loading it on first access.
    ///
    /// A file that exists but cannot be parsed is reported as an error and
    /// not cached, so fixing the file and calling again picks it up.
    pub fn get_config(&self) -> Result<EvidexConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let path = self.config_path()?;
        let loaded = Self::load_from(&path)?;

        {
            let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Parses a config file; missing or blank files yield the defaults.
    pub fn load_from(path: &Path) -> Result<EvidexConfig> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(EvidexConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(EvidexConfig::default());
        }

        toml::from_str(&content).map_err(|e| {
            EvidexError::config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Resolves where the store file lives: the configured path or the
    /// platform data directory.
    pub fn store_path(config: &EvidexConfig) -> Result<PathBuf> {
        match &config.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(EvidexPaths::store_file()?),
        }
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(EvidexPaths::config_file()?),
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
