//! Path resolution for evidex configuration and data files.
//!
//! ```text
//! ~/.config/evidex/            # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/evidex/       # Data directory
//! └── conversations.json       # Conversation store
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "evidex";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "conversations.json";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for evidex_core::EvidexError {
    fn from(e: PathError) -> Self {
        evidex_core::EvidexError::config(e.to_string())
    }
}

/// Platform-specific locations (XDG on Linux, the usual places elsewhere).
pub struct EvidexPaths;

impl EvidexPaths {
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Directory for the conversation store.
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Default store location, used when the config does not name one.
    pub fn store_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join(STORE_FILE))
    }
}
