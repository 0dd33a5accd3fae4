//! Filesystem defaults, loadable from RON.
//!
//! ```ron
//! (
//!     unit_size: 512,
//!     mode: line,
//!     read_only: false,
//! )
//! ```
//!
//! Every field is optional; missing fields keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sequence::{DEFAULT_UNIT_SIZE, SequenceMode};

/// Settings handed to every filesystem a driver connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Unit size for sequences opened without an explicit one.
    pub unit_size: usize,
    /// Mode for sequences opened without an explicit one.
    pub mode: SequenceMode,
    /// Reject every mutation.
    pub read_only: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            unit_size: DEFAULT_UNIT_SIZE,
            mode: SequenceMode::default(),
            read_only: false,
        }
    }
}

impl VfsConfig {
    /// Parse and validate a RON document.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: VfsConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&text)?;
        tracing::debug!("loaded vfs config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_size == 0 {
            return Err(ConfigError::Invalid("unit_size must be positive".into()));
        }
        Ok(())
    }

    pub fn with_unit_size(mut self, unit_size: usize) -> Self {
        self.unit_size = unit_size;
        self
    }

    pub fn with_mode(mut self, mode: SequenceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
