//! Crate configuration
//!
//! Handles parsing and management of tuplecore.toml configuration files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::GrowStrategy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching tuplecore.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// Buffer memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Parallel dispatch settings
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl CoreConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: CoreConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Find and load configuration by searching up from the given directory.
    /// Returns defaults when no tuplecore.toml exists on the path to root.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join("tuplecore.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Buffer memory settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    /// How owned blocks are resized: "realloc" (default) or
    /// "alloc-copy-free" for allocators where shrink-in-place strands
    /// memory.
    #[serde(default)]
    pub grow_strategy: GrowStrategy,

    /// Write a poison pattern over owned memory before freeing it.
    /// Unset means debug builds only.
    #[serde(default)]
    pub poison_on_free: Option<bool>,
}

impl MemoryConfig {
    pub fn poison_enabled(&self) -> bool {
        self.poison_on_free.unwrap_or(cfg!(debug_assertions))
    }
}

/// Parallel dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Run tasks on the worker pool; false runs every task synchronously in
    /// the submitting thread.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// In-flight bound; 0 means hardware concurrency.
    #[serde(default)]
    pub max_tasks: usize,
}

fn default_true() -> bool {
    true
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tasks: 0,
        }
    }
}
