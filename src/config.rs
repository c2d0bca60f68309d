//! MemoLog configuration management

use crate::error::{Error, Result};
use crate::memo::InsertOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main MemoLog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoLogConfig {
    /// Where storage units live
    #[serde(default)]
    pub storage: StorageConfig,

    /// How memos are written
    #[serde(default)]
    pub format: FormatConfig,

    /// Trash retention
    #[serde(default)]
    pub trash: TrashConfig,

    /// Parsed-list cache
    #[serde(default)]
    pub cache: CacheConfig,
}

impl MemoLogConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.default_unit.trim().is_empty() {
            return Err(Error::Config("storage.default_unit must not be empty".to_string()));
        }
        if self.cache.capacity == 0 {
            return Err(Error::Config("cache.capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding every storage unit
    pub root_dir: PathBuf,

    /// Unit used when a command names none, relative to `root_dir`
    pub default_unit: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            default_unit: "memos.md".to_string(),
        }
    }
}

/// Default root directory (~/.memolog/)
pub fn default_root_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memolog")
}

/// Formatting configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Template for memos without their own, e.g. `"## YYYY-MM-DD HH:mm"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,

    /// Write new memos as unchecked todo items
    pub todo_mode: bool,

    /// Where new memos land in the file
    pub insert_order: InsertOrder,
}

/// Trash configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashConfig {
    /// Days a trashed memo is kept before `purge` removes it
    pub retention_days: u32,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached `(unit, category)` lists
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}
