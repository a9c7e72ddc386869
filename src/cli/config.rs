//! TOML configuration file support.
//!
//! Instead of passing flags on every invocation, users can keep settings
//! in a config file:
//!
//! ```toml
//! # specgrid.toml
//! grid = "extended"
//!
//! [storage]
//! dir = "/home/lab/measurements"
//! debounce_ms = 500
//! ```
//!
//! CLI flags override config values, which override built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::schema::GridSchema;

/// Which grid version to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    /// Version-1 grid: duty cycles only.
    Flat,
    /// Version-2 grid: trials and spectrum views.
    Extended,
}

impl GridKind {
    /// Build the schema for this grid version.
    pub fn schema(self) -> GridSchema {
        match self {
            GridKind::Flat => GridSchema::flat(),
            GridKind::Extended => GridSchema::extended(),
        }
    }
}

/// Root configuration structure for specgrid.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Grid version to operate on.
    pub grid: Option<GridKind>,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Configuration for the persistence layer.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted grid files.
    pub dir: Option<PathBuf>,

    /// Debounce window in milliseconds.
    pub debounce_ms: Option<u64>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
