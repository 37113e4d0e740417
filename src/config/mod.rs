//! Configuration management for modhost
//!
//! Handles configuration loading and validation for module roots, candidate
//! scanning and logging.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Module root directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRootsConfig {
    /// Directory holding core modules (processed first)
    #[serde(default = "default_core_dir")]
    pub core_dir: String,

    /// Directory holding API modules
    #[serde(default = "default_api_dir")]
    pub api_dir: String,
}

fn default_core_dir() -> String {
    "modules/core".to_string()
}

fn default_api_dir() -> String {
    "modules/api".to_string()
}

impl Default for ModuleRootsConfig {
    fn default() -> Self {
        Self {
            core_dir: default_core_dir(),
            api_dir: default_api_dir(),
        }
    }
}

impl ModuleRootsConfig {
    /// Core root, resolved against `base` when relative
    pub fn core_path(&self, base: &Path) -> PathBuf {
        base.join(&self.core_dir)
    }

    /// API root, resolved against `base` when relative
    pub fn api_path(&self, base: &Path) -> PathBuf {
        base.join(&self.api_dir)
    }
}

/// Candidate scanning policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extension of a candidate source unit (`<X>/<X>.<ext>`)
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Marker a stripped source unit must begin with
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Sources of this size or smaller are rejected
    #[serde(default = "default_min_source_bytes")]
    pub min_source_bytes: u64,

    /// Sources larger than this are rejected
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
}

fn default_source_extension() -> String {
    "mod".to_string()
}

fn default_marker() -> String {
    "#!modhost".to_string()
}

fn default_min_source_bytes() -> u64 {
    10
}

fn default_max_source_bytes() -> u64 {
    100 * 1024
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            marker: default_marker(),
            min_source_bytes: default_min_source_bytes(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

impl ScanConfig {
    /// Whether a source of `size` bytes is within bounds
    #[inline]
    pub fn accepts_size(&self, size: u64) -> bool {
        size > self.min_source_bytes && size <= self.max_source_bytes
    }

    /// Source file name for a candidate directory named `name`
    pub fn source_file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.source_extension)
    }

    /// Validate scanning policy
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source_extension.is_empty() {
            bail!("scan.source_extension cannot be empty");
        }
        if self.source_extension.contains(['/', '\\', '.']) {
            bail!(
                "scan.source_extension must be a bare extension, got {:?}",
                self.source_extension
            );
        }
        if self.marker.trim().is_empty() {
            bail!("scan.marker cannot be empty");
        }
        if self.min_source_bytes >= self.max_source_bytes {
            bail!(
                "scan.min_source_bytes ({}) must be below scan.max_source_bytes ({})",
                self.min_source_bytes,
                self.max_source_bytes
            );
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "modhost::module=debug"); RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Module roots
    #[serde(default)]
    pub modules: ModuleRootsConfig,

    /// Scanning policy
    #[serde(default)]
    pub scan: ScanConfig,

    /// Logging configuration
    pub logging: Option<LoggingConfig>,
}

impl HostConfig {
    /// Load configuration from a TOML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: HostConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn to_toml_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.modules.core_dir.is_empty() || self.modules.api_dir.is_empty() {
            bail!("module roots cannot be empty");
        }
        self.scan.validate()
    }
}
