//! Tool configuration module.
//!
//! Handles loading, validating, and merging `image-chain.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Config File Location
//!
//! The CLI looks for `image-chain.toml` in the current directory, or reads the
//! file passed with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [engine]
//! driver = "rust"           # Image-processing backend
//!
//! [workspace]
//! # temp_dir = "/var/tmp/image-chain"   # Omit to use the system temp directory
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [workspace]
//! temp_dir = "/scratch/images"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! A relative `temp_dir` is resolved against the current working directory,
//! not the directory holding the config file.

use crate::engine::RustEngine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filename looked up in a directory by [`load_config`].
pub const CONFIG_FILENAME: &str = "image-chain.toml";

/// Drivers this build can run.
pub const SUPPORTED_DRIVERS: &[&str] = &[RustEngine::DRIVER];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `image-chain.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Image engine selection.
    pub engine: EngineSettings,
    /// Where intermediate artifacts are written.
    pub workspace: WorkspaceSettings,
}

impl ChainConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_DRIVERS.contains(&self.engine.driver.as_str()) {
            return Err(ConfigError::Validation(format!(
                "engine.driver must be one of: {}",
                SUPPORTED_DRIVERS.join(", ")
            )));
        }
        if self
            .workspace
            .temp_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(
                "workspace.temp_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Backend identifier passed to the engine on every call.
    pub driver: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            driver: RustEngine::DRIVER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// Workspace override. `None` keeps the system temp directory. Relative
    /// paths are resolved against the current working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ChainConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn read_raw_config(file: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(file)?;
    Ok(toml::from_str(&content)?)
}

/// Load `image-chain.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    read_raw_config(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ChainConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ChainConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `image-chain.toml` in `dir`, falling back to defaults.
pub fn load_config(dir: &Path) -> Result<ChainConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(dir)?)
}

/// Load config from an explicit file, which must exist.
pub fn load_config_file(file: &Path) -> Result<ChainConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, Some(read_raw_config(file)?))
}

/// Returns a fully-commented stock `image-chain.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-chain Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Image engine
# ---------------------------------------------------------------------------
[engine]
# Image-processing backend. "rust" is the bundled pure-Rust engine.
driver = "rust"

# ---------------------------------------------------------------------------
# Workspace
# ---------------------------------------------------------------------------
[workspace]
# Directory for intermediate artifacts. Created if missing, must be writable.
# Omit to use the system temp directory. A relative path is resolved against
# the current working directory, not this file's directory.
# temp_dir = "/var/tmp/image-chain"
"##
}
