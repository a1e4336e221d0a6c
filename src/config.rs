//! Vault configuration module.
//!
//! Handles loading, validating, and merging `vault.toml`. The file is sparse:
//! stock defaults are the base layer and the user's file only overrides the
//! keys it names. The resolved [`VaultConfig`] is passed explicitly into
//! [`Vault`](crate::vault::Vault); nothing reads configuration from global
//! state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! storage_root = "uploads"        # Root directory for image artifacts
//! database = "image-vault.db"     # SQLite ledger file
//! log_level = "info"              # Used when RUST_LOG is not set
//!
//! [uploads]
//! allowed_extensions = ["jpeg", "jpg", "png"]   # Case-insensitive
//!
//! [rendition]
//! thumbnail_max_edge = 150        # Longest thumbnail side, in pixels
//! quality = 90                    # JPEG quality (1-100)
//! brightness_factor = 1.5         # Multiplier for the brightness edit
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, RenditionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "vault.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Vault configuration loaded from `vault.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Root directory of the artifact store.
    pub storage_root: PathBuf,
    /// Path to the SQLite ledger.
    pub database: PathBuf,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Upload validation settings.
    pub uploads: UploadsConfig,
    /// Encoding settings for processed images and thumbnails.
    pub rendition: RenditionSettings,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("uploads"),
            database: PathBuf::from("image-vault.db"),
            log_level: "info".to_string(),
            uploads: UploadsConfig::default(),
            rendition: RenditionSettings::default(),
        }
    }
}

impl VaultConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rendition.quality == 0 || self.rendition.quality > 100 {
            return Err(ConfigError::Validation(
                "rendition.quality must be 1-100".into(),
            ));
        }
        if self.rendition.thumbnail_max_edge == 0 {
            return Err(ConfigError::Validation(
                "rendition.thumbnail_max_edge must be non-zero".into(),
            ));
        }
        if !self.rendition.brightness_factor.is_finite() || self.rendition.brightness_factor <= 0.0
        {
            return Err(ConfigError::Validation(
                "rendition.brightness_factor must be a positive number".into(),
            ));
        }
        if self.uploads.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "uploads.allowed_extensions must not be empty".into(),
            ));
        }
        if self
            .uploads
            .allowed_extensions
            .iter()
            .any(|ext| ext.is_empty() || ext.contains('.'))
        {
            return Err(ConfigError::Validation(
                "uploads.allowed_extensions entries must be bare extensions like \"png\"".into(),
            ));
        }
        Ok(())
    }

    /// The encoding knobs in the form the transform engine takes.
    pub fn rendition_config(&self) -> RenditionConfig {
        RenditionConfig {
            quality: Quality::new(self.rendition.quality),
            thumbnail_max_edge: self.rendition.thumbnail_max_edge,
            brightness_factor: self.rendition.brightness_factor,
        }
    }
}

/// Upload validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Extensions accepted for upload, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["jpeg".into(), "jpg".into(), "png".into()],
        }
    }
}

/// Encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenditionSettings {
    pub thumbnail_max_edge: u32,
    pub quality: u32,
    pub brightness_factor: f32,
}

impl Default for RenditionSettings {
    fn default() -> Self {
        let defaults = RenditionConfig::default();
        Self {
            thumbnail_max_edge: defaults.thumbnail_max_edge,
            quality: defaults.quality.value(),
            brightness_factor: defaults.brightness_factor,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(VaultConfig::default()).expect("default config must serialize")
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<VaultConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: VaultConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a `vault.toml` file, falling back to stock defaults when
/// the file is absent.
pub fn load_config(path: &Path) -> Result<VaultConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `vault.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-vault configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Root directory holding every image's artifacts:
#   <storage_root>/<filename>/<version_id>/<version_id>.jpeg
storage_root = "uploads"

# SQLite file recording images and their version chains.
database = "image-vault.db"

# Log filter used when RUST_LOG is not set (error, warn, info, debug, trace).
log_level = "info"

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[uploads]
# Accepted upload extensions, compared case-insensitively.
allowed_extensions = ["jpeg", "jpg", "png"]

# ---------------------------------------------------------------------------
# Renditions
# ---------------------------------------------------------------------------
[rendition]
# Longest side of a thumbnail in pixels. Smaller images are not upscaled.
thumbnail_max_edge = 150

# JPEG quality for processed images and thumbnails (1 = worst, 100 = best).
quality = 90

# Multiplier applied to every channel by the "brightness" edit.
brightness_factor = 1.5
"##
}
