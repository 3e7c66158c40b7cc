//! Pipeline configuration.
//!
//! Handles loading and validating `pipeline.toml`. Stock defaults are the
//! base layer; a user file overrides just the keys it names. CLI flags
//! override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! raw_dir = "pipeline_artifacts/raw"             # Camera originals
//! converted_dir = "pipeline_artifacts/converted" # Web variants + metadata sidecars
//! collections_dir = "src/data/collections"       # Collection YAML files
//!
//! [encoding]
//! quality = 85              # Lossy quality (1-100)
//! effort = 7                # Encoder effort (0 = fastest, 9 = smallest)
//! subsample_mode = "auto"   # Chroma subsampling: auto, on, off
//! strip_metadata = true     # Keep only the ICC profile in outputs
//! sharpen = true            # Mild unsharp mask after downsampling
//! format = "avif"           # avif, webp, jpeg, png
//!
//! [sizes]
//! thumbnail = 350           # Grid thumbnails
//! collection = 700          # Collection pages
//! display = 1400            # Full view
//! responsive = false        # Also emit 400w, 800w, 1600w
//!
//! [collection]
//! base_url = "/photos"      # URL prefix of the converted variants
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [collection]
//! base_url = "https://cdn.example.com/photos"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::collection::{DEFAULT_BASE_URL, DEFAULT_COLLECTIONS_DIR};
use crate::imaging::{
    ChromaSubsampling, Effort, EncodeSettings, OutputFormat, Quality, SizePlan,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "pipeline.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `pipeline.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Working directories.
    pub paths: PathsConfig,
    /// Encoder settings.
    pub encoding: EncodingConfig,
    /// Variant widths.
    pub sizes: SizesConfig,
    /// Collection descriptor settings.
    pub collection: CollectionConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        if self.encoding.effort > 9 {
            return Err(ConfigError::Validation(
                "encoding.effort must be 0-9".into(),
            ));
        }
        for (key, width) in [
            ("thumbnail", self.sizes.thumbnail),
            ("collection", self.sizes.collection),
            ("display", self.sizes.display),
        ] {
            if width == 0 {
                return Err(ConfigError::Validation(format!(
                    "sizes.{key} must be non-zero"
                )));
            }
        }
        if self.collection.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "collection.base_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub collections_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("pipeline_artifacts/raw"),
            converted_dir: PathBuf::from("pipeline_artifacts/converted"),
            collections_dir: PathBuf::from(DEFAULT_COLLECTIONS_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub quality: u32,
    pub effort: u8,
    pub subsample_mode: ChromaSubsampling,
    pub strip_metadata: bool,
    pub sharpen: bool,
    pub format: OutputFormat,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let settings = EncodeSettings::default();
        Self {
            quality: settings.quality.value(),
            effort: settings.effort.value(),
            subsample_mode: settings.subsampling,
            strip_metadata: settings.strip_metadata,
            sharpen: settings.sharpen,
            format: OutputFormat::default(),
        }
    }
}

impl EncodingConfig {
    pub fn settings(&self) -> EncodeSettings {
        EncodeSettings {
            quality: Quality::new(self.quality),
            effort: Effort::new(self.effort),
            subsampling: self.subsample_mode,
            strip_metadata: self.strip_metadata,
            sharpen: self.sharpen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizesConfig {
    pub thumbnail: u32,
    pub collection: u32,
    pub display: u32,
    /// Also emit the 400w/800w/1600w variants.
    pub responsive: bool,
}

impl Default for SizesConfig {
    fn default() -> Self {
        let plan = SizePlan::default();
        Self {
            thumbnail: plan.width("thumbnail").unwrap_or(350),
            collection: plan.width("collection").unwrap_or(700),
            display: plan.width("display").unwrap_or(1400),
            responsive: false,
        }
    }
}

impl SizesConfig {
    pub fn plan(&self) -> SizePlan {
        SizePlan::empty()
            .with("thumbnail", self.thumbnail)
            .with("collection", self.collection)
            .with("display", self.display)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    pub base_url: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Returns the stock defaults as a `toml::Value::Table`.
///
/// Parsed from [`stock_config_toml`], so the documented file and the base
/// layer of every merge cannot drift apart.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::from_str(stock_config_toml())?)
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
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        log::debug!("No config at {}, using stock defaults", path.display());
    }
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `pipeline.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# filmstrip configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# CLI flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Working directories
# ---------------------------------------------------------------------------
[paths]
# Camera originals (DNG, CR2, NEF, ARW, JPEG, ...).
raw_dir = "pipeline_artifacts/raw"
# Web variants and {stem}-metadata.json sidecars.
converted_dir = "pipeline_artifacts/converted"
# Collection YAML files consumed by the gallery site.
collections_dir = "src/data/collections"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Lossy quality, 1-100.
quality = 85
# Encoder effort, 0 (fastest) to 9 (smallest files).
effort = 7
# Chroma subsampling: "auto" (on below quality 90), "on", "off".
subsample_mode = "auto"
# Keep only the ICC profile in outputs. false also embeds camera and exposure EXIF.
strip_metadata = true
# Mild unsharp mask after downsampling.
sharpen = true
# Output format: "avif", "webp", "jpeg", "png".
format = "avif"

# ---------------------------------------------------------------------------
# Variant widths (pixels). Heights follow the source aspect ratio.
# ---------------------------------------------------------------------------
[sizes]
thumbnail = 350
collection = 700
display = 1400
# Also emit {stem}-400w, {stem}-800w, {stem}-1600w.
responsive = false

# ---------------------------------------------------------------------------
# Collection descriptors
# ---------------------------------------------------------------------------
[collection]
# URL prefix of the converted variants, e.g. a CDN bucket.
base_url = "/photos"
"##
}
