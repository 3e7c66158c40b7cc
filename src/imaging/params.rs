//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`ImageConverter`](super::converter::ImageConverter)
//! (which decides which files to produce) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing conversion logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`Effort`]: Encoder effort (0–9, default 7). Higher is slower and smaller.
//! - [`ChromaSubsampling`]: `auto` / `on` / `off`.
//! - [`Sharpening`]: Unsharp-mask parameters applied after downsampling.
//! - [`OutputFormat`]: Target container/codec.
//! - [`EncodeSettings`]: Everything fixed per converter instance.
//! - [`ConvertParams`] / [`ResizeParams`]: One backend call each.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Compression effort (0 = fastest, 9 = smallest output).
///
/// Offline pipelines can afford the high end; encoding happens once per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effort(u8);

impl Effort {
    pub fn new(value: u8) -> Self {
        Self(value.min(9))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Effort {
    fn default() -> Self {
        Self(7)
    }
}

/// Chroma subsampling mode.
///
/// `Auto` subsamples only at lower quality settings, see
/// [`resolve_subsampling`](super::calculations::resolve_subsampling).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ChromaSubsampling {
    #[default]
    Auto,
    On,
    Off,
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = wider halo)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Mild post-resize sharpening. The non-zero threshold leaves flat
    /// regions (sky, skin) alone.
    pub fn mild() -> Self {
        Self {
            sigma: 1.0,
            threshold: 2,
        }
    }
}

/// Output encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Avif,
    #[value(name = "webp")]
    WebP,
    #[value(alias = "jpg")]
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoder configuration, fixed per converter instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    pub quality: Quality,
    pub effort: Effort,
    pub subsampling: ChromaSubsampling,
    /// Drop everything but the ICC profile from the output. When off,
    /// descriptive EXIF (camera, exposure, date, GPS) is embedded in
    /// formats whose encoder accepts it.
    pub strip_metadata: bool,
    /// Apply [`Sharpening::mild`] after every resize.
    pub sharpen: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            effort: Effort::default(),
            subsampling: ChromaSubsampling::Auto,
            strip_metadata: true,
            sharpen: true,
        }
    }
}

/// Parameters for a straight re-encode (no resize).
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub settings: EncodeSettings,
}

/// Parameters for a proportional resize followed by an encode.
///
/// Only the width is specified; the backend derives the height from the
/// decoded source's aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub format: OutputFormat,
    pub settings: EncodeSettings,
    pub sharpening: Option<Sharpening>,
}
