//! Pure calculation functions for image dimensions, encoder knobs, and
//! output naming.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{ChromaSubsampling, Effort, OutputFormat, Quality};
use std::path::{Path, PathBuf};

/// Quality at or above which `auto` subsampling keeps full chroma resolution.
pub const FULL_CHROMA_QUALITY: u32 = 90;

/// Height that preserves the source aspect ratio at `target_width`.
///
/// Rounded to the nearest pixel and never less than 1.
///
/// # Examples
/// ```
/// # use filmstrip::imaging::proportional_height;
/// // 6000x4000 at 1400 wide → 933 tall
/// assert_eq!(proportional_height((6000, 4000), 1400), 933);
///
/// // Extreme panorama still yields a visible row
/// assert_eq!(proportional_height((10000, 10), 350), 1);
/// ```
pub fn proportional_height(source: (u32, u32), target_width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return 1;
    }
    let h = (src_h as f64 * target_width as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// rav1e speed preset for an effort level.
///
/// Effort runs 0 (fastest) to 9 (slowest); rav1e runs 10 (fastest) to
/// 1 (slowest), so the scale is inverted and clamped.
pub fn rav1e_speed(effort: Effort) -> u8 {
    (10 - effort.value() as i16).clamp(1, 10) as u8
}

/// Whether chroma should be subsampled for this mode and quality.
pub fn resolve_subsampling(mode: ChromaSubsampling, quality: Quality) -> bool {
    match mode {
        ChromaSubsampling::Auto => quality.value() < FULL_CHROMA_QUALITY,
        ChromaSubsampling::On => true,
        ChromaSubsampling::Off => false,
    }
}

/// The file stem of `path` as an owned string (empty when there is none).
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Default destination for a straight conversion: same directory and stem,
/// the format's extension.
pub fn converted_output_path(source: &Path, format: OutputFormat) -> PathBuf {
    source.with_extension(format.extension())
}

/// Default destination for a single resize: `{parent}/{stem}-{width}w.{ext}`.
pub fn sized_output_path(source: &Path, width: u32, format: OutputFormat) -> PathBuf {
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(
        "{}-{}w.{}",
        file_stem(source),
        width,
        format.extension()
    ))
}

/// Destination for a labeled responsive variant: `{dir}/{stem}-{label}.{ext}`.
pub fn variant_output_path(dir: &Path, stem: &str, label: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{stem}-{label}.{}", format.extension()))
}

/// Whether a sensor of `sensor_width` pixels can be decoded at half
/// resolution and still cover `target_width`.
pub fn raw_half_size_fits(sensor_width: u32, target_width: u32) -> bool {
    target_width.saturating_mul(2) <= sensor_width
}
