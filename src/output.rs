//! CLI output formatting for the pipeline commands.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! R0012110 (6000x4000)
//!     Camera: RICOH IMAGING COMPANY, LTD. RICOH GR III
//!     Taken: 2024:03:01 21:10:44
//!     Exposure: f/2.6 · 1/13 · ISO 200 · 28mm
//!     thumbnail    → R0012110-thumbnail.avif (18.2 KB)
//!     collection   → R0012110-collection.avif (61.0 KB)
//!     display      → R0012110-display.avif (204.7 KB)
//!     Metadata: R0012110-metadata.json
//! ```
//!
//! ## Collections
//!
//! ```text
//! photo-004 Shibuya
//!     Image: /photos/R0012110-display.avif
//! Tokyo: 4 photos (1 new) → src/data/collections/tokyo.yaml
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::collection::{CollectionDocument, PhotoEntry};
use crate::formatting::{format_aperture, format_focal_length, format_shutter_speed, parse_iso};
use crate::imaging::{Dimensions, GeneratedVariant};
use crate::metadata::PhotoMetadata;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Metadata
// ============================================================================

/// Camera, date and exposure lines for one photo. Absent groups are omitted.
pub fn format_metadata_summary(metadata: &PhotoMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    let camera = [&metadata.camera_make, &metadata.camera_model]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !camera.is_empty() {
        lines.push(format!("{}Camera: {camera}", indent(1)));
    }
    if let Some(lens) = metadata.lens.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("{}Lens: {lens}", indent(1)));
    }
    if let Some(date) = metadata.date_taken.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("{}Taken: {date}", indent(1)));
    }

    let has_exposure = metadata.aperture.is_some()
        || metadata.shutter_speed.is_some()
        || metadata.iso.is_some()
        || metadata.focal_length_35mm.is_some();
    if has_exposure {
        lines.push(format!(
            "{}Exposure: {} · {} · ISO {} · {}",
            indent(1),
            format_aperture(metadata.aperture.as_deref()),
            format_shutter_speed(metadata.shutter_speed.as_deref()),
            parse_iso(metadata.iso.as_deref()),
            format_focal_length(metadata.focal_length_35mm.as_deref()),
        ));
    }
    lines
}

/// `{stem} ({width}x{height})`
pub fn format_source_header(stem: &str, dims: Dimensions) -> String {
    format!("{stem} ({}x{})", dims.width, dims.height)
}

pub fn print_metadata_summary(stem: &str, dims: Dimensions, metadata: &PhotoMetadata) {
    println!("{}", format_source_header(stem, dims));
    for line in format_metadata_summary(metadata) {
        println!("{}", line);
    }
}

// ============================================================================
// Variants
// ============================================================================

/// One written variant with its size on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport {
    pub label: String,
    pub filename: String,
    pub bytes: u64,
}

impl VariantReport {
    /// Stat the written file. A variant that vanished reports 0 bytes.
    pub fn from_variant(variant: &GeneratedVariant) -> Self {
        let bytes = std::fs::metadata(&variant.path).map(|m| m.len()).unwrap_or(0);
        Self {
            label: variant.label.clone(),
            filename: file_name(&variant.path),
            bytes,
        }
    }
}

/// ```text
///     thumbnail    → R0012110-thumbnail.avif (18.2 KB)
/// ```
pub fn format_variants(reports: &[VariantReport]) -> Vec<String> {
    reports
        .iter()
        .map(|r| {
            format!(
                "{}{:12} → {} ({:.1} KB)",
                indent(1),
                r.label,
                r.filename,
                r.bytes as f64 / 1024.0
            )
        })
        .collect()
}

pub fn print_variants(reports: &[VariantReport]) {
    for line in format_variants(reports) {
        println!("{}", line);
    }
}

pub fn format_sidecar_written(path: &Path) -> String {
    format!("{}Metadata: {}", indent(1), file_name(path))
}

// ============================================================================
// Collections
// ============================================================================

pub fn format_entry_summary(entry: &PhotoEntry) -> Vec<String> {
    vec![
        format!("{} {}", entry.id, entry.title),
        format!("{}Image: {}", indent(1), entry.image),
    ]
}

pub fn print_entry_summary(entry: &PhotoEntry) {
    for line in format_entry_summary(entry) {
        println!("{}", line);
    }
}

/// `{name}: {n} photos ({added} new) → {path}`
pub fn format_collection_summary(document: &CollectionDocument, added: usize, path: &Path) -> String {
    let noun = if document.len() == 1 { "photo" } else { "photos" };
    format!(
        "{}: {} {noun} ({added} new) → {}",
        document.collection,
        document.len(),
        path.display()
    )
}

pub fn print_collection_summary(document: &CollectionDocument, added: usize, path: &Path) {
    println!("{}", format_collection_summary(document, added, path));
}
