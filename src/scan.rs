//! Directory scanning for the conversion and collection stages.
//!
//! Both pipeline directories are flat:
//!
//! ```text
//! pipeline_artifacts/
//! ├── raw/                      # sources: DNG, CR2, JPEG, ...
//! │   ├── R0012110.DNG
//! │   └── R0012111.DNG
//! └── converted/                # one set of variants per source stem
//!     ├── R0012110-thumbnail.avif
//!     ├── R0012110-collection.avif
//!     ├── R0012110-display.avif
//!     └── R0012110-metadata.json
//! ```
//!
//! A source counts as converted once its `{stem}-thumbnail.avif` exists.
//! Subdirectories and hidden files are ignored. Every listing is sorted by
//! file name so photo ids come out in a stable order.

use crate::imaging::is_supported_input;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Suffix of the smallest variant, the marker of a finished conversion.
pub const THUMBNAIL_SUFFIX: &str = "-thumbnail.avif";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Regular, non-hidden files directly inside `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Stems of every `{stem}-thumbnail.avif` in `dir`, sorted.
pub fn converted_stems(dir: &Path) -> Result<Vec<String>, ScanError> {
    Ok(list_files(dir)?
        .iter()
        .filter_map(|p| p.file_name()?.to_str()?.strip_suffix(THUMBNAIL_SUFFIX))
        .filter(|stem| !stem.is_empty())
        .map(String::from)
        .collect())
}

/// Decodable sources (camera raw or ordinary images) in `dir`, sorted.
pub fn source_images(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|p| is_supported_input(p))
        .collect())
}

/// Whether `{converted_dir}/{stem}-thumbnail.avif` exists.
pub fn is_converted(converted_dir: &Path, stem: &str) -> bool {
    converted_dir
        .join(format!("{stem}{THUMBNAIL_SUFFIX}"))
        .is_file()
}

/// Sources in `raw_dir` without a thumbnail in `converted_dir`.
pub fn unconverted_sources(raw_dir: &Path, converted_dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    Ok(source_images(raw_dir)?
        .into_iter()
        .filter(|p| {
            let stem = crate::imaging::file_stem(p);
            !is_converted(converted_dir, &stem)
        })
        .collect())
}
