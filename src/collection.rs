//! YAML collection descriptors for the gallery site.
//!
//! A collection file lists photos with the URLs of their three web variants
//! and a caption-ready metadata block:
//!
//! ```yaml
//! collection: Tokyo
//! description: Night walks
//! photos:
//! - id: photo-001
//!   title: Shibuya
//!   image: /photos/R0012110-display.avif
//!   collection: /photos/R0012110-collection.avif
//!   thumbnail: /photos/R0012110-thumbnail.avif
//!   metadata:
//!     camera: RICOH IMAGING COMPANY, LTD. RICOH GR III
//!     lens: Unknown
//!     settings:
//!       iso:
//!       - 200
//!       aperture: f/2.6
//!       shutter: 1/13
//!       focalLength: 28mm
//!     location: Unknown Location
//!     dateTaken: 2024:03:01 21:10:44
//! ```
//!
//! [`DescriptorGenerator`] builds entries and writes new files.
//! [`CollectionDocument`] loads an existing file so entries can be appended:
//! ids continue from the highest `photo-NNN` and images already present
//! (matched by stem) are skipped.
//!
//! Collection files are edited by hand too. Keys the model doesn't know are
//! kept in an `extra` mapping at each level and written back on save, and
//! missing display fields load as empty.

use crate::formatting::{format_aperture, format_focal_length, format_shutter_speed, parse_iso};
use crate::metadata::PhotoMetadata;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "/photos";
pub const DEFAULT_COLLECTIONS_DIR: &str = "src/data/collections";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Variant files referenced by every entry. Always AVIF.
const VARIANT_EXTENSION: &str = "avif";
const ID_PREFIX: &str = "photo-";

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CollectionError>;

// ============================================================================
// Document model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExposureSettings {
    pub iso: Vec<u32>,
    pub aperture: String,
    pub shutter: String,
    pub focal_length: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryMetadata {
    pub camera: String,
    pub lens: String,
    pub settings: ExposureSettings,
    pub location: String,
    pub date_taken: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// One photo of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoEntry {
    pub id: String,
    pub title: String,
    pub image: String,
    pub collection: String,
    pub thumbnail: String,
    pub metadata: EntryMetadata,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl PhotoEntry {
    /// Image stem this entry was built from, parsed back out of the
    /// `{base}/{stem}-display.avif` URL.
    pub fn stem(&self) -> Option<&str> {
        stem_from_url(&self.image, "-display")
    }
}

fn stem_from_url<'a>(url: &'a str, suffix: &str) -> Option<&'a str> {
    let file = url.rsplit('/').next()?;
    let (name, _ext) = file.rsplit_once('.')?;
    name.strip_suffix(suffix)
}

/// Numeric part of a `photo-NNN` id. Trailing `-…` after the digits is allowed.
pub fn photo_number(id: &str) -> Option<u64> {
    let rest = id.strip_prefix(ID_PREFIX)?;
    let digits = rest.split('-').next()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `photo-NNN`, zero padded to at least three digits.
pub fn format_photo_id(number: u64) -> String {
    format!("{ID_PREFIX}{number:03}")
}

/// A collection file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDocument {
    pub collection: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<PhotoEntry>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl CollectionDocument {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            description: description.into(),
            photos: Vec::new(),
            extra: Mapping::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write the whole document, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// One past the highest `photo-NNN` id in use.
    ///
    /// When the highest number is `u64::MAX`, the lowest unused number is
    /// taken instead.
    pub fn next_photo_id(&self) -> String {
        let used: BTreeSet<u64> = self.photos.iter().filter_map(|p| photo_number(&p.id)).collect();
        let next = match used.last() {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .or_else(|| (1..).find(|n| !used.contains(n)))
                .unwrap_or(1),
        };
        format_photo_id(next)
    }

    /// Whether an entry for the image `stem` already exists.
    pub fn contains_stem(&self, stem: &str) -> bool {
        self.photos.iter().any(|p| p.stem() == Some(stem))
    }

    pub fn push(&mut self, entry: PhotoEntry) {
        self.photos.push(entry);
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Builds entries against one base URL and writes collection files.
#[derive(Debug, Clone)]
pub struct DescriptorGenerator {
    base_url: String,
    collections_dir: PathBuf,
}

impl DescriptorGenerator {
    /// Trailing slashes of `base_url` are dropped.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collections_dir: PathBuf::from(DEFAULT_COLLECTIONS_DIR),
        }
    }

    pub fn with_collections_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.collections_dir = dir.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn collections_dir(&self) -> &Path {
        &self.collections_dir
    }

    fn variant_url(&self, stem: &str, label: &str) -> String {
        format!("{}/{stem}-{label}.{VARIANT_EXTENSION}", self.base_url)
    }

    pub fn create_photo_entry(
        &self,
        id: &str,
        title: &str,
        metadata: &PhotoMetadata,
        stem: &str,
    ) -> PhotoEntry {
        let make = metadata.camera_make.as_deref().unwrap_or("").trim();
        let model = metadata.camera_model.as_deref().unwrap_or("").trim();
        let camera = format!("{make} {model}").trim().to_string();
        let or_default = |value: &Option<String>, default: &str| {
            value
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        PhotoEntry {
            id: id.to_string(),
            title: title.to_string(),
            image: self.variant_url(stem, "display"),
            collection: self.variant_url(stem, "collection"),
            thumbnail: self.variant_url(stem, "thumbnail"),
            metadata: EntryMetadata {
                camera: if camera.is_empty() {
                    "Unknown".to_string()
                } else {
                    camera
                },
                lens: or_default(&metadata.lens, "Unknown"),
                settings: ExposureSettings {
                    iso: vec![parse_iso(metadata.iso.as_deref())],
                    aperture: format_aperture(metadata.aperture.as_deref()),
                    shutter: format_shutter_speed(metadata.shutter_speed.as_deref()),
                    focal_length: format_focal_length(metadata.focal_length_35mm.as_deref()),
                    extra: Mapping::new(),
                },
                location: or_default(&metadata.location, UNKNOWN_LOCATION),
                date_taken: metadata.date_taken.clone().unwrap_or_default(),
                extra: Mapping::new(),
            },
            extra: Mapping::new(),
        }
    }

    /// `{collections_dir}/{name lowercased, spaces as dashes}.yaml`
    pub fn default_collection_path(&self, name: &str) -> PathBuf {
        self.collections_dir
            .join(format!("{}.yaml", name.to_lowercase().replace(' ', "-")))
    }

    /// `{collections_dir}/{name}.yaml`, name used verbatim.
    pub fn named_collection_path(&self, name: &str) -> PathBuf {
        self.collections_dir.join(format!("{name}.yaml"))
    }

    /// Write a new collection file. Returns the written path.
    pub fn generate_collection(
        &self,
        name: &str,
        description: &str,
        photos: Vec<PhotoEntry>,
        output_file: Option<&Path>,
    ) -> Result<PathBuf> {
        let path = output_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_collection_path(name));
        let document = CollectionDocument {
            photos,
            ..CollectionDocument::new(name, description)
        };
        document.save(&path)?;
        log::info!("Wrote {} photos to {}", document.len(), path.display());
        Ok(path)
    }

    /// Build one entry per `(id, title, metadata)`, using the id as the image
    /// stem, and write them to the default collection path.
    pub fn batch_process(
        &self,
        name: &str,
        description: &str,
        images: &[(String, String, PhotoMetadata)],
    ) -> Result<PathBuf> {
        let photos = images
            .iter()
            .map(|(id, title, metadata)| self.create_photo_entry(id, title, metadata, id))
            .collect();
        self.generate_collection(name, description, photos, None)
    }
}

impl Default for DescriptorGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
