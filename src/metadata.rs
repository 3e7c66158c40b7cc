//! Photo metadata extraction and persistence.
//!
//! ## Extraction
//!
//! [`PhotoMetadata::from_tags`] picks the portfolio-relevant fields out of a
//! [`TagMap`]. Values are stored in their field-string form (see
//! [`TagValue::to_field_string`](crate::exif::TagValue::to_field_string)):
//! numeric tags keep their brackets (`"[28/10]"`) and are only turned into
//! display strings by [`formatting`](crate::formatting) when an entry is
//! built. Missing tags leave the field `None`; extraction never fails.
//!
//! ## Sidecar files
//!
//! Conversion writes the handful of fields a collection entry needs to
//! `{stem}-metadata.json` next to the converted variants:
//!
//! ```json
//! {
//!   "camera_make": "RICOH IMAGING COMPANY, LTD.",
//!   "camera_model": "RICOH GR III",
//!   "iso": "200",
//!   "aperture": "[28/10]",
//!   "shutter_speed": "[1/13]",
//!   "focal_length_35mm": "[28]",
//!   "date_taken": "2024:03:01 21:10:44"
//! }
//! ```
//!
//! Descriptor generation runs later, often long after the raw file has been
//! archived, and backfills [`PhotoMetadata`] from the sidecar with
//! [`MetadataSidecar::apply_to`]. Older sidecars may hold numbers or lists
//! where strings are expected, so reading is lenient.

use crate::exif::{self, ExifError, TagMap, TagValue};
use crate::formatting::first_element;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Portfolio-relevant EXIF fields of one photo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    // Camera
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,

    // When and where
    pub date_taken: Option<String>,
    pub location: Option<String>,

    // Exposure
    pub focal_length_35mm: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,

    // Metering and mode
    pub exposure_mode: Option<String>,
    pub metering_mode: Option<String>,
    pub exposure_bias: Option<String>,

    // In-camera processing
    pub contrast: Option<String>,
    pub saturation: Option<String>,
    pub sharpness: Option<String>,

    // Resolution
    pub image_width: Option<String>,
    pub image_height: Option<String>,
}

impl PhotoMetadata {
    /// Pick known tags out of `tags`. `location` is never set here.
    pub fn from_tags(tags: &TagMap) -> Self {
        let get = |key: &str| tags.get(key).map(TagValue::to_field_string);
        Self {
            camera_make: get("Image Make"),
            camera_model: get("Image Model"),
            lens: get("EXIF LensModel"),
            date_taken: get("EXIF DateTimeOriginal"),
            location: None,
            focal_length_35mm: get("EXIF FocalLengthIn35mmFilm"),
            aperture: get("EXIF FNumber"),
            shutter_speed: get("EXIF ExposureTime"),
            iso: get("EXIF ISOSpeedRatings"),
            exposure_mode: get("EXIF ExposureMode"),
            metering_mode: get("EXIF MeteringMode"),
            exposure_bias: get("EXIF ExposureBiasValue"),
            contrast: get("EXIF Contrast"),
            saturation: get("EXIF Saturation"),
            sharpness: get("EXIF Sharpness"),
            image_width: get("EXIF SubIFD1 ImageWidth"),
            image_height: get("EXIF SubIFD1 ImageLength"),
        }
    }
}

/// Read the EXIF block of `path` and extract [`PhotoMetadata`].
///
/// Fails only when the file cannot be read.
pub fn extract(path: &Path) -> Result<PhotoMetadata, ExifError> {
    let tags = exif::read_tags(path)?;
    log::debug!("{} EXIF tags in {}", tags.len(), path.display());
    Ok(PhotoMetadata::from_tags(&tags))
}

// ============================================================================
// Sidecar
// ============================================================================

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid metadata sidecar: {0}")]
    Json(#[from] serde_json::Error),
}

/// Camera make/model written when the EXIF block has none.
pub const UNKNOWN_CAMERA: &str = "Unknown";

/// `{dir}/{stem}-metadata.json`
pub fn sidecar_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}-metadata.json"))
}

/// The `{stem}-metadata.json` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSidecar {
    #[serde(default, deserialize_with = "lenient_string")]
    pub camera_make: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub camera_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub iso: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub aperture: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub shutter_speed: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub focal_length_35mm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_taken: Option<String>,
}

/// Accept a string, number, bool, or list (first element) where a string
/// is expected.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(json_to_string))
}

fn json_to_string(value: serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.into_iter().next().and_then(json_to_string),
        Value::Object(_) => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.is_empty())
}

impl MetadataSidecar {
    pub fn from_metadata(metadata: &PhotoMetadata) -> Self {
        let camera = |v: &Option<String>| non_empty(v).unwrap_or_else(|| UNKNOWN_CAMERA.to_string());
        Self {
            camera_make: Some(camera(&metadata.camera_make)),
            camera_model: Some(camera(&metadata.camera_model)),
            iso: non_empty(&metadata.iso).map(|iso| first_element(&iso).to_string()),
            aperture: non_empty(&metadata.aperture),
            shutter_speed: non_empty(&metadata.shutter_speed),
            focal_length_35mm: non_empty(&metadata.focal_length_35mm),
            date_taken: non_empty(&metadata.date_taken),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), SidecarError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, SidecarError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`read`](Self::read), but a missing file is `Ok(None)`.
    pub fn read_if_exists(path: &Path) -> Result<Option<Self>, SidecarError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::read(path).map(Some)
    }

    /// Overwrite the seven sidecar fields of `metadata`, absent ones included.
    pub fn apply_to(&self, metadata: &mut PhotoMetadata) {
        metadata.camera_make = self.camera_make.clone();
        metadata.camera_model = self.camera_model.clone();
        metadata.iso = self.iso.clone();
        metadata.aperture = self.aperture.clone();
        metadata.shutter_speed = self.shutter_speed.clone();
        metadata.focal_length_35mm = self.focal_length_35mm.clone();
        metadata.date_taken = self.date_taken.clone();
    }
}
