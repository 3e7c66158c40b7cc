//! Raw EXIF tag reading.
//!
//! Wraps `kamadak-exif` and flattens every field into a [`TagMap`] keyed by
//! `"<IFD> <TagName>"`, e.g. `"Image Make"` or `"EXIF FNumber"`. Values keep
//! their shape: numeric tags become [`TagValue::Structured`] lists, text
//! tags become [`TagValue::Text`]. Interpreting those values is the job of
//! [`metadata`](crate::metadata) and [`formatting`](crate::formatting).
//!
//! ## Key prefixes
//!
//! | Prefix | Source IFD |
//! |---|---|
//! | `Image` | IFD0 (primary image) |
//! | `Thumbnail` | IFD1 |
//! | `EXIF` | Exif sub-IFD |
//! | `GPS` | GPS sub-IFD |
//! | `Interoperability` | Interop sub-IFD |
//!
//! ## Carrying EXIF into outputs
//!
//! [`sanitize_exif_block`] and [`read_portable_exif`] rebuild a TIFF-form
//! EXIF block holding only the primary image's descriptive tags. Layout tags
//! (dimensions, strips, compression, sub-IFD pointers), the orientation
//! (pixels are already rotated on decode), maker notes and DNG private tags
//! are dropped, so the block stays truthful for a resized re-encode.

use exif::{Context, Field, In, Reader, Tag, Value};
use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The value of one EXIF tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    /// Numeric values, one string per element. Rationals render as
    /// `"num/denom"`, or just `"num"` when the denominator is 1.
    Structured(Vec<String>),
    /// String-only tags (ASCII, opaque data).
    Text(String),
}

impl TagValue {
    /// Single-string form stored in metadata fields.
    ///
    /// ```
    /// # use filmstrip::exif::TagValue;
    /// assert_eq!(TagValue::Structured(vec!["28/10".into()]).to_field_string(), "[28/10]");
    /// assert_eq!(TagValue::Text("RICOH".into()).to_field_string(), "RICOH");
    /// ```
    pub fn to_field_string(&self) -> String {
        match self {
            Self::Structured(values) => format!("[{}]", values.join(", ")),
            Self::Text(text) => text.clone(),
        }
    }
}

pub type TagMap = BTreeMap<String, TagValue>;

/// Read every EXIF tag from `path`.
///
/// A file without EXIF (or with EXIF that cannot be parsed) yields an empty
/// map; only failing to read the file is an error.
pub fn read_tags(path: &Path) -> Result<TagMap, ExifError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(tags_from_fields(exif.fields())),
        Err(exif::Error::Io(e)) => Err(e.into()),
        Err(e) => {
            debug!("No EXIF in {}: {}", path.display(), e);
            Ok(TagMap::new())
        }
    }
}

/// TIFF-context tags that describe the stored pixels rather than the shot.
const LAYOUT_TAGS: &[u16] = &[
    254, 255, 256, 257, 258, 259, 262, 266, 273, 274, 277, 278, 279, 280, 281, 284, 317, 320,
    322, 323, 324, 325, 330, 338, 339, 513, 514, 529, 530, 531, 532, 700, 34665, 34675, 34853,
];
/// Exif-context tags dropped for the same reason, plus maker notes.
const DROPPED_EXIF_TAGS: &[u16] = &[37500, 40962, 40963, 40965];
/// DNG private tags start here.
const DNG_TAG_FLOOR: u16 = 50706;

fn is_portable(field: &Field) -> bool {
    if field.ifd_num != In::PRIMARY || matches!(field.value, Value::Unknown(..)) {
        return false;
    }
    let number = field.tag.number();
    match field.tag.context() {
        Context::Tiff => !LAYOUT_TAGS.contains(&number) && number < DNG_TAG_FLOOR,
        Context::Exif => !DROPPED_EXIF_TAGS.contains(&number),
        Context::Gps | Context::Interop => true,
        _ => false,
    }
}

fn portable_block<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Option<Vec<u8>> {
    let kept: Vec<&Field> = fields.into_iter().filter(|f| is_portable(f)).collect();
    if kept.is_empty() {
        return None;
    }
    let mut writer = exif::experimental::Writer::new();
    for field in &kept {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    match writer.write(&mut buf, false) {
        Ok(()) => Some(buf.into_inner()),
        Err(e) => {
            debug!("Could not rebuild EXIF block: {e}");
            None
        }
    }
}

/// Rebuild a raw TIFF-form EXIF block (as returned by an image decoder)
/// with only the tags that stay true after a resize.
///
/// Returns `None` when the block cannot be parsed or nothing is left.
pub fn sanitize_exif_block(block: Vec<u8>) -> Option<Vec<u8>> {
    match Reader::new().read_raw(block) {
        Ok(exif) => portable_block(exif.fields()),
        Err(e) => {
            debug!("Unreadable EXIF block: {e}");
            None
        }
    }
}

/// Like [`sanitize_exif_block`], reading the EXIF straight from a container
/// file. Used for camera raw sources, which have no `image` decoder.
pub fn read_portable_exif(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    portable_block(exif.fields())
}

/// Build a [`TagMap`] from decoded fields. The first field wins when two
/// map to the same key.
pub fn tags_from_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> TagMap {
    let mut tags = TagMap::new();
    for field in fields {
        tags.entry(tag_key(field))
            .or_insert_with(|| tag_value(field));
    }
    tags
}

fn tag_key(field: &Field) -> String {
    let group = match field.tag.context() {
        Context::Tiff if field.ifd_num == In::PRIMARY => "Image",
        Context::Tiff => "Thumbnail",
        Context::Gps => "GPS",
        Context::Interop => "Interoperability",
        _ => "EXIF",
    };
    format!("{group} {}", tag_name(field.tag))
}

fn tag_name(tag: Tag) -> String {
    if tag == Tag::PhotographicSensitivity {
        "ISOSpeedRatings".to_string()
    } else {
        tag.to_string()
    }
}

fn ratio<T: PartialEq + From<u8> + ToString>(num: T, denom: T) -> String {
    if denom == T::from(1) {
        num.to_string()
    } else {
        format!("{}/{}", num.to_string(), denom.to_string())
    }
}

fn list<T: ToString>(values: &[T]) -> TagValue {
    TagValue::Structured(values.iter().map(ToString::to_string).collect())
}

fn tag_value(field: &Field) -> TagValue {
    match &field.value {
        Value::Ascii(parts) => TagValue::Text(
            parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Byte(v) => list(v),
        Value::Short(v) => list(v),
        Value::Long(v) => list(v),
        Value::SByte(v) => list(v),
        Value::SShort(v) => list(v),
        Value::SLong(v) => list(v),
        Value::Float(v) => list(v),
        Value::Double(v) => list(v),
        Value::Rational(v) => {
            TagValue::Structured(v.iter().map(|r| ratio(r.num, r.denom)).collect())
        }
        Value::SRational(v) => {
            TagValue::Structured(v.iter().map(|r| ratio(r.num, r.denom)).collect())
        }
        _ => TagValue::Text(field.display_value().to_string()),
    }
}
