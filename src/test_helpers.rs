//! Shared test utilities for the filmstrip test suite.
//!
//! Provides synthetic image files, EXIF fixtures, and sample metadata so
//! module tests don't each rebuild the same GR III shot by hand.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let raw = tmp.path().join("R0012110.jpg");
//! create_test_jpeg(&raw, 120, 80);
//!
//! let metadata = sample_metadata();
//! assert_eq!(metadata.aperture.as_deref(), Some("[28/10]"));
//! ```

use crate::exif::{TagMap, TagValue};
use crate::metadata::PhotoMetadata;
use exif::{Field, In, Rational, Tag, Value};
use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// Image files
// =========================================================================

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a JPEG carrying `fields` as its EXIF block.
pub fn create_test_jpeg_with_exif(path: &Path, width: u32, height: u32, fields: &[Field]) {
    let img = RgbImage::from_fn(width, height, |x, _| image::Rgb([(x * 6 % 256) as u8, 64, 32]));
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new(std::io::BufWriter::new(file));
    encoder.set_exif_metadata(exif_block(fields)).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a PNG tagged with `profile` as its ICC profile.
pub fn create_test_png_with_icc(path: &Path, width: u32, height: u32, profile: &[u8]) {
    let img = RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150]));
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(file));
    encoder.set_icc_profile(profile.to_vec()).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create an empty `{stem}-thumbnail.avif` marker the way a finished
/// conversion leaves one behind.
pub fn touch_thumbnail(dir: &Path, stem: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{stem}-thumbnail.avif")), b"").unwrap();
}

// =========================================================================
// EXIF fixtures
// =========================================================================

/// The fields a RICOH GR III writes for a dim street shot.
pub fn sample_fields() -> Vec<Field> {
    let ascii = |s: &str| Value::Ascii(vec![s.as_bytes().to_vec()]);
    let rational = |num, denom| Value::Rational(vec![Rational { num, denom }]);
    let field = |tag, value| Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    };
    vec![
        field(Tag::Make, ascii("RICOH IMAGING COMPANY, LTD.")),
        field(Tag::Model, ascii("RICOH GR III")),
        field(Tag::DateTimeOriginal, ascii("2024:03:01 21:10:44")),
        field(Tag::FNumber, rational(28, 10)),
        field(Tag::ExposureTime, rational(1, 13)),
        field(Tag::PhotographicSensitivity, Value::Short(vec![200])),
        field(Tag::FocalLengthIn35mmFilm, Value::Short(vec![28])),
        field(Tag::ExposureMode, Value::Short(vec![0])),
    ]
}

/// `fields` serialized as a TIFF-form EXIF block.
pub fn exif_block(fields: &[Field]) -> Vec<u8> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    buf.into_inner()
}

/// Write `fields` as a bare TIFF/EXIF file that `exif::read_tags` can parse.
pub fn write_exif_tiff(path: &Path, fields: &[Field]) {
    std::fs::write(path, exif_block(fields)).unwrap();
}

/// The tag map [`sample_fields`] produces.
pub fn sample_tags() -> TagMap {
    let structured = |v: &str| TagValue::Structured(vec![v.to_string()]);
    let text = |v: &str| TagValue::Text(v.to_string());
    TagMap::from([
        ("Image Make".to_string(), text("RICOH IMAGING COMPANY, LTD.")),
        ("Image Model".to_string(), text("RICOH GR III")),
        ("EXIF DateTimeOriginal".to_string(), text("2024:03:01 21:10:44")),
        ("EXIF FNumber".to_string(), structured("28/10")),
        ("EXIF ExposureTime".to_string(), structured("1/13")),
        ("EXIF ISOSpeedRatings".to_string(), structured("200")),
        ("EXIF FocalLengthIn35mmFilm".to_string(), structured("28")),
        ("EXIF ExposureMode".to_string(), structured("0")),
    ])
}

/// Metadata as extracted from [`sample_tags`].
pub fn sample_metadata() -> PhotoMetadata {
    PhotoMetadata::from_tags(&sample_tags())
}
