//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate, EXIF orientation applied |
//! | EXIF carry-over | decoder EXIF (or `kamadak-exif` for raw), rebuilt by [`crate::exif::sanitize_exif_block`] |
//! | Decode (camera raw) | `rawloader` + half-size superpixel demosaic ([`raw`](super::raw)) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Sharpening | `DynamicImage::unsharpen` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → WebP / JPEG / PNG | `image` crate encoders |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{proportional_height, rav1e_speed, resolve_subsampling};
use super::params::{ConvertParams, EncodeSettings, OutputFormat, ResizeParams};
use super::raw;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use log::{debug, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is excluded: the `image` crate's `"avif"` feature only enables the
/// **encoder** (rav1e). `ImageFormat::reading_enabled()` incorrectly returns
/// `true` for AVIF when `"avif"` is enabled, so it is never listed here.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the non-raw image extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` is something this backend can decode: a camera raw file
/// or one of [`supported_input_extensions`].
pub fn is_supported_input(path: &Path) -> bool {
    if raw::is_raw_file(path) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded source plus the metadata to carry into the output.
struct Decoded {
    image: DynamicImage,
    icc: Option<Vec<u8>>,
    /// Sanitized TIFF-form EXIF, only read when metadata is kept.
    exif: Option<Vec<u8>>,
}

/// Load and decode an image from disk.
///
/// `target_width` lets raw sources shrink on load; other formats always
/// decode at full size.
fn load_image(
    path: &Path,
    target_width: Option<u32>,
    settings: &EncodeSettings,
) -> Result<Decoded, BackendError> {
    let keep_exif = !settings.strip_metadata;
    if raw::is_raw_file(path) {
        return Ok(Decoded {
            image: raw::decode(path, target_width)?,
            icc: None,
            exif: if keep_exif {
                crate::exif::read_portable_exif(path)
            } else {
                None
            },
        });
    }

    let decode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(decode_err)?;
    let icc = decoder.icc_profile().ok().flatten();
    let source_exif = decoder.exif_metadata().ok().flatten();
    let orientation = match source_exif.as_deref().and_then(Orientation::from_exif_chunk) {
        Some(o) => o,
        None => decoder.orientation().unwrap_or(Orientation::NoTransforms),
    };
    let exif = source_exif
        .filter(|_| keep_exif)
        .and_then(crate::exif::sanitize_exif_block);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);

    debug!(
        "Decoded {} ({}x{}, icc: {}, exif: {})",
        path.display(),
        image.width(),
        image.height(),
        icc.is_some(),
        exif.is_some()
    );
    Ok(Decoded { image, icc, exif })
}

/// Average chroma over 2×2 blocks while keeping each pixel's own luma.
///
/// rav1e always encodes 4:4:4 through the `image` crate, so this produces
/// the visual result of 4:2:0 subsampling.
fn subsample_chroma(buf: &mut [u8], width: u32, height: u32, channels: usize) {
    let (w, h) = (width as usize, height as usize);
    let to_ycc = |p: &[u8]| {
        let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        (y, -0.168_736 * r - 0.331_264 * g + 0.5 * b, 0.5 * r - 0.418_688 * g - 0.081_312 * b)
    };

    for by in (0..h).step_by(2) {
        for bx in (0..w).step_by(2) {
            let mut block = Vec::with_capacity(4);
            for y in by..(by + 2).min(h) {
                for x in bx..(bx + 2).min(w) {
                    block.push((y * w + x) * channels);
                }
            }
            let n = block.len() as f32;
            let (mut cb, mut cr) = (0.0, 0.0);
            for &i in &block {
                let (_, b, r) = to_ycc(&buf[i..i + 3]);
                cb += b;
                cr += r;
            }
            let (cb, cr) = (cb / n, cr / n);
            for &i in &block {
                let (y, _, _) = to_ycc(&buf[i..i + 3]);
                let rgb = [y + 1.402 * cr, y - 0.344_136 * cb - 0.714_136 * cr, y + 1.772 * cb];
                for (c, v) in rgb.into_iter().enumerate() {
                    buf[i + c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Prepare pixels for the encoder: 8-bit RGB(A), with chroma subsampling
/// emulated when the settings ask for it.
fn prepare_pixels(img: &DynamicImage, format: OutputFormat, settings: &EncodeSettings) -> DynamicImage {
    let mut out = if img.color().has_alpha() && format.supports_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    if format == OutputFormat::Avif && resolve_subsampling(settings.subsampling, settings.quality)
    {
        let (w, h) = (out.width(), out.height());
        match &mut out {
            DynamicImage::ImageRgba8(buf) => subsample_chroma(buf, w, h, 4),
            DynamicImage::ImageRgb8(buf) => subsample_chroma(buf, w, h, 3),
            _ => {}
        }
    }
    out
}

fn write_with<E: ImageEncoder>(
    mut encoder: E,
    img: &DynamicImage,
    embedded: Embedded,
    format: OutputFormat,
) -> Result<(), BackendError> {
    if let Some(profile) = embedded.icc {
        if let Err(e) = encoder.set_icc_profile(profile) {
            warn!("{format} output drops the source ICC profile: {e}");
        }
    }
    if let Some(block) = embedded.exif {
        if let Err(e) = encoder.set_exif_metadata(block) {
            warn!("{format} output drops the source EXIF: {e}");
        }
    }
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("{format} encode failed: {e}")))
}

/// Metadata blocks handed to the encoder.
struct Embedded {
    icc: Option<Vec<u8>>,
    exif: Option<Vec<u8>>,
}

/// Encode and save in the requested format.
///
/// The source ICC profile is embedded where the encoder supports it (JPEG,
/// PNG, WebP). The AVIF encoder cannot embed one, so AVIF outputs are
/// untagged and a warning is logged when a profile is lost. EXIF is only
/// present in `embedded` when `strip_metadata` is off.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    settings: &EncodeSettings,
    embedded: Embedded,
) -> Result<(), BackendError> {
    let pixels = prepare_pixels(img, format, settings);
    let writer = BufWriter::new(File::create(path)?);
    let quality = settings.quality.value() as u8;

    match format {
        OutputFormat::Avif => {
            let speed = rav1e_speed(settings.effort);
            debug!("AVIF encode q={quality} speed={speed} -> {}", path.display());
            write_with(
                AvifEncoder::new_with_speed_quality(writer, speed, quality),
                &pixels,
                embedded,
                format,
            )
        }
        OutputFormat::Jpeg => {
            write_with(JpegEncoder::new_with_quality(writer, quality), &pixels, embedded, format)
        }
        OutputFormat::WebP => write_with(WebPEncoder::new_lossless(writer), &pixels, embedded, format),
        OutputFormat::Png => write_with(PngEncoder::new(writer), &pixels, embedded, format),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        if raw::is_raw_file(path) {
            return raw::sensor_dimensions(path);
        }
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError> {
        let decoded = load_image(&params.source, None, &params.settings)?;
        save_image(
            &decoded.image,
            &params.output,
            params.format,
            &params.settings,
            Embedded {
                icc: decoded.icc,
                exif: decoded.exif,
            },
        )
    }

    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError> {
        let decoded = load_image(&params.source, Some(params.width), &params.settings)?;
        let src = (decoded.image.width(), decoded.image.height());
        let height = proportional_height(src, params.width);

        let resized = decoded
            .image
            .resize_exact(params.width, height, FilterType::Lanczos3);
        let final_img = match params.sharpening {
            Some(s) => resized.unsharpen(s.sigma, s.threshold),
            None => resized,
        };

        save_image(
            &final_img,
            &params.output,
            params.format,
            &params.settings,
            Embedded {
                icc: decoded.icc,
                exif: decoded.exif,
            },
        )?;
        Ok(Dimensions {
            width: params.width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{ChromaSubsampling, Quality, Sharpening};
    use crate::exif::read_tags;
    use crate::test_helpers::{
        create_test_jpeg, create_test_jpeg_with_exif, create_test_png_with_icc, sample_fields,
    };
    use image::{Rgb, RgbImage};

    fn resize_params(source: &Path, output: &Path, width: u32, format: OutputFormat) -> ResizeParams {
        ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width,
            format,
            settings: EncodeSettings::default(),
            sharpening: Some(Sharpening::mild()),
        }
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
        assert!(!exts.contains(&"avif"));
    }

    #[test]
    fn supported_input_covers_raw_and_decodable() {
        assert!(is_supported_input(Path::new("IMG_0001.DNG")));
        assert!(is_supported_input(Path::new("scan.TIFF")));
        assert!(is_supported_input(Path::new("photo.jpg")));
        assert!(!is_supported_input(Path::new("photo-metadata.json")));
        assert!(!is_supported_input(Path::new("README")));
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn resize_synthetic_to_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);

        let output = tmp.path().join("resized.avif");
        let dims = RustBackend::new()
            .resize(&resize_params(&source, &output, 200, OutputFormat::Avif))
            .unwrap();

        assert_eq!(dims, Dimensions { width: 200, height: 150 });
        assert!(output.exists());
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn resize_keeps_aspect_ratio_in_written_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 300, 200);

        let output = tmp.path().join("resized.png");
        RustBackend::new()
            .resize(&resize_params(&source, &output, 120, OutputFormat::Png))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (120, 80));
    }

    #[test]
    fn resize_upscales_small_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("tiny.jpg");
        create_test_jpeg(&source, 40, 30);

        let output = tmp.path().join("big.jpg");
        RustBackend::new()
            .resize(&resize_params(&source, &output, 80, OutputFormat::Jpeg))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (80, 60));
    }

    #[test]
    fn resize_without_sharpening() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 200, 200);

        let output = tmp.path().join("plain.webp");
        let mut params = resize_params(&source, &output, 50, OutputFormat::WebP);
        params.sharpening = None;
        RustBackend::new().resize(&params).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (50, 50));
    }

    #[test]
    fn resize_undecodable_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"not a jpeg").unwrap();

        let output = tmp.path().join("out.png");
        let result = RustBackend::new().resize(&resize_params(&source, &output, 50, OutputFormat::Png));
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn convert_keeps_full_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 48);

        let output = tmp.path().join("source.png");
        RustBackend::new()
            .convert(&ConvertParams {
                source,
                output: output.clone(),
                format: OutputFormat::Png,
                settings: EncodeSettings::default(),
            })
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (64, 48));
    }

    // =========================================================================
    // Embedded metadata
    // =========================================================================

    fn convert_to(source: &Path, output: &Path, format: OutputFormat, strip_metadata: bool) {
        RustBackend::new()
            .convert(&ConvertParams {
                source: source.to_path_buf(),
                output: output.to_path_buf(),
                format,
                settings: EncodeSettings {
                    strip_metadata,
                    ..EncodeSettings::default()
                },
            })
            .unwrap();
    }

    fn rotated_exif_source(dir: &Path) -> std::path::PathBuf {
        let mut fields = sample_fields();
        fields.push(exif::Field {
            tag: exif::Tag::Orientation,
            ifd_num: exif::In::PRIMARY,
            value: exif::Value::Short(vec![6]),
        });
        let source = dir.join("R0012110.jpg");
        create_test_jpeg_with_exif(&source, 40, 20, &fields);
        source
    }

    #[test]
    fn stripped_output_has_no_exif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = rotated_exif_source(tmp.path());
        let output = tmp.path().join("out.jpg");
        convert_to(&source, &output, OutputFormat::Jpeg, true);

        assert!(read_tags(&output).unwrap().is_empty());
        assert_eq!(image::image_dimensions(&output).unwrap(), (20, 40));
    }

    #[test]
    fn kept_metadata_carries_descriptive_exif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = rotated_exif_source(tmp.path());
        let output = tmp.path().join("out.jpg");
        convert_to(&source, &output, OutputFormat::Jpeg, false);

        let tags = read_tags(&output).unwrap();
        assert_eq!(tags["Image Model"].to_field_string(), "RICOH GR III");
        assert_eq!(tags["EXIF FNumber"].to_field_string(), "[28/10]");
        // Pixels are already upright, so no orientation is written back.
        assert!(!tags.contains_key("Image Orientation"));
        assert_eq!(image::image_dimensions(&output).unwrap(), (20, 40));
    }

    #[test]
    fn icc_profile_survives_png_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("tagged.png");
        let profile: Vec<u8> = (0..=255).collect();
        create_test_png_with_icc(&source, 16, 16, &profile);

        let output = tmp.path().join("out.png");
        convert_to(&source, &output, OutputFormat::Png, true);

        let mut decoder = ImageReader::open(&output)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .into_decoder()
            .unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(profile));
    }

    #[test]
    fn avif_output_without_icc_support_still_encodes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("tagged.png");
        create_test_png_with_icc(&source, 16, 16, &[1, 2, 3, 4]);

        let output = tmp.path().join("out.avif");
        convert_to(&source, &output, OutputFormat::Avif, true);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn chroma_subsampling_keeps_gray_untouched() {
        let mut buf = vec![128u8; 4 * 4 * 3];
        subsample_chroma(&mut buf, 4, 4, 3);
        assert!(buf.iter().all(|&v| (127..=129).contains(&v)));
    }

    #[test]
    fn chroma_subsampling_blends_colors_within_a_block() {
        // Red and blue neighbours share one chroma value afterwards.
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        let mut buf = img.into_raw();
        subsample_chroma(&mut buf, 2, 1, 3);
        assert!(buf[0] < 255 && buf[2] > 0, "red pixel picked up blue: {buf:?}");
        assert!(buf[5] < 255 && buf[3] > 0, "blue pixel picked up red: {buf:?}");
    }

    #[test]
    fn chroma_subsampling_handles_odd_sizes_and_alpha() {
        let mut buf = vec![200u8; 3 * 3 * 4];
        subsample_chroma(&mut buf, 3, 3, 4);
        // Alpha bytes are never written.
        assert!(buf.chunks(4).all(|p| p[3] == 200));
    }

    #[test]
    fn prepare_pixels_drops_alpha_for_jpeg() {
        let img = DynamicImage::new_rgba8(4, 4);
        let settings = EncodeSettings::default();
        assert!(!prepare_pixels(&img, OutputFormat::Jpeg, &settings).color().has_alpha());
        assert!(prepare_pixels(&img, OutputFormat::Png, &settings).color().has_alpha());
    }

    #[test]
    fn prepare_pixels_only_subsamples_when_resolved_on() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        let img = DynamicImage::ImageRgb8(img);

        let off = EncodeSettings {
            subsampling: ChromaSubsampling::Off,
            ..EncodeSettings::default()
        };
        assert_eq!(prepare_pixels(&img, OutputFormat::Avif, &off), img);

        let high_quality_auto = EncodeSettings {
            quality: Quality::new(95),
            ..EncodeSettings::default()
        };
        assert_eq!(prepare_pixels(&img, OutputFormat::Avif, &high_quality_auto), img);

        let on = EncodeSettings {
            subsampling: ChromaSubsampling::On,
            ..EncodeSettings::default()
        };
        assert_ne!(prepare_pixels(&img, OutputFormat::Avif, &on), img);
    }
}
