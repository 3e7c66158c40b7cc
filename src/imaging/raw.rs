//! Camera raw decoding with shrink-on-load.
//!
//! Sensor data comes from `rawloader`. Bayer sensors are demosaiced by
//! collapsing each 2×2 CFA quad into one RGB pixel ("superpixel"), which
//! halves both dimensions and needs no interpolation. Every size the pipeline
//! emits is far below sensor resolution, so the half-size decode is both the
//! fastest and the cleanest path. Linear (already demosaiced) DNGs are
//! box-averaged to half size when the target still fits, and decoded at full
//! size otherwise.
//!
//! Pixel values are black/white-level normalized, white balanced from the
//! camera's as-shot coefficients, and gamma encoded to 8-bit sRGB-ish output.

use super::backend::{BackendError, Dimensions};
use super::calculations::raw_half_size_fits;
use image::metadata::Orientation;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use log::debug;
use rawloader::{CFA, RawImage, RawImageData};
use std::path::Path;

const DISPLAY_GAMMA: f32 = 2.2;

/// Check if a file is a camera raw file based on extension.
pub fn is_raw_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "dng"
                    | "cr2"
                    | "crw"
                    | "nef"
                    | "nrw"
                    | "arw"
                    | "srf"
                    | "sr2"
                    | "raf"
                    | "orf"
                    | "rw2"
                    | "pef"
                    | "srw"
                    | "erf"
                    | "kdc"
                    | "dcr"
                    | "mrw"
                    | "3fr"
                    | "mef"
                    | "iiq"
            )
        })
        .unwrap_or(false)
}

fn load(path: &Path) -> Result<RawImage, BackendError> {
    debug!("Decoding raw file: {}", path.display());
    rawloader::decode_file(path).map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode raw {}: {:?}", path.display(), e))
    })
}

/// Active-area dimensions of a raw file (crops applied, before any shrink).
pub fn sensor_dimensions(path: &Path) -> Result<Dimensions, BackendError> {
    let raw = load(path)?;
    let area = ActiveArea::of(&raw);
    Ok(Dimensions {
        width: area.width as u32,
        height: area.height as u32,
    })
}

/// Decode a raw file, shrinking on load when `target_width` allows it.
pub fn decode(path: &Path, target_width: Option<u32>) -> Result<DynamicImage, BackendError> {
    let raw = load(path)?;
    let area = ActiveArea::of(&raw);
    let levels = Levels::of(&raw);

    let data: Vec<u16> = match &raw.data {
        RawImageData::Integer(data) => data.clone(),
        RawImageData::Float(data) => data.iter().map(|&f| f.clamp(0.0, 65535.0) as u16).collect(),
    };

    let half = target_width.is_none_or(|w| raw_half_size_fits(area.width as u32, w));
    debug!(
        "Raw {}x{} (cpp {}, cfa {:?}), half-size decode: {}",
        area.width, area.height, raw.cpp, raw.cfa.name, half
    );

    let rgb = match raw.cpp {
        1 => superpixel(&data, raw.width, &area, &raw.cfa, &levels)?,
        3 => linear_rgb(&data, raw.width, &area, &levels, half)?,
        n => {
            return Err(BackendError::UnsupportedFormat(format!(
                "{} has {n} components per pixel",
                path.display()
            )));
        }
    };

    let mut img = DynamicImage::ImageRgb8(rgb);
    if let Some(orientation) = Orientation::from_exif(raw.orientation.to_u16() as u8) {
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Region of the sensor holding real image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveArea {
    top: usize,
    left: usize,
    width: usize,
    height: usize,
}

impl ActiveArea {
    fn of(raw: &RawImage) -> Self {
        let [top, right, bottom, left] = raw.crops;
        Self::new(raw.width, raw.height, [top, right, bottom, left])
    }

    fn new(width: usize, height: usize, crops: [usize; 4]) -> Self {
        let [top, right, bottom, left] = crops;
        Self {
            top,
            left,
            width: width.saturating_sub(left + right),
            height: height.saturating_sub(top + bottom),
        }
    }
}

/// Per-CFA-color black point, white point, and white balance multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Levels {
    black: [f32; 4],
    white: [f32; 4],
    wb: [f32; 4],
}

impl Levels {
    fn of(raw: &RawImage) -> Self {
        Self::new(raw.blacklevels, raw.whitelevels, raw.wb_coeffs)
    }

    fn new(black: [u16; 4], white: [u16; 4], wb_coeffs: [f32; 4]) -> Self {
        // Multipliers are relative to green; missing coefficients mean neutral.
        let green = wb_coeffs[1];
        let wb = if green.is_finite() && green > 0.0 {
            wb_coeffs.map(|c| {
                let m = c / green;
                if m.is_finite() && m > 0.0 { m } else { 1.0 }
            })
        } else {
            [1.0; 4]
        };
        Self {
            black: black.map(f32::from),
            white: white.map(f32::from),
            wb,
        }
    }

    /// Linear 0..=1 value for a sample of CFA color `c`.
    fn normalize(&self, sample: u16, c: usize) -> f32 {
        let range = (self.white[c] - self.black[c]).max(1.0);
        ((f32::from(sample) - self.black[c]) / range).clamp(0.0, 1.0) * self.wb[c]
    }
}

fn encode(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(1.0 / DISPLAY_GAMMA) * 255.0).round() as u8
}

/// Map a CFA color index onto an RGB channel. The fourth color of
/// four-color sensors is a second green.
fn channel_of(color: usize) -> usize {
    match color {
        0 => 0,
        2 => 2,
        _ => 1,
    }
}

/// Half-size demosaic: one RGB pixel per 2×2 quad of the active area.
fn superpixel(
    data: &[u16],
    row_stride: usize,
    area: &ActiveArea,
    cfa: &CFA,
    levels: &Levels,
) -> Result<RgbImage, BackendError> {
    let out_w = area.width / 2;
    let out_h = area.height / 2;
    if out_w == 0 || out_h == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "Sensor area {}x{} is too small to demosaic",
            area.width, area.height
        )));
    }
    let monochrome = cfa.name.is_empty();

    let img = ImageBuffer::from_fn(out_w as u32, out_h as u32, |ox, oy| {
        let mut sums = [0f32; 3];
        let mut counts = [0u32; 3];
        for dy in 0..2 {
            for dx in 0..2 {
                let row = area.top + oy as usize * 2 + dy;
                let col = area.left + ox as usize * 2 + dx;
                let sample = data.get(row * row_stride + col).copied().unwrap_or(0);
                let color = if monochrome { 1 } else { cfa.color_at(row, col) };
                let ch = channel_of(color);
                sums[ch] += levels.normalize(sample, color.min(3));
                counts[ch] += 1;
            }
        }
        if monochrome {
            let v = encode(sums[1] / counts[1].max(1) as f32);
            return Rgb([v, v, v]);
        }
        Rgb([0, 1, 2].map(|ch| encode(sums[ch] / counts[ch].max(1) as f32)))
    });
    Ok(img)
}

/// Three-sample-per-pixel data, optionally box-averaged to half size.
fn linear_rgb(
    data: &[u16],
    row_stride: usize,
    area: &ActiveArea,
    levels: &Levels,
    half: bool,
) -> Result<RgbImage, BackendError> {
    let factor = if half { 2 } else { 1 };
    let out_w = area.width / factor;
    let out_h = area.height / factor;
    if out_w == 0 || out_h == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "Image area {}x{} is empty",
            area.width, area.height
        )));
    }

    let sample = |row: usize, col: usize, ch: usize| -> u16 {
        data.get((row * row_stride + col) * 3 + ch).copied().unwrap_or(0)
    };

    let img = ImageBuffer::from_fn(out_w as u32, out_h as u32, |ox, oy| {
        Rgb([0, 1, 2].map(|ch| {
            let mut sum = 0f32;
            for dy in 0..factor {
                for dx in 0..factor {
                    let row = area.top + oy as usize * factor + dy;
                    let col = area.left + ox as usize * factor + dx;
                    sum += levels.normalize(sample(row, col, ch), ch);
                }
            }
            encode(sum / (factor * factor) as f32)
        }))
    });
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn neutral_levels() -> Levels {
        Levels::new([0; 4], [1000; 4], [1.0; 4])
    }

    #[test]
    fn detects_raw_extensions() {
        for name in ["IMG.DNG", "a.cr2", "b.NEF", "c.arw", "d.raf", "e.orf", "f.rw2"] {
            assert!(is_raw_file(&PathBuf::from(name)), "{name}");
        }
        for name in ["photo.jpg", "photo.png", "photo.avif", "noext"] {
            assert!(!is_raw_file(&PathBuf::from(name)), "{name}");
        }
    }

    #[test]
    fn active_area_applies_crops() {
        let area = ActiveArea::new(100, 80, [2, 4, 6, 8]);
        assert_eq!(
            area,
            ActiveArea {
                top: 2,
                left: 8,
                width: 88,
                height: 72
            }
        );
    }

    #[test]
    fn active_area_saturates() {
        let area = ActiveArea::new(4, 4, [10, 10, 10, 10]);
        assert_eq!((area.width, area.height), (0, 0));
    }

    #[test]
    fn levels_normalize_against_black_and_white() {
        let levels = Levels::new([100; 4], [1100; 4], [1.0; 4]);
        assert_eq!(levels.normalize(100, 0), 0.0);
        assert_eq!(levels.normalize(50, 0), 0.0);
        assert_eq!(levels.normalize(600, 0), 0.5);
        assert_eq!(levels.normalize(5000, 0), 1.0);
    }

    #[test]
    fn white_balance_is_relative_to_green() {
        let levels = Levels::new([0; 4], [1000; 4], [2.0, 1.0, 1.5, f32::NAN]);
        assert_eq!(levels.wb, [2.0, 1.0, 1.5, 1.0]);
    }

    #[test]
    fn missing_white_balance_is_neutral() {
        let levels = Levels::new([0; 4], [1000; 4], [f32::NAN; 4]);
        assert_eq!(levels.wb, [1.0; 4]);
    }

    #[test]
    fn gamma_encode_endpoints() {
        assert_eq!(encode(0.0), 0);
        assert_eq!(encode(1.0), 255);
        assert_eq!(encode(2.0), 255);
        assert!(encode(0.5) > 128);
    }

    #[test]
    fn superpixel_halves_dimensions_and_separates_colors() {
        // RGGB with red saturated, greens dark, blue black.
        let width = 4;
        let data: Vec<u16> = vec![
            1000, 0, 1000, 0, //
            0, 0, 0, 0, //
            1000, 0, 1000, 0, //
            0, 0, 0, 0,
        ];
        let area = ActiveArea::new(4, 4, [0; 4]);
        let img = superpixel(&data, width, &area, &CFA::new("RGGB"), &neutral_levels()).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        for px in img.pixels() {
            assert_eq!(*px, Rgb([255, 0, 0]));
        }
    }

    #[test]
    fn superpixel_averages_both_greens() {
        let data: Vec<u16> = vec![0, 1000, 0, 0];
        let area = ActiveArea::new(2, 2, [0; 4]);
        let img = superpixel(&data, 2, &area, &CFA::new("RGGB"), &neutral_levels()).unwrap();
        let px = img.get_pixel(0, 0);
        assert_eq!(px[0], 0);
        assert_eq!(px[1], encode(0.5));
        assert_eq!(px[2], 0);
    }

    #[test]
    fn superpixel_rejects_tiny_area() {
        let area = ActiveArea::new(1, 1, [0; 4]);
        let result = superpixel(&[0], 1, &area, &CFA::new("RGGB"), &neutral_levels());
        assert!(result.is_err());
    }

    #[test]
    fn linear_rgb_full_and_half_size() {
        // 2x2 pixels, three samples each: all white.
        let data = vec![1000u16; 2 * 2 * 3];
        let area = ActiveArea::new(2, 2, [0; 4]);
        let full = linear_rgb(&data, 2, &area, &neutral_levels(), false).unwrap();
        assert_eq!(full.dimensions(), (2, 2));
        let half = linear_rgb(&data, 2, &area, &neutral_levels(), true).unwrap();
        assert_eq!(half.dimensions(), (1, 1));
        assert_eq!(*half.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn decode_rejects_non_raw_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("fake.dng");
        std::fs::write(&path, b"definitely not a raw file").unwrap();
        assert!(decode(&path, Some(100)).is_err());
    }
}
