//! # filmstrip
//!
//! A photo pipeline that turns camera originals into the assets a static
//! gallery site needs: EXIF metadata, resized web variants, and YAML
//! collection descriptors.
//!
//! # Pipeline
//!
//! ```text
//! 1. Extract   raw/IMG.DNG       →  PhotoMetadata            (EXIF tags → portfolio fields)
//! 2. Convert   raw/IMG.DNG       →  converted/IMG-{label}.avif + IMG-metadata.json
//! 3. Describe  converted/        →  collections/{name}.yaml  (entries with variant URLs)
//! ```
//!
//! The stages only share files on disk. Conversion writes a JSON sidecar next
//! to the variants, so descriptors can be built later without the raw file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`exif`] | Reads the EXIF block of a file into a flat, prefixed tag map |
//! | [`metadata`] | Picks portfolio fields out of the tag map; JSON sidecar files |
//! | [`imaging`] | Raw and regular decoding, Lanczos3 resize, AVIF/WebP/JPEG/PNG encoding |
//! | [`formatting`] | Aperture, shutter, focal length and ISO display strings |
//! | [`collection`] | Collection YAML model, entry building, id assignment |
//! | [`scan`] | Flat directory listings of sources and converted stems |
//! | [`config`] | `pipeline.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Raw sensor data is decoded with `rawloader`, everything else with the
//! `image` crate, and AVIF is encoded with `rav1e` through `image`. No
//! ImageMagick, no libvips, no system libraries.
//!
//! ## Half-Size Raw Decoding
//!
//! Web variants top out at a fraction of a sensor's width, so Bayer data is
//! demosaiced by collapsing each 2×2 quad into one RGB pixel. That is four
//! times less work than full interpolation and avoids its artifacts.
//!
//! ## Stable Ids
//!
//! Collection entries get `photo-NNN` ids in file-name order. Appending to a
//! collection continues from the highest number in use and skips images
//! already present, so re-running a command never duplicates an entry.

pub mod collection;
pub mod config;
pub mod exif;
pub mod formatting;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
