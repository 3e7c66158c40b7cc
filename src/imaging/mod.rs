//! Image conversion: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions`, `rawloader` for raw files |
//! | **Raw decode** | `rawloader` + half-size superpixel demosaic |
//! | **Resize** | Lanczos3 + `unsharpen(1.0, 2)` |
//! | **Encode** | rav1e (AVIF), `image` encoders (WebP, JPEG, PNG) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and output naming (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Converter**: [`ImageConverter`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod converter;
mod params;
pub mod raw;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    file_stem, proportional_height, rav1e_speed, resolve_subsampling, sized_output_path,
    variant_output_path,
};
pub use converter::{
    ConvertError, EXTRA_WIDTHS, GeneratedVariant, ImageConverter, ResponsiveOutputs, SizeEntry,
    SizePlan,
};
pub use params::{
    ChromaSubsampling, ConvertParams, Effort, EncodeSettings, OutputFormat, Quality, ResizeParams,
    Sharpening,
};
pub use rust_backend::{RustBackend, is_supported_input, supported_input_extensions};
