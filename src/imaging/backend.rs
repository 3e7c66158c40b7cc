//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, convert, and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate with `rawloader` for camera raw files. Tests use the recording
//! `MockBackend` in this module so converter logic can be checked without
//! encoding anything.

use super::params::{ConvertParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Every backend must implement all three operations so the converter is
/// backend-agnostic.
pub trait ImageBackend {
    /// Get image dimensions (sensor dimensions for raw files).
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Re-encode at full size.
    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError>;

    /// Proportional resize then encode. Returns the written dimensions.
    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError>;
}
