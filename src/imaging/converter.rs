//! High-level conversion operations.
//!
//! [`ImageConverter`] decides which files to produce and where, builds the
//! parameter structs, and hands them to an [`ImageBackend`]. It never touches
//! pixels itself.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    converted_output_path, file_stem, sized_output_path, variant_output_path,
};
use super::params::{ConvertParams, EncodeSettings, OutputFormat, ResizeParams, Sharpening};
use super::rust_backend::RustBackend;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extra widths emitted on request, labeled `"{width}w"`.
pub const EXTRA_WIDTHS: [u32; 3] = [400, 800, 1600];

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input image not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to {operation} {}: {cause}", .source_path.display())]
    Failed {
        operation: &'static str,
        source_path: PathBuf,
        #[source]
        cause: BackendError,
    },
    #[error("Failed to generate {label} size: {cause}")]
    Size {
        label: String,
        #[source]
        cause: Box<ConvertError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// One `(label, width)` pair of a [`SizePlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEntry {
    pub label: String,
    pub width: u32,
}

/// Ordered set of labeled target widths.
///
/// Labels are unique: setting an existing label replaces its width in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePlan {
    entries: Vec<SizeEntry>,
}

impl SizePlan {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, label: impl Into<String>, width: u32) -> Self {
        self.set(label, width);
        self
    }

    pub fn set(&mut self, label: impl Into<String>, width: u32) {
        let label = label.into();
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.width = width,
            None => self.entries.push(SizeEntry { label, width }),
        }
    }

    /// The [`EXTRA_WIDTHS`] as a plan.
    pub fn extra_widths() -> Self {
        EXTRA_WIDTHS
            .iter()
            .fold(Self::empty(), |plan, &w| plan.with(format!("{w}w"), w))
    }

    pub fn width(&self, label: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.width)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SizePlan {
    /// `thumbnail=350`, `collection=700`, `display=1400`.
    fn default() -> Self {
        Self::empty()
            .with("thumbnail", 350)
            .with("collection", 700)
            .with("display", 1400)
    }
}

/// Generated image variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariant {
    pub label: String,
    pub width: u32,
    pub path: PathBuf,
}

/// Everything one [`ImageConverter::generate_responsive_sizes`] call wrote,
/// in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsiveOutputs {
    variants: Vec<GeneratedVariant>,
}

impl ResponsiveOutputs {
    pub fn get(&self, label: &str) -> Option<&Path> {
        self.variants
            .iter()
            .find(|v| v.label == label)
            .map(|v| v.path.as_path())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.label.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeneratedVariant> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResponsiveOutputs {
    type Item = &'a GeneratedVariant;
    type IntoIter = std::slice::Iter<'a, GeneratedVariant>;

    fn into_iter(self) -> Self::IntoIter {
        self.variants.iter()
    }
}

/// Converts source images into web variants with fixed encoder settings.
pub struct ImageConverter<B: ImageBackend = RustBackend> {
    backend: B,
    settings: EncodeSettings,
}

impl ImageConverter<RustBackend> {
    pub fn new(settings: EncodeSettings) -> Self {
        Self::with_backend(RustBackend::new(), settings)
    }
}

impl<B: ImageBackend> ImageConverter<B> {
    pub fn with_backend(backend: B, settings: EncodeSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Source dimensions as stored (sensor size for camera raw files).
    pub fn identify(&self, source: &Path) -> Result<Dimensions> {
        ensure_exists(source)?;
        self.backend
            .identify(source)
            .map_err(|cause| ConvertError::Failed {
                operation: "identify",
                source_path: source.to_path_buf(),
                cause,
            })
    }

    /// Re-encode `source` at full size.
    ///
    /// Writes to `destination`, or next to the source with the format's
    /// extension. Returns the written path.
    pub fn convert(
        &self,
        source: &Path,
        destination: Option<&Path>,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        ensure_exists(source)?;
        let output = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| converted_output_path(source, format));

        self.backend
            .convert(&ConvertParams {
                source: source.to_path_buf(),
                output: output.clone(),
                format,
                settings: self.settings,
            })
            .map_err(|cause| ConvertError::Failed {
                operation: "convert",
                source_path: source.to_path_buf(),
                cause,
            })?;

        info!("Converted {} -> {}", source.display(), output.display());
        Ok(output)
    }

    /// Plan a resize without executing it.
    pub fn plan_resize(
        &self,
        source: &Path,
        width: u32,
        destination: Option<&Path>,
        format: OutputFormat,
    ) -> ResizeParams {
        ResizeParams {
            source: source.to_path_buf(),
            output: destination
                .map(Path::to_path_buf)
                .unwrap_or_else(|| sized_output_path(source, width, format)),
            width,
            format,
            settings: self.settings,
            sharpening: self.settings.sharpen.then(Sharpening::mild),
        }
    }

    /// Resize `source` to `width` (height proportional) and encode.
    pub fn resize_and_convert(
        &self,
        source: &Path,
        width: u32,
        destination: Option<&Path>,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        ensure_exists(source)?;
        let params = self.plan_resize(source, width, destination, format);

        let dims = self
            .backend
            .resize(&params)
            .map_err(|cause| ConvertError::Failed {
                operation: "resize",
                source_path: source.to_path_buf(),
                cause,
            })?;

        info!(
            "Resized {} -> {} ({}x{})",
            source.display(),
            params.output.display(),
            dims.width,
            dims.height
        );
        Ok(params.output)
    }

    /// Produce every variant of `plan` (default [`SizePlan::default`]) into
    /// `output_dir`, then the [`EXTRA_WIDTHS`] when requested.
    ///
    /// Stops at the first failure.
    pub fn generate_responsive_sizes(
        &self,
        source: &Path,
        output_dir: &Path,
        format: OutputFormat,
        plan: Option<&SizePlan>,
        include_extra_widths: bool,
    ) -> Result<ResponsiveOutputs> {
        ensure_exists(source)?;
        fs::create_dir_all(output_dir)?;

        let default_plan = SizePlan::default();
        let plan = plan.unwrap_or(&default_plan);
        let extra = if include_extra_widths {
            SizePlan::extra_widths()
        } else {
            SizePlan::empty()
        };

        let stem = file_stem(source);
        let mut outputs = ResponsiveOutputs::default();
        for SizeEntry { label, width } in plan.iter().chain(extra.iter()) {
            let destination = variant_output_path(output_dir, &stem, label, format);
            let path = self
                .resize_and_convert(source, *width, Some(&destination), format)
                .map_err(|cause| ConvertError::Size {
                    label: label.clone(),
                    cause: Box::new(cause),
                })?;
            outputs.variants.push(GeneratedVariant {
                label: label.clone(),
                width: *width,
                path,
            });
        }
        Ok(outputs)
    }
}

fn ensure_exists(source: &Path) -> Result<()> {
    if source.exists() {
        Ok(())
    } else {
        Err(ConvertError::NotFound(source.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::params::Quality;
    use crate::test_helpers::create_test_jpeg;
    use tempfile::TempDir;

    fn mock_converter() -> ImageConverter<MockBackend> {
        ImageConverter::with_backend(MockBackend::new(), EncodeSettings::default())
    }

    fn source_in(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("R0012110.jpg");
        std::fs::write(&path, b"placeholder").unwrap();
        path
    }

    // =========================================================================
    // SizePlan
    // =========================================================================

    #[test]
    fn default_plan_order_and_widths() {
        let plan = SizePlan::default();
        let pairs: Vec<_> = plan.iter().map(|e| (e.label.as_str(), e.width)).collect();
        assert_eq!(
            pairs,
            vec![("thumbnail", 350), ("collection", 700), ("display", 1400)]
        );
    }

    #[test]
    fn set_existing_label_replaces_in_place() {
        let plan = SizePlan::default().with("collection", 900);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.width("collection"), Some(900));
        assert_eq!(plan.iter().nth(1).unwrap().label, "collection");
    }

    #[test]
    fn extra_widths_are_labeled() {
        let plan = SizePlan::extra_widths();
        let labels: Vec<_> = plan.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["400w", "800w", "1600w"]);
        assert_eq!(plan.width("800w"), Some(800));
    }

    // =========================================================================
    // convert / resize_and_convert
    // =========================================================================

    #[test]
    fn identify_goes_through_backend() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = ImageConverter::with_backend(
            MockBackend::with_dimensions(6000, 4000),
            EncodeSettings::default(),
        );

        let dims = converter.identify(&source).unwrap();
        assert_eq!(dims, Dimensions { width: 6000, height: 4000 });
        assert_eq!(
            converter.backend().get_operations(),
            vec![RecordedOp::Identify(source.to_string_lossy().to_string())]
        );
    }

    #[test]
    fn identify_missing_source_is_not_found() {
        let converter = mock_converter();
        let result = converter.identify(Path::new("/nonexistent/R0012110.DNG"));
        assert!(matches!(result, Err(ConvertError::NotFound(_))));
        assert!(converter.backend().get_operations().is_empty());
    }

    #[test]
    fn identify_undecodable_source_names_operation() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"not a jpeg").unwrap();

        let err = ImageConverter::new(EncodeSettings::default())
            .identify(&source)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Failed { operation: "identify", .. }));
    }

    #[test]
    fn convert_missing_source_never_reaches_backend() {
        let converter = mock_converter();
        let result = converter.convert(Path::new("/nonexistent/a.dng"), None, OutputFormat::Avif);
        assert!(matches!(result, Err(ConvertError::NotFound(_))));
        assert!(converter.backend().get_operations().is_empty());
    }

    #[test]
    fn convert_defaults_to_sibling_path() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = mock_converter();

        let out = converter.convert(&source, None, OutputFormat::WebP).unwrap();
        assert_eq!(out, tmp.path().join("R0012110.webp"));

        let ops = converter.backend().get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Convert { format: OutputFormat::WebP, quality: 85, .. }
        ));
    }

    #[test]
    fn resize_defaults_to_width_suffix() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = mock_converter();

        let out = converter
            .resize_and_convert(&source, 800, None, OutputFormat::Avif)
            .unwrap();
        assert_eq!(out, tmp.path().join("R0012110-800w.avif"));
    }

    #[test]
    fn resize_applies_mild_sharpening_only_when_enabled() {
        let source = Path::new("a.jpg");
        let sharp = mock_converter().plan_resize(source, 350, None, OutputFormat::Avif);
        assert_eq!(sharp.sharpening, Some(Sharpening::mild()));

        let soft = ImageConverter::with_backend(
            MockBackend::new(),
            EncodeSettings {
                sharpen: false,
                ..EncodeSettings::default()
            },
        )
        .plan_resize(source, 350, None, OutputFormat::Avif);
        assert_eq!(soft.sharpening, None);
    }

    #[test]
    fn resize_failure_names_operation() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = ImageConverter::with_backend(MockBackend::failing_at(350), EncodeSettings::default());

        let err = converter
            .resize_and_convert(&source, 350, None, OutputFormat::Avif)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Failed { operation: "resize", .. }));
        assert!(err.to_string().starts_with("Failed to resize"));
    }

    // =========================================================================
    // generate_responsive_sizes
    // =========================================================================

    #[test]
    fn responsive_default_plan() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let out_dir = tmp.path().join("converted");
        let converter = mock_converter();

        let outputs = converter
            .generate_responsive_sizes(&source, &out_dir, OutputFormat::Avif, None, false)
            .unwrap();

        assert_eq!(outputs.labels(), vec!["thumbnail", "collection", "display"]);
        assert_eq!(
            outputs.get("display"),
            Some(out_dir.join("R0012110-display.avif").as_path())
        );
        assert!(out_dir.is_dir());
        assert_eq!(converter.backend().resize_widths(), vec![350, 700, 1400]);
    }

    #[test]
    fn responsive_heights_preserve_aspect_and_widths_increase() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter =
            ImageConverter::with_backend(MockBackend::with_dimensions(6000, 4000), EncodeSettings::default());

        converter
            .generate_responsive_sizes(&source, tmp.path(), OutputFormat::Avif, None, false)
            .unwrap();

        let dims: Vec<(u32, u32)> = converter
            .backend()
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Resize { width, height, .. } => Some((width, height)),
                _ => None,
            })
            .collect();
        assert_eq!(dims, vec![(350, 233), (700, 467), (1400, 933)]);
        assert!(dims.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn responsive_with_extra_widths() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = mock_converter();

        let outputs = converter
            .generate_responsive_sizes(&source, tmp.path(), OutputFormat::Avif, None, true)
            .unwrap();

        assert_eq!(outputs.len(), 6);
        assert_eq!(
            outputs.labels(),
            vec!["thumbnail", "collection", "display", "400w", "800w", "1600w"]
        );
        assert!(outputs.get("1600w").unwrap().ends_with("R0012110-1600w.avif"));
    }

    #[test]
    fn responsive_custom_plan_order_preserved() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let plan = SizePlan::empty().with("hero", 2000).with("tiny", 64);
        let converter = mock_converter();

        let outputs = converter
            .generate_responsive_sizes(&source, tmp.path(), OutputFormat::Png, Some(&plan), false)
            .unwrap();
        assert_eq!(outputs.labels(), vec!["hero", "tiny"]);
        assert!(outputs.get("tiny").unwrap().ends_with("R0012110-tiny.png"));
    }

    #[test]
    fn responsive_missing_source_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let converter = mock_converter();
        let result = converter.generate_responsive_sizes(
            &tmp.path().join("gone.dng"),
            &tmp.path().join("out"),
            OutputFormat::Avif,
            None,
            false,
        );
        assert!(matches!(result, Err(ConvertError::NotFound(_))));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn responsive_failure_is_fail_fast_with_label() {
        let tmp = TempDir::new().unwrap();
        let source = source_in(&tmp);
        let converter = ImageConverter::with_backend(MockBackend::failing_at(700), EncodeSettings::default());

        let err = converter
            .generate_responsive_sizes(&source, tmp.path(), OutputFormat::Avif, None, true)
            .unwrap_err();

        match &err {
            ConvertError::Size { label, .. } => assert_eq!(label, "collection"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("Failed to generate collection size"));
        // display and the extra widths were never attempted
        assert_eq!(converter.backend().resize_widths(), vec![350, 700]);
    }

    #[test]
    fn real_backend_writes_every_variant() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("street.jpg");
        create_test_jpeg(&source, 120, 80);
        let plan = SizePlan::empty().with("thumbnail", 30).with("display", 60);
        let converter = ImageConverter::new(EncodeSettings {
            quality: Quality::new(50),
            ..EncodeSettings::default()
        });

        let outputs = converter
            .generate_responsive_sizes(&source, &tmp.path().join("out"), OutputFormat::Png, Some(&plan), false)
            .unwrap();

        assert_eq!(image::image_dimensions(outputs.get("thumbnail").unwrap()).unwrap(), (30, 20));
        assert_eq!(image::image_dimensions(outputs.get("display").unwrap()).unwrap(), (60, 40));
    }
}
