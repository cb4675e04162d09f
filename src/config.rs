//! Configuration types for section export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The defaults reproduce the fixed output geometry
//! both document formats promise (20 × 11.25 in pages, 10 × 5.625 in slides,
//! 96 px per inch) so most callers only touch the output directory.

use crate::error::ExportError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Width × height of a destination page or slide, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// Custom borderless landscape page used by the paginated document.
    pub const PRINT_LANDSCAPE: PageSize = PageSize {
        width: 20.0,
        height: 11.25,
    };

    /// Standard 16:9 slide.
    pub const SLIDE_16X9: PageSize = PageSize {
        width: 10.0,
        height: 5.625,
    };
}

/// Configuration for an export job.
///
/// # Example
/// ```rust
/// use edgequake_export::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .output_dir("out")
///     .title("Quarterly review")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_capture_edge, 1600);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Target long edge of a capture, in source pixels. Default: 1600.
    ///
    /// `scale = min(max_oversample, max_capture_edge / max(w, h))` so large
    /// sections are downsampled to bound buffer size and small ones are
    /// oversampled for sharper output.
    pub max_capture_edge: u32,

    /// Upper bound on the capture scale. Default: 2.0.
    pub max_oversample: f32,

    /// Size assumed for sections without a measurable size. Default: 1600 × 900.
    pub fallback_size: (u32, u32),

    /// Page geometry of the paginated document. Default: 20 × 11.25 in.
    pub page: PageSize,

    /// Slide geometry of the deck. Default: 10 × 5.625 in.
    pub slide: PageSize,

    /// Pixel density used to convert captures to slide inches. Default: 96.
    pub pixels_per_inch: f64,

    /// JPEG quality for PDF page images (1–100). Default: 92.
    pub jpeg_quality: u8,

    /// File name of the paginated artifact. Default: `presentation.pdf`.
    pub pdf_file_name: String,

    /// File name of the deck artifact. Default: `presentation.pptx`.
    pub deck_file_name: String,

    /// Directory the default sink saves artifacts into. Default: `.`.
    pub output_dir: PathBuf,

    /// Document title written into PDF / PPTX metadata.
    pub title: Option<String>,

    /// Origin the content is served from (e.g. `https://example.com`).
    ///
    /// HTTP(S) images from any other origin are remote and get a cross-origin
    /// attribute before loading. With `None`, every HTTP(S) image is remote.
    pub document_origin: Option<String>,

    /// Upper bound on the readiness wait. Default: `None` (wait forever).
    ///
    /// An image that never settles otherwise suspends the job indefinitely.
    pub readiness_timeout: Option<Duration>,

    /// Download timeout for remote images, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-section progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_capture_edge: 1600,
            max_oversample: 2.0,
            fallback_size: (1600, 900),
            page: PageSize::PRINT_LANDSCAPE,
            slide: PageSize::SLIDE_16X9,
            pixels_per_inch: 96.0,
            jpeg_quality: 92,
            pdf_file_name: "presentation.pdf".to_string(),
            deck_file_name: "presentation.pptx".to_string(),
            output_dir: PathBuf::from("."),
            title: None,
            document_origin: None,
            readiness_timeout: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("max_capture_edge", &self.max_capture_edge)
            .field("max_oversample", &self.max_oversample)
            .field("fallback_size", &self.fallback_size)
            .field("page", &self.page)
            .field("slide", &self.slide)
            .field("pixels_per_inch", &self.pixels_per_inch)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("pdf_file_name", &self.pdf_file_name)
            .field("deck_file_name", &self.deck_file_name)
            .field("output_dir", &self.output_dir)
            .field("title", &self.title)
            .field("document_origin", &self.document_origin)
            .field("readiness_timeout", &self.readiness_timeout)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// File name used for the given artifact kind.
    pub fn file_name(&self, kind: crate::section::ExportKind) -> &str {
        match kind {
            crate::section::ExportKind::Pdf => &self.pdf_file_name,
            crate::section::ExportKind::Deck => &self.deck_file_name,
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn max_capture_edge(mut self, px: u32) -> Self {
        self.config.max_capture_edge = px.max(100);
        self
    }

    pub fn max_oversample(mut self, factor: f32) -> Self {
        self.config.max_oversample = factor.clamp(0.1, 4.0);
        self
    }

    pub fn fallback_size(mut self, width: u32, height: u32) -> Self {
        self.config.fallback_size = (width, height);
        self
    }

    pub fn page(mut self, page: PageSize) -> Self {
        self.config.page = page;
        self
    }

    pub fn slide(mut self, slide: PageSize) -> Self {
        self.config.slide = slide;
        self
    }

    pub fn pixels_per_inch(mut self, ppi: f64) -> Self {
        self.config.pixels_per_inch = ppi;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn pdf_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.pdf_file_name = name.into();
        self
    }

    pub fn deck_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.deck_file_name = name.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn document_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.document_origin = Some(origin.into());
        self
    }

    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.config.readiness_timeout = Some(timeout);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if c.fallback_size.0 == 0 || c.fallback_size.1 == 0 {
            return Err(ExportError::InvalidConfig(format!(
                "Fallback size must be non-zero, got {}x{}",
                c.fallback_size.0, c.fallback_size.1
            )));
        }
        for (name, size) in [("Page", c.page), ("Slide", c.slide)] {
            if !(size.width > 0.0 && size.height > 0.0) {
                return Err(ExportError::InvalidConfig(format!(
                    "{name} size must be positive, got {}x{}",
                    size.width, size.height
                )));
            }
        }
        if !(c.pixels_per_inch > 0.0) {
            return Err(ExportError::InvalidConfig(format!(
                "Pixels per inch must be positive, got {}",
                c.pixels_per_inch
            )));
        }
        if c.pdf_file_name.trim().is_empty() || c.deck_file_name.trim().is_empty() {
            return Err(ExportError::InvalidConfig(
                "Output file names must not be empty".into(),
            ));
        }
        if let Some(ref origin) = c.document_origin {
            if reqwest::Url::parse(origin).is_err() {
                return Err(ExportError::InvalidConfig(format!(
                    "Document origin '{origin}' is not a valid URL"
                )));
            }
        }
        Ok(self.config)
    }
}
