//! # edgequake-export
//!
//! Export an ordered list of content sections to a paginated PDF or a 16:9
//! slide deck, one page or slide per section, by rasterising each section.
//!
//! ## Why rasterise?
//!
//! Sections are visual blocks: gradients, photos, custom fonts, overlapping
//! layers. Re-expressing that as native PDF or PPTX drawing operations loses
//! fidelity in a hundred small ways. Capturing each section as a bitmap and
//! placing the bitmap on its own page or slide keeps exactly what was
//! rendered, at the cost of selectable text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! sections
//!  │
//!  ├─ 1. Prepare   clone sections, mark remote images cross-origin
//!  ├─ 2. Ready     wait for fonts and every image to load or fail
//!  ├─ 3. Capture   rasterise one section at min(2, 1600 / long edge)
//!  ├─ 4. Fit       aspect-fit: flush on a page, centered on a slide
//!  ├─ 5. Assemble  lopdf (PDF) or OOXML zip (PPTX)
//!  └─ 6. Save      hand the finished artifact to a sink
//! ```
//!
//! [`ExportController`] wraps the pipeline with single-flight semantics: a
//! second trigger while a job runs is dropped, and every outcome returns the
//! controller to idle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_export::{ContentSection, ExportConfig, ExportContext, ExportController, ExportKind, ImageLayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder().output_dir("out").build()?;
//!     let controller = ExportController::new(ExportContext::new(config)?);
//!
//!     let sections = vec![
//!         ContentSection::sized(1600, 900)
//!             .with_background("#0b1d3a")
//!             .with_layer(ImageLayer::new("hero.png").sized(1600.0, 900.0)),
//!         ContentSection::sized(800, 1200),
//!     ];
//!     let outcome = controller.trigger(ExportKind::Pdf, &sections).await;
//!     if let Some(report) = outcome.report() {
//!         println!("wrote {}", report.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sections2doc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-export = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod section;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{new_assembler, Artifact, DeckAssembler, DocumentAssembler, PdfAssembler};
pub use config::{ExportConfig, ExportConfigBuilder, PageSize};
pub use controller::{ExportController, ExportState, TriggerOutcome};
pub use error::{ExportError, Notice};
pub use export::{plan_export, run_export, ExportContext, ExportReport, SectionPlan};
pub use manifest::{load_manifest, Manifest};
pub use pipeline::capture::{CaptureResult, CompositeRasterizer, Rasterizer};
pub use pipeline::fit::PlacementGeometry;
pub use pipeline::input::{ImageLoader, SourceLoader};
pub use pipeline::readiness::{FontFiles, FontReadiness, FontsReady};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use section::{ContentSection, CrossOrigin, ExportKind, ImageLayer};
pub use sink::{ArtifactSink, DirectorySink, LogNotices, MemoryNotices, MemorySink, NoticeSink};
