//! One export job, start to finish.
//!
//! ## Why strictly sequential?
//!
//! Every capture holds a full bitmap, and every page/slide must land in input
//! order. Capturing one section, placing it and dropping the bitmap before
//! the next one starts keeps at most one capture in memory and makes the
//! page order trivially correct. The only fan-out is the readiness gate,
//! which waits on all image loads together.
//!
//! [`run_export`] has no notion of single-flight; that is the controller's
//! job. It either returns a report for an artifact that has been handed to
//! the sink, or an error with nothing saved.

use crate::assemble::new_assembler;
use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::pipeline::capture::{capture_scale, capture_size, CompositeRasterizer, Rasterizer, SectionCapture};
use crate::pipeline::fit::{fit_page, fit_slide, PlacementGeometry};
use crate::pipeline::input::{ImageLoader, SourceLoader};
use crate::pipeline::readiness::{prepare_sections, FontReadiness, FontsReady, ReadinessGate};
use crate::section::{ContentSection, ExportKind};
use crate::sink::{ArtifactSink, DirectorySink, LogNotices, NoticeSink};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Configuration plus every collaborator a job needs.
///
/// Defaults: [`CompositeRasterizer`], [`SourceLoader`], [`FontsReady`], a
/// [`DirectorySink`] on `config.output_dir`, and [`LogNotices`].
#[derive(Clone)]
pub struct ExportContext {
    config: ExportConfig,
    rasterizer: Arc<dyn Rasterizer>,
    loader: Arc<dyn ImageLoader>,
    fonts: Arc<dyn FontReadiness>,
    sink: Arc<dyn ArtifactSink>,
    notices: Arc<dyn NoticeSink>,
}

impl ExportContext {
    pub fn new(config: ExportConfig) -> Result<Self, ExportError> {
        let loader = SourceLoader::new(config.download_timeout_secs)?;
        let sink = DirectorySink::new(config.output_dir.clone());
        Ok(Self {
            config,
            rasterizer: Arc::new(CompositeRasterizer),
            loader: Arc::new(loader),
            fonts: Arc::new(FontsReady),
            sink: Arc::new(sink),
            notices: Arc::new(LogNotices),
        })
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<dyn FontReadiness>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = notices;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn notices(&self) -> &dyn NoticeSink {
        self.notices.as_ref()
    }
}

impl fmt::Debug for ExportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub kind: ExportKind,
    /// Pages or slides written; always the number of input sections.
    pub sections: usize,
    /// Size of the saved artifact.
    pub bytes: usize,
    /// Where the sink put the artifact.
    pub path: PathBuf,
    /// Image sources that settled with a failure and were drawn as nothing.
    pub failed_images: usize,
    pub readiness_duration_ms: u64,
    pub capture_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Run one export of `sections` as `kind`.
///
/// # Errors
/// [`ExportError::EmptyContent`] for an empty slice. Any readiness, capture,
/// assembly or save error aborts the job; the sink is never called after a
/// failure.
pub async fn run_export(
    kind: ExportKind,
    sections: &[ContentSection],
    ctx: &ExportContext,
) -> Result<ExportReport, ExportError> {
    let result = run_job(kind, sections, ctx).await;
    if let (Err(e), Some(cb)) = (&result, &ctx.config.progress_callback) {
        cb.on_export_failed(kind, &e.to_string());
    }
    result
}

async fn run_job(
    kind: ExportKind,
    sections: &[ContentSection],
    ctx: &ExportContext,
) -> Result<ExportReport, ExportError> {
    let total_start = Instant::now();
    let config = &ctx.config;

    // ── Step 1: Precondition ─────────────────────────────────────────────
    if sections.is_empty() {
        return Err(ExportError::EmptyContent);
    }
    let total = sections.len();
    info!("Starting {} export of {} section(s)", kind, total);

    // ── Step 2: Isolated copies ──────────────────────────────────────────
    let prepared = prepare_sections(sections, config);

    // ── Step 3: Readiness gate ───────────────────────────────────────────
    let readiness_start = Instant::now();
    let gate = ReadinessGate::new(ctx.fonts.as_ref(), ctx.loader.as_ref(), config);
    let resources = gate.wait(&prepared).await?;
    let readiness_duration_ms = readiness_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(kind, total);
    }

    // ── Step 4: Capture → fit → append, one section at a time ────────────
    let capture_start = Instant::now();
    let capture = SectionCapture::new(ctx.rasterizer.as_ref(), config);
    let mut assembler = new_assembler(kind, config);
    for section in &prepared {
        if let Some(ref cb) = config.progress_callback {
            cb.on_section_start(section.index, total);
        }
        let result = capture.capture(section, &resources).await?;
        let px = result.dimensions();
        let placement = assembler.append(result)?;
        debug!(
            "Section {}/{} placed at ({:.3}, {:.3})",
            section.index + 1,
            total,
            placement.x,
            placement.y
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_section_complete(section.index, total, px);
        }
    }
    let capture_duration_ms = capture_start.elapsed().as_millis() as u64;

    // ── Step 5: Finalize ─────────────────────────────────────────────────
    let artifact = assembler.finalize().await?;

    // ── Step 6: Hand over ────────────────────────────────────────────────
    let path = ctx.sink.save(&artifact).await?;

    let report = ExportReport {
        kind,
        sections: total,
        bytes: artifact.bytes.len(),
        path,
        failed_images: resources.failed_count(),
        readiness_duration_ms,
        capture_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "{} export complete: {} section(s), {} bytes, {}ms total",
        kind, report.sections, report.bytes, report.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(kind, report.bytes);
    }
    Ok(report)
}

/// Dry-run geometry for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Intrinsic size after the fallback.
    pub size: (u32, u32),
    /// True when the section was unmeasurable and got the fallback size.
    pub fallback: bool,
    pub scale: f32,
    pub capture_px: (u32, u32),
    pub placement: PlacementGeometry,
}

/// Compute scale, capture size and placement for every section without
/// loading or drawing anything.
pub fn plan_export(kind: ExportKind, sections: &[ContentSection], config: &ExportConfig) -> Vec<SectionPlan> {
    sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let size = section.intrinsic_size(config.fallback_size);
            let scale = capture_scale(size.0, size.1, config);
            let capture_px = capture_size(size.0, size.1, scale);
            let placement = match kind {
                ExportKind::Pdf => fit_page(config.page, capture_px),
                ExportKind::Deck => fit_slide(config.slide, capture_px, config.pixels_per_inch),
            };
            SectionPlan {
                index,
                id: section.id.clone(),
                size,
                fallback: section.intrinsic_size((0, 0)) == (0, 0),
                scale,
                capture_px,
                placement,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_matches_capture_rules() {
        let sections = vec![
            ContentSection::sized(1600, 900),
            ContentSection::sized(800, 1200),
            ContentSection::sized(3200, 900),
            ContentSection::default().with_id("unmeasured"),
        ];
        let plan = plan_export(ExportKind::Pdf, &sections, &ExportConfig::default());

        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].scale, 1.0);
        assert!((plan[1].scale - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(plan[1].capture_px, (1067, 1600));
        assert_eq!(plan[2].scale, 0.5);
        assert_eq!(plan[2].capture_px, (1600, 450));

        assert!(plan[3].fallback);
        assert_eq!(plan[3].size, (1600, 900));
        assert_eq!(plan[3].id.as_deref(), Some("unmeasured"));
        assert!(plan.iter().all(|p| p.placement.x == 0.0 && p.placement.y == 0.0));
    }

    #[test]
    fn deck_plan_is_centered() {
        let plan = plan_export(
            ExportKind::Deck,
            &[ContentSection::sized(800, 1200)],
            &ExportConfig::default(),
        );
        let g = plan[0].placement;
        assert!((g.x - (10.0 - g.width) / 2.0).abs() < 1e-9);
        assert!(g.x > 0.0);
    }

    #[test]
    fn report_serialises_kind_lowercase() {
        let report = ExportReport {
            kind: ExportKind::Deck,
            sections: 2,
            bytes: 10,
            path: PathBuf::from("presentation.pptx"),
            failed_images: 0,
            readiness_duration_ms: 1,
            capture_duration_ms: 2,
            total_duration_ms: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "deck");
        assert_eq!(json["sections"], 2);
    }
}
