//! Slide output: one 16:9 slide per section, picture centered.
//!
//! The deck is an OOXML presentation package (`.pptx`): a zip container of
//! XML parts plus one PNG per slide under `ppt/media/`. Slide geometry comes
//! from [`fit_slide`], which works in inches at the configured pixel density;
//! the XML stores it in EMU.

use crate::assemble::deck_xml as xml;
use crate::assemble::{Artifact, DocumentAssembler};
use crate::config::{ExportConfig, PageSize};
use crate::error::ExportError;
use crate::pipeline::capture::CaptureResult;
use crate::pipeline::encode::encode_png;
use crate::pipeline::fit::{fit_slide, PlacementGeometry};
use crate::section::ExportKind;
use futures::future::BoxFuture;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn assembly_error(detail: impl ToString) -> ExportError {
    ExportError::AssemblyFailed {
        format: ExportKind::Deck,
        detail: detail.to_string(),
    }
}

struct Slide {
    png: Vec<u8>,
    placement: PlacementGeometry,
}

/// Builds the slide deck slide by slide.
pub struct DeckAssembler {
    slides: Vec<Slide>,
    slide: PageSize,
    pixels_per_inch: f64,
    file_name: String,
    title: Option<String>,
}

impl DeckAssembler {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            slides: Vec::new(),
            slide: config.slide,
            pixels_per_inch: config.pixels_per_inch,
            file_name: config.deck_file_name.clone(),
            title: config.title.clone(),
        }
    }
}

impl DocumentAssembler for DeckAssembler {
    fn append(&mut self, capture: CaptureResult) -> Result<PlacementGeometry, ExportError> {
        let placement = fit_slide(self.slide, capture.dimensions(), self.pixels_per_inch);
        let png = encode_png(&capture.pixels).map_err(assembly_error)?;

        self.slides.push(Slide { png, placement });
        debug!(
            "Slide {}: {}x{} px at ({:.3}, {:.3}) {:.3}x{:.3} in",
            self.slides.len(),
            capture.width(),
            capture.height(),
            placement.x,
            placement.y,
            placement.width,
            placement.height
        );
        Ok(placement)
    }

    fn len(&self) -> usize {
        self.slides.len()
    }

    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<Artifact, ExportError>> {
        let DeckAssembler {
            slides,
            slide,
            file_name,
            title,
            ..
        } = *self;

        Box::pin(async move {
            if slides.is_empty() {
                return Err(assembly_error("deck has no slides"));
            }
            let count = slides.len();

            let bytes = tokio::task::spawn_blocking(move || {
                write_package(&slides, slide, title.as_deref()).map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| ExportError::Internal(format!("Deck save task panicked: {}", e)))?
            .map_err(assembly_error)?;

            info!("Deck assembled: {} slides, {} bytes", count, bytes.len());
            Ok(Artifact {
                kind: ExportKind::Deck,
                file_name,
                media_type: ExportKind::Deck.media_type(),
                bytes,
            })
        })
    }
}

fn write_package(
    slides: &[Slide],
    size: PageSize,
    title: Option<&str>,
) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    // PNG is already compressed.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let part = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, body: String| -> ZipResult<()> {
        zip.start_file(name, deflated)?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    let n = slides.len();
    part(&mut zip, "[Content_Types].xml", xml::content_types(n))?;
    part(&mut zip, "_rels/.rels", xml::root_rels())?;
    part(&mut zip, "docProps/core.xml", xml::core_props(title))?;
    part(&mut zip, "docProps/app.xml", xml::app_props(n))?;
    part(
        &mut zip,
        "ppt/presentation.xml",
        xml::presentation(n, size.width, size.height),
    )?;
    part(&mut zip, "ppt/_rels/presentation.xml.rels", xml::presentation_rels(n))?;
    part(&mut zip, "ppt/slideMasters/slideMaster1.xml", xml::slide_master())?;
    part(
        &mut zip,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        xml::slide_master_rels(),
    )?;
    part(&mut zip, "ppt/slideLayouts/slideLayout1.xml", xml::slide_layout())?;
    part(
        &mut zip,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        xml::slide_layout_rels(),
    )?;
    part(&mut zip, "ppt/theme/theme1.xml", xml::theme())?;

    for (i, slide) in slides.iter().enumerate() {
        let number = i + 1;
        part(
            &mut zip,
            &format!("ppt/slides/slide{number}.xml"),
            xml::slide(number, &slide.placement),
        )?;
        part(
            &mut zip,
            &format!("ppt/slides/_rels/slide{number}.xml.rels"),
            xml::slide_rels(number),
        )?;
        zip.start_file(format!("ppt/media/image{number}.png"), stored)?;
        zip.write_all(&slide.png)?;
    }

    Ok(zip.finish()?.into_inner())
}
