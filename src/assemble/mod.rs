//! Document assembly: captures in, one finished artifact out.
//!
//! The two output formats differ only here. Each assembler owns one
//! document for the whole job, takes captures strictly in order, places each
//! on its own page/slide, and produces the serialised bytes once at the end.
//!
//! Assemblers never touch the output destination. The caller hands the
//! [`Artifact`] to a sink only after `finalize` succeeds, so a failure
//! anywhere leaves nothing behind.

pub mod deck;
mod deck_xml;
pub mod pdf;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::pipeline::capture::CaptureResult;
use crate::pipeline::fit::PlacementGeometry;
use crate::section::ExportKind;
use futures::future::BoxFuture;

pub use deck::DeckAssembler;
pub use pdf::PdfAssembler;

/// A finished, downloadable document.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ExportKind,
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Append-only builder for one output document.
pub trait DocumentAssembler: Send {
    /// Place `capture` on a new page/slide, returning where it landed.
    fn append(&mut self, capture: CaptureResult) -> Result<PlacementGeometry, ExportError>;

    /// Pages/slides appended so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialise the whole document. Consumes the assembler.
    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<Artifact, ExportError>>;
}

/// A fresh assembler for `kind`.
pub fn new_assembler(kind: ExportKind, config: &ExportConfig) -> Box<dyn DocumentAssembler> {
    match kind {
        ExportKind::Pdf => Box::new(PdfAssembler::new(config)),
        ExportKind::Deck => Box::new(DeckAssembler::new(config)),
    }
}
