//! Error types for the edgequake-export library.
//!
//! Two layers reflect two audiences:
//!
//! * [`ExportError`] is **diagnostic**: precise, structured, and recorded via
//!   `tracing` at the job boundary. Every failure anywhere in the pipeline
//!   (readiness, capture, assembly, save) surfaces as one of these and aborts
//!   the whole job; there is no per-section partial success.
//!
//! * [`Notice`] is **operator-facing**: exactly two coarse messages. Whatever
//!   went wrong, the operator sees either "no content to export" or "export
//!   failed". [`ExportError::notice`] performs the mapping.

use crate::section::ExportKind;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors returned by the edgequake-export library.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// The content source yielded zero sections.
    #[error("No content sections found; nothing to export")]
    EmptyContent,

    // ── Readiness errors ──────────────────────────────────────────────────
    /// Resources were still pending when the configured readiness timeout hit.
    ///
    /// Only produced when [`crate::ExportConfig::readiness_timeout`] is set;
    /// without it a stalled resource suspends the job indefinitely.
    #[error("{pending} resource(s) still loading after {timeout:?}\nIncrease --readiness-timeout or check the image sources.")]
    ReadinessTimeout { pending: usize, timeout: Duration },

    /// A single image could not be loaded or decoded.
    ///
    /// The readiness gate treats this as "settled" and keeps going; it only
    /// escapes as an error from a direct [`crate::pipeline::input::ImageLoader`] call.
    #[error("Failed to load image '{src}': {reason}")]
    ResourceLoadFailed { src: String, reason: String },

    // ── Capture errors ────────────────────────────────────────────────────
    /// Rasterisation of a section failed (including tainted captures).
    #[error("Capture failed for section {section}: {detail}")]
    CaptureFailed { section: usize, detail: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// Building or serialising the output document failed.
    #[error("{format} assembly failed: {detail}")]
    AssemblyFailed { format: ExportKind, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the finished artifact to its destination.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The manifest describing the content source does not exist.
    #[error("Manifest not found: '{path}'\nCheck the path exists and is readable.")]
    ManifestNotFound { path: PathBuf },

    /// The manifest exists but could not be parsed.
    #[error("Manifest '{path}' is invalid: {detail}")]
    InvalidManifest { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// The operator-facing notice this error surfaces as.
    pub fn notice(&self) -> Notice {
        match self {
            ExportError::EmptyContent => Notice::NoContent,
            _ => Notice::ExportFailed,
        }
    }
}

/// The only two messages ever shown to the operator.
///
/// Deliberately coarse: the underlying [`ExportError`] is logged for
/// diagnostics, the operator only learns whether there was anything to
/// export at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Notice {
    /// Shown when the content source is empty.
    NoContent,
    /// Shown for every other failure.
    ExportFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::NoContent => "no content to export",
            Notice::ExportFailed => "export failed",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_maps_to_no_content_notice() {
        assert_eq!(ExportError::EmptyContent.notice(), Notice::NoContent);
        assert_eq!(Notice::NoContent.to_string(), "no content to export");
    }

    #[test]
    fn every_other_error_maps_to_export_failed() {
        let errors = [
            ExportError::CaptureFailed {
                section: 4,
                detail: "tainted".into(),
            },
            ExportError::AssemblyFailed {
                format: ExportKind::Deck,
                detail: "zip".into(),
            },
            ExportError::ReadinessTimeout {
                pending: 2,
                timeout: Duration::from_secs(5),
            },
            ExportError::Internal("boom".into()),
        ];
        for e in errors {
            assert_eq!(e.notice(), Notice::ExportFailed, "{e}");
        }
        assert_eq!(Notice::ExportFailed.to_string(), "export failed");
    }

    #[test]
    fn capture_failed_display() {
        let e = ExportError::CaptureFailed {
            section: 3,
            detail: "canvas tainted".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("section 3"), "got: {msg}");
        assert!(msg.contains("canvas tainted"), "got: {msg}");
    }

    #[test]
    fn assembly_failed_names_format() {
        let e = ExportError::AssemblyFailed {
            format: ExportKind::Pdf,
            detail: "xref".into(),
        };
        assert!(e.to_string().starts_with("PDF"), "got: {e}");
    }

    #[test]
    fn readiness_timeout_display() {
        let e = ExportError::ReadinessTimeout {
            pending: 1,
            timeout: Duration::from_secs(30),
        };
        assert!(e.to_string().contains("after 30s"), "got: {e}");
    }

    #[test]
    fn sub_second_readiness_timeout_keeps_its_unit() {
        let e = ExportError::ReadinessTimeout {
            pending: 3,
            timeout: Duration::from_millis(50),
        };
        let msg = e.to_string();
        assert!(msg.contains("after 50ms"), "got: {msg}");
        assert!(!msg.contains("after 0s"), "got: {msg}");
    }
}
