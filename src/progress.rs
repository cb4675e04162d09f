//! Progress-callback trait for per-section export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive events
//! as the pipeline captures and places each section.
//!
//! # Example
//!
//! ```rust
//! use edgequake_export::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     placed: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, index: usize, total: usize, _px: (u32, u32)) {
//!         self.placed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Section {}/{} placed", index + 1, total);
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { placed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::section::ExportKind;
use std::sync::Arc;

/// Called by the export pipeline as it processes each section.
///
/// Sections are processed strictly in order, so events for one job never
/// interleave. All methods have default no-op implementations.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once the readiness gate has opened, before the first capture.
    fn on_export_start(&self, kind: ExportKind, total_sections: usize) {
        let _ = (kind, total_sections);
    }

    /// Called before a section is rasterised.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the section
    /// * `total`: number of sections in the job
    fn on_section_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called after a section's capture has been placed into the document.
    ///
    /// `captured_px` is the bitmap size that was placed.
    fn on_section_complete(&self, index: usize, total: usize, captured_px: (u32, u32)) {
        let _ = (index, total, captured_px);
    }

    /// Called after the artifact has been saved.
    fn on_export_complete(&self, kind: ExportKind, bytes: usize) {
        let _ = (kind, bytes);
    }

    /// Called when the job aborts. Nothing was saved.
    fn on_export_failed(&self, kind: ExportKind, error: &str) {
        let _ = (kind, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        total: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_export_start(&self, _kind: ExportKind, total_sections: usize) {
            self.total.store(total_sections, Ordering::SeqCst);
        }

        fn on_section_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _index: usize, _total: usize, _px: (u32, u32)) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_failed(&self, _kind: ExportKind, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(ExportKind::Pdf, 3);
        cb.on_section_start(0, 3);
        cb.on_section_complete(0, 3, (1600, 900));
        cb.on_export_complete(ExportKind::Pdf, 1024);
        cb.on_export_failed(ExportKind::Deck, "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_export_start(ExportKind::Deck, 2);
        tracker.on_section_start(0, 2);
        tracker.on_section_complete(0, 2, (800, 600));
        tracker.on_section_start(1, 2);
        tracker.on_export_failed(ExportKind::Deck, "capture failed");

        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_section_start(0, 10);
    }
}
