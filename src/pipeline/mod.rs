//! Pipeline stages shared by both export formats.
//!
//! Readiness and capture are identical for the paginated document and the
//! slide deck; only fitting and assembly differ per format (see
//! [`crate::assemble`]). Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ readiness ──▶ capture ──▶ fit ──▶ encode ──▶ assemble
//! (loader)   (gate)      (raster)   (geom)  (jpeg/png)
//! ```
//!
//! 1. [`input`]    : load an image source from a local path or HTTP/HTTPS URL
//! 2. [`readiness`]: prepare isolated section copies, then wait for fonts and
//!    every image to settle
//! 3. [`capture`]  : rasterise one section at `min(2, 1600 / long edge)`;
//!    compositing runs in `spawn_blocking`
//! 4. [`fit`]      : aspect-fit geometry: flush for pages, centered for slides
//! 5. [`encode`]   : bitmap → JPEG (PDF) or PNG (PPTX) bytes

pub mod capture;
pub mod encode;
pub mod fit;
pub mod input;
pub mod readiness;
