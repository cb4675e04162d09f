//! Placement geometry: where a capture lands on a page or slide.
//!
//! Both formats aspect-fit with a single uniform ratio so nothing is cropped
//! or distorted. They differ only in where the leftover space goes:
//!
//! | Format | Units in            | Placement                  |
//! |--------|---------------------|----------------------------|
//! | PDF    | bitmap pixels       | flush at (0, 0), no margin |
//! | Deck   | pixels ÷ 96 px/in   | centered on both axes      |
//!
//! All geometry is in inches with a top-left origin; the assemblers convert
//! to PDF points or OOXML EMU.

use crate::config::PageSize;
use serde::{Deserialize, Serialize};

/// Position and size of one capture on one page/slide, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Flush placement for the paginated document.
///
/// `ratio = min(page.width / px_w, page.height / px_h)`; leftover space ends
/// up on the right or bottom edge.
pub fn fit_page(page: PageSize, bitmap_px: (u32, u32)) -> PlacementGeometry {
    let (w, h) = (bitmap_px.0.max(1) as f64, bitmap_px.1.max(1) as f64);
    let ratio = (page.width / w).min(page.height / h);
    PlacementGeometry {
        x: 0.0,
        y: 0.0,
        width: w * ratio,
        height: h * ratio,
    }
}

/// Centered placement for the slide deck.
pub fn fit_slide(slide: PageSize, bitmap_px: (u32, u32), pixels_per_inch: f64) -> PlacementGeometry {
    let w_in = bitmap_px.0.max(1) as f64 / pixels_per_inch;
    let h_in = bitmap_px.1.max(1) as f64 / pixels_per_inch;
    let ratio = (slide.width / w_in).min(slide.height / h_in);
    let width = w_in * ratio;
    let height = h_in * ratio;
    PlacementGeometry {
        x: (slide.width - width) / 2.0,
        y: (slide.height - height) / 2.0,
        width,
        height,
    }
}
