//! Content model: the ordered sections the presentation layer hands over.
//!
//! The pipeline never constructs or styles content; it only reads it. A
//! [`ContentSection`] is identified by its position in the slice passed to
//! the pipeline, and every section becomes exactly one page or slide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which document an export job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Paginated print-style document (20 × 11.25 in landscape pages).
    Pdf,
    /// 16:9 slide deck (10 × 5.625 in slides).
    Deck,
}

impl ExportKind {
    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Pdf => "pdf",
            ExportKind::Deck => "pptx",
        }
    }

    /// MIME type of the produced artifact.
    pub fn media_type(&self) -> &'static str {
        match self {
            ExportKind::Pdf => "application/pdf",
            ExportKind::Deck => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Pdf => f.write_str("PDF"),
            ExportKind::Deck => f.write_str("Deck"),
        }
    }
}

/// Cross-origin request mode for an image, mirroring the HTML attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    /// Fetch without credentials; the pixels are readable afterwards.
    Anonymous,
    /// Fetch with credentials.
    UseCredentials,
}

/// One image drawn inside a section, in section pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    /// Local path or HTTP/HTTPS URL.
    pub src: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Drawn width; the image's natural width when absent.
    #[serde(default)]
    pub width: Option<f32>,
    /// Drawn height; the image's natural height when absent.
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub cross_origin: Option<CrossOrigin>,
}

impl ImageLayer {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            x: 0.0,
            y: 0.0,
            width: None,
            height: None,
            cross_origin: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// An ordered, read-only visual block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(default)]
    pub id: Option<String>,
    /// Intrinsic width in pixels. `None` or 0 means unmeasurable.
    #[serde(default)]
    pub width: Option<u32>,
    /// Intrinsic height in pixels. `None` or 0 means unmeasurable.
    #[serde(default)]
    pub height: Option<u32>,
    /// Opaque fill as `#rrggbb`; white when absent.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub layers: Vec<ImageLayer>,
}

impl ContentSection {
    /// A section with a measured intrinsic size and no layers.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_background(mut self, hex: impl Into<String>) -> Self {
        self.background = Some(hex.into());
        self
    }

    pub fn with_layer(mut self, layer: ImageLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Intrinsic pixel size, or `fallback` when either edge is unmeasurable.
    pub fn intrinsic_size(&self, fallback: (u32, u32)) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => fallback,
        }
    }
}

/// Parse a `#rrggbb` (or `#rgb`) colour.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |h: &str| u8::from_str_radix(h, 16).ok();
    match hex.len() {
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 16 + v;
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_size_uses_measured_dimensions() {
        let s = ContentSection::sized(800, 1200);
        assert_eq!(s.intrinsic_size((1600, 900)), (800, 1200));
    }

    #[test]
    fn intrinsic_size_falls_back_when_unmeasurable() {
        let fallback = (1600, 900);
        assert_eq!(ContentSection::default().intrinsic_size(fallback), fallback);
        assert_eq!(ContentSection::sized(0, 500).intrinsic_size(fallback), fallback);
        let half = ContentSection {
            width: Some(640),
            ..Default::default()
        };
        assert_eq!(half.intrinsic_size(fallback), fallback);
    }

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#ffffff"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#0b1020"), Some([0x0b, 0x10, 0x20]));
        assert_eq!(parse_hex_color("#f00"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("ffffff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn section_deserialises_with_defaults() {
        let json = r#"{"width": 1600, "height": 900,
            "layers": [{"src": "hero.png", "cross_origin": "anonymous"}]}"#;
        let s: ContentSection = serde_json::from_str(json).expect("valid section");
        assert_eq!(s.intrinsic_size((1, 1)), (1600, 900));
        assert_eq!(s.layers[0].cross_origin, Some(CrossOrigin::Anonymous));
        assert_eq!(s.layers[0].x, 0.0);
        assert!(s.background.is_none());
    }

    #[test]
    fn kind_metadata() {
        assert_eq!(ExportKind::Pdf.extension(), "pdf");
        assert_eq!(ExportKind::Deck.extension(), "pptx");
        assert_eq!(ExportKind::Deck.to_string(), "Deck");
    }
}
