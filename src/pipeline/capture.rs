//! Section rasterisation: one section → one opaque bitmap at a bounded scale.
//!
//! ## Why cap the long edge, not a fixed DPI?
//!
//! Sections vary from small callouts to very wide banners. The scale
//! `min(max_oversample, max_capture_edge / max(w, h))` keeps the long edge of
//! every capture near 1600 px: small sections get up to 2× oversampling for
//! sharper output, large ones are downsampled so buffers stay bounded.
//!
//! ## Why flatten onto white?
//!
//! Neither output format composites page images over anything meaningful.
//! Transparent regions would show up as black in JPEG and as gaps on slides,
//! so every capture leaves this module fully opaque.
//!
//! The actual DOM-to-bitmap step is delegated to a [`Rasterizer`]. The
//! built-in [`CompositeRasterizer`] draws a section's image layers; it runs
//! inside `spawn_blocking` because resizing is CPU-bound.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::pipeline::readiness::{ImageState, PreparedSection, ResourceSet};
use crate::section::parse_hex_color;
use futures::future::BoxFuture;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::Arc;
use tracing::debug;

const WHITE: [u8; 3] = [255, 255, 255];

/// Scale applied to a section of intrinsic size `width × height`.
pub fn capture_scale(width: u32, height: u32, config: &ExportConfig) -> f32 {
    let long_edge = width.max(height).max(1) as f32;
    (config.max_capture_edge as f32 / long_edge).min(config.max_oversample)
}

/// Bitmap size produced at `scale`; never zero.
pub fn capture_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let px = |v: u32| ((v as f32 * scale).round() as u32).max(1);
    (px(width), px(height))
}

/// A transient, opaque bitmap of one section.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Position of the source section in document order.
    pub section_index: usize,
    pub scale: f32,
    pub pixels: RgbImage,
}

impl CaptureResult {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// The external bitmap capability: draw one section at `scale`.
///
/// Implementations should paint onto an opaque background; any alpha left in
/// the returned buffer is flattened onto white afterwards.
pub trait Rasterizer: Send + Sync {
    fn rasterize<'a>(
        &'a self,
        section: &'a PreparedSection,
        scale: f32,
        resources: &'a ResourceSet,
    ) -> BoxFuture<'a, Result<RgbaImage, ExportError>>;
}

/// Captures sections one at a time through a [`Rasterizer`].
pub struct SectionCapture<'a> {
    rasterizer: &'a dyn Rasterizer,
    config: &'a ExportConfig,
}

impl<'a> SectionCapture<'a> {
    pub fn new(rasterizer: &'a dyn Rasterizer, config: &'a ExportConfig) -> Self {
        Self { rasterizer, config }
    }

    /// Rasterise `section` at its computed scale.
    pub async fn capture(
        &self,
        section: &PreparedSection,
        resources: &ResourceSet,
    ) -> Result<CaptureResult, ExportError> {
        let (w, h) = section.size;
        let scale = capture_scale(w, h, self.config);
        let expected = capture_size(w, h, scale);

        let raw = self.rasterizer.rasterize(section, scale, resources).await?;
        if raw.dimensions() != expected {
            return Err(ExportError::CaptureFailed {
                section: section.index + 1,
                detail: format!(
                    "rasterizer returned {}x{} px, expected {}x{}",
                    raw.width(),
                    raw.height(),
                    expected.0,
                    expected.1
                ),
            });
        }

        let pixels = flatten(&raw, WHITE);
        debug!(
            "Captured section {} ({}x{} @ {:.3}) → {}x{} px",
            section.index + 1,
            w,
            h,
            scale,
            pixels.width(),
            pixels.height()
        );

        Ok(CaptureResult {
            section_index: section.index,
            scale,
            pixels,
        })
    }
}

/// Composite `src` over an opaque `background`.
pub fn flatten(src: &RgbaImage, background: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(src.width(), src.height(), |x, y| {
        let Rgba([r, g, b, a]) = *src.get_pixel(x, y);
        let a = a as u32;
        let mix = |c: u8, bg: u8| ((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(r, background[0]), mix(g, background[1]), mix(b, background[2])])
    })
}

/// Default rasterizer: paints the section fill and draws its image layers.
///
/// Layers whose image failed to load are skipped, the same way a broken image
/// renders as nothing. A tainted layer fails the whole capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeRasterizer;

/// A layer's destination rectangle in capture pixels. It may extend past the
/// canvas on any side.
struct PlacedLayer {
    image: Arc<DynamicImage>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// The part of a layer that lands on the canvas: a source crop and the
/// canvas rectangle it is resized into.
#[derive(Debug, PartialEq)]
struct VisibleLayer {
    crop: (u32, u32, u32, u32),
    dest: (i64, i64, u32, u32),
}

impl Rasterizer for CompositeRasterizer {
    fn rasterize<'a>(
        &'a self,
        section: &'a PreparedSection,
        scale: f32,
        resources: &'a ResourceSet,
    ) -> BoxFuture<'a, Result<RgbaImage, ExportError>> {
        Box::pin(async move {
            let number = section.index + 1;
            let fill = match section.section.background.as_deref() {
                None => WHITE,
                Some(hex) => parse_hex_color(hex).ok_or_else(|| ExportError::CaptureFailed {
                    section: number,
                    detail: format!("invalid background colour '{hex}'"),
                })?,
            };

            let mut layers = Vec::with_capacity(section.section.layers.len());
            for layer in &section.section.layers {
                let loaded = match resources.get(&layer.src) {
                    Some(ImageState::Loaded(img)) => img,
                    Some(ImageState::Failed(_)) | None => {
                        debug!("Section {}: skipping unavailable '{}'", number, layer.src);
                        continue;
                    }
                };
                if loaded.tainted {
                    return Err(ExportError::CaptureFailed {
                        section: number,
                        detail: format!(
                            "canvas tainted by cross-origin image '{}'",
                            layer.src
                        ),
                    });
                }
                let natural_w = loaded.pixels.width() as f32;
                let natural_h = loaded.pixels.height() as f32;
                let width = f64::from(layer.width.unwrap_or(natural_w) * scale).round();
                let height = f64::from(layer.height.unwrap_or(natural_h) * scale).round();
                if width < 1.0 || height < 1.0 {
                    continue;
                }
                layers.push(PlacedLayer {
                    image: Arc::clone(&loaded.pixels),
                    x: f64::from(layer.x * scale).round(),
                    y: f64::from(layer.y * scale).round(),
                    width,
                    height,
                });
            }

            let (w, h) = capture_size(section.size.0, section.size.1, scale);
            tokio::task::spawn_blocking(move || composite(w, h, fill, &layers))
                .await
                .map_err(|e| ExportError::Internal(format!("Capture task panicked: {}", e)))
        })
    }
}

fn composite(width: u32, height: u32, fill: [u8; 3], layers: &[PlacedLayer]) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([fill[0], fill[1], fill[2], 255]));
    for layer in layers {
        let Some(visible) = clip_layer(layer, width, height) else {
            continue;
        };
        let (cx, cy, cw, ch) = visible.crop;
        let (dx, dy, dw, dh) = visible.dest;
        let source = imageops::crop_imm(&*layer.image, cx, cy, cw, ch).to_image();
        let resized = imageops::resize(&source, dw, dh, FilterType::Triangle);
        imageops::overlay(&mut canvas, &resized, dx, dy);
    }
    canvas
}

/// Intersects a layer with the canvas. Only the visible part is ever
/// resized, so a layer declared far larger than its section costs no more
/// than the canvas itself.
fn clip_layer(layer: &PlacedLayer, canvas_w: u32, canvas_h: u32) -> Option<VisibleLayer> {
    let (src_w, src_h) = layer.image.dimensions();
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let left = layer.x.max(0.0);
    let top = layer.y.max(0.0);
    let right = (layer.x + layer.width).min(f64::from(canvas_w));
    let bottom = (layer.y + layer.height).min(f64::from(canvas_h));
    if right - left < 1.0 || bottom - top < 1.0 {
        return None;
    }

    let sx = f64::from(src_w) / layer.width;
    let sy = f64::from(src_h) / layer.height;
    let crop_x = ((left - layer.x) * sx).floor().min(f64::from(src_w - 1));
    let crop_y = ((top - layer.y) * sy).floor().min(f64::from(src_h - 1));
    let crop_r = ((right - layer.x) * sx).ceil().min(f64::from(src_w));
    let crop_b = ((bottom - layer.y) * sy).ceil().min(f64::from(src_h));

    Some(VisibleLayer {
        crop: (
            crop_x as u32,
            crop_y as u32,
            (crop_r - crop_x).max(1.0) as u32,
            (crop_b - crop_y).max(1.0) as u32,
        ),
        dest: (
            left as i64,
            top as i64,
            (right - left).round() as u32,
            (bottom - top).round() as u32,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::pipeline::input::LoadedImage;
    use crate::pipeline::readiness::prepare_sections;
    use crate::section::{ContentSection, ImageLayer};

    fn scale_of(w: u32, h: u32) -> f32 {
        capture_scale(w, h, &ExportConfig::default())
    }

    #[test]
    fn scale_caps_long_edge_and_oversampling() {
        assert!((scale_of(1600, 900) - 1.0).abs() < 1e-6);
        assert!((scale_of(800, 1200) - 1600.0 / 1200.0).abs() < 1e-6);
        assert!((scale_of(3200, 900) - 0.5).abs() < 1e-6);
        // Small sections stop at 2× oversampling.
        assert!((scale_of(400, 300) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn capture_size_follows_scale() {
        assert_eq!(capture_size(1600, 900, 1.0), (1600, 900));
        assert_eq!(capture_size(800, 1200, 1600.0 / 1200.0), (1067, 1600));
        assert_eq!(capture_size(3200, 900, 0.5), (1600, 450));
        assert_eq!(capture_size(1, 1, 0.1), (1, 1));
    }

    #[test]
    fn flatten_composites_onto_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let out = flatten(&img, WHITE);
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    fn resources_with(src: &str, tainted: bool) -> ResourceSet {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        ResourceSet::from_states([(
            src.to_string(),
            ImageState::Loaded(LoadedImage {
                pixels: Arc::new(img),
                tainted,
            }),
        )])
    }

    #[tokio::test]
    async fn composite_rasterizer_draws_layers_on_fill() {
        let config = ExportConfig::default();
        let section = ContentSection::sized(400, 300)
            .with_background("#000000")
            .with_layer(ImageLayer::new("red.png").at(0.0, 0.0).sized(100.0, 100.0));
        let prepared = prepare_sections(&[section], &config);
        let resources = resources_with("red.png", false);

        let capture = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &resources)
            .await
            .expect("capture");

        // 400×300 oversampled 2× → 800×600; the 100 px layer covers 200 px.
        assert_eq!(capture.dimensions(), (800, 600));
        assert_eq!(capture.pixels.get_pixel(10, 10), &Rgb([255, 0, 0]));
        assert_eq!(capture.pixels.get_pixel(700, 500), &Rgb([0, 0, 0]));
    }

    #[tokio::test]
    async fn oversized_layer_is_clipped_before_resizing() {
        let config = ExportConfig::default();
        let section = ContentSection::sized(200, 100)
            .with_background("#000000")
            .with_layer(ImageLayer::new("red.png").sized(60000.0, 60000.0));
        let prepared = prepare_sections(&[section], &config);
        let resources = resources_with("red.png", false);

        let capture = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &resources)
            .await
            .expect("oversized layer captures");

        assert_eq!(capture.dimensions(), (400, 200));
        assert_eq!(capture.pixels.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(capture.pixels.get_pixel(399, 199), &Rgb([255, 0, 0]));
    }

    #[tokio::test]
    async fn clipped_layer_shows_matching_part_of_source() {
        // Left half red, right half blue.
        let split = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let resources = ResourceSet::from_states([(
            "split.png".to_string(),
            ImageState::Loaded(LoadedImage {
                pixels: Arc::new(DynamicImage::ImageRgba8(split)),
                tainted: false,
            }),
        )]);
        let config = ExportConfig::default();
        // Twice as wide as the section: only the red half is on the canvas.
        let section = ContentSection::sized(200, 100)
            .with_layer(ImageLayer::new("split.png").sized(400.0, 100.0));
        let prepared = prepare_sections(&[section], &config);

        let capture = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &resources)
            .await
            .expect("capture");

        assert_eq!(capture.pixels.get_pixel(5, 100), &Rgb([255, 0, 0]));
        assert_eq!(capture.pixels.get_pixel(390, 100), &Rgb([255, 0, 0]));
    }

    #[test]
    fn clip_layer_bounds_work_to_the_canvas() {
        let layer = PlacedLayer {
            image: Arc::new(DynamicImage::new_rgba8(10, 10)),
            x: -100.0,
            y: -100.0,
            width: 200.0,
            height: 200.0,
        };
        assert_eq!(
            clip_layer(&layer, 800, 600),
            Some(VisibleLayer {
                crop: (5, 5, 5, 5),
                dest: (0, 0, 100, 100),
            })
        );

        let offscreen = PlacedLayer { x: 900.0, ..layer };
        assert_eq!(clip_layer(&offscreen, 800, 600), None);
    }

    #[tokio::test]
    async fn missing_images_are_skipped() {
        let config = ExportConfig::default();
        let section =
            ContentSection::sized(1600, 900).with_layer(ImageLayer::new("gone.png"));
        let prepared = prepare_sections(&[section], &config);
        let resources = ResourceSet::from_states([(
            "gone.png".to_string(),
            ImageState::Failed("404".into()),
        )]);

        let capture = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &resources)
            .await
            .expect("broken images do not abort");
        assert_eq!(capture.pixels.get_pixel(0, 0), &Rgb(WHITE));
    }

    #[tokio::test]
    async fn tainted_layer_fails_capture() {
        let config = ExportConfig::default();
        let section = ContentSection::sized(1600, 900)
            .with_layer(ImageLayer::new("https://cdn.example.net/x.png"));
        let prepared = prepare_sections(&[section], &config);
        let resources = resources_with("https://cdn.example.net/x.png", true);

        let err = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &resources)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tainted"), "{err}");
    }

    #[tokio::test]
    async fn invalid_background_fails_capture() {
        let config = ExportConfig::default();
        let section = ContentSection::sized(100, 100).with_background("teal");
        let prepared = prepare_sections(&[section], &config);

        let err = SectionCapture::new(&CompositeRasterizer, &config)
            .capture(&prepared[0], &ResourceSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::CaptureFailed { section: 1, .. }));
    }
}
