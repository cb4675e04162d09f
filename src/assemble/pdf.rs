//! Paginated output: one borderless landscape page per section.
//!
//! Every page has the same custom size (20 × 11.25 in by default) and carries
//! exactly one JPEG image XObject, placed flush at the top-left corner by
//! [`fit_page`]. PDF user space has its origin at the bottom-left, so the
//! top-left placement is flipped on the way in.
//!
//! Pages are held as encoded JPEG plus placement; the `lopdf` object graph is
//! built and serialised in one `spawn_blocking` pass at finalize time.

use crate::assemble::{Artifact, DocumentAssembler};
use crate::config::{ExportConfig, PageSize};
use crate::error::ExportError;
use crate::pipeline::capture::CaptureResult;
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::fit::{fit_page, PlacementGeometry};
use crate::section::ExportKind;
use futures::future::BoxFuture;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f64 = 72.0;

/// Name of the single image resource on each page.
const IMAGE_NAME: &str = "Im1";

fn assembly_error(detail: impl ToString) -> ExportError {
    ExportError::AssemblyFailed {
        format: ExportKind::Pdf,
        detail: detail.to_string(),
    }
}

struct PdfPage {
    jpeg: Vec<u8>,
    px: (u32, u32),
    placement: PlacementGeometry,
}

/// Builds the paginated document page by page.
pub struct PdfAssembler {
    pages: Vec<PdfPage>,
    page: PageSize,
    jpeg_quality: u8,
    file_name: String,
    title: Option<String>,
}

impl PdfAssembler {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            pages: Vec::new(),
            page: config.page,
            jpeg_quality: config.jpeg_quality,
            file_name: config.pdf_file_name.clone(),
            title: config.title.clone(),
        }
    }
}

fn to_points(inches: f64) -> f32 {
    (inches * POINTS_PER_INCH) as f32
}

impl DocumentAssembler for PdfAssembler {
    fn append(&mut self, capture: CaptureResult) -> Result<PlacementGeometry, ExportError> {
        let px = capture.dimensions();
        let placement = fit_page(self.page, px);
        let jpeg = encode_jpeg(&capture.pixels, self.jpeg_quality).map_err(assembly_error)?;

        self.pages.push(PdfPage {
            jpeg,
            px,
            placement,
        });
        debug!(
            "PDF page {}: {}x{} px at ({:.3}, {:.3}) {:.3}x{:.3} in",
            self.pages.len(),
            px.0,
            px.1,
            placement.x,
            placement.y,
            placement.width,
            placement.height
        );
        Ok(placement)
    }

    fn len(&self) -> usize {
        self.pages.len()
    }

    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<Artifact, ExportError>> {
        let PdfAssembler {
            pages,
            page,
            file_name,
            title,
            ..
        } = *self;

        Box::pin(async move {
            if pages.is_empty() {
                return Err(assembly_error("document has no pages"));
            }
            let count = pages.len();

            let bytes = tokio::task::spawn_blocking(move || {
                write_document(pages, page, title.as_deref()).map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| ExportError::Internal(format!("PDF save task panicked: {}", e)))?
            .map_err(assembly_error)?;

            info!("PDF assembled: {} pages, {} bytes", count, bytes.len());
            Ok(Artifact {
                kind: ExportKind::Pdf,
                file_name,
                media_type: ExportKind::Pdf.media_type(),
                bytes,
            })
        })
    }
}

/// Build the object graph and serialise it.
fn write_document(
    pages: Vec<PdfPage>,
    size: PageSize,
    title: Option<&str>,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let media_box: Vec<Object> = vec![
        0.into(),
        0.into(),
        to_points(size.width).into(),
        to_points(size.height).into(),
    ];

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for PdfPage { jpeg, px, placement } in pages {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px.0 as i64,
                "Height" => px.1 as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        // Image space is the unit square; scale it to the placement and flip y.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        to_points(placement.width).into(),
                        0.into(),
                        0.into(),
                        to_points(placement.height).into(),
                        to_points(placement.x).into(),
                        to_points(size.height - placement.y - placement.height).into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        }));
    }

    let count = page_ids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        "Count" => count,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal(concat!("edgequake-export ", env!("CARGO_PKG_VERSION"))),
    };
    if let Some(title) = title {
        info.set("Title", Object::string_literal(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn capture(index: usize, w: u32, h: u32) -> CaptureResult {
        CaptureResult {
            section_index: index,
            scale: 1.0,
            pixels: RgbImage::from_pixel(w, h, Rgb([200, 10, 10])),
        }
    }

    fn image_width(doc: &Document, page_id: ObjectId) -> i64 {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(IMAGE_NAME.as_bytes()).unwrap().as_reference().unwrap();
        let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
        stream.dict.get(b"Width").unwrap().as_i64().unwrap()
    }

    #[tokio::test]
    async fn one_page_per_capture_in_order() {
        let config = ExportConfig::default();
        let mut assembler: Box<dyn DocumentAssembler> = Box::new(PdfAssembler::new(&config));
        for (i, (w, h)) in [(1600, 900), (1067, 1600), (1600, 450)].into_iter().enumerate() {
            let g = assembler.append(capture(i, w, h)).unwrap();
            assert_eq!((g.x, g.y), (0.0, 0.0));
        }
        assert_eq!(assembler.len(), 3);

        let artifact = assembler.finalize().await.expect("finalize");
        assert_eq!(artifact.file_name, "presentation.pdf");
        assert!(artifact.bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&artifact.bytes).expect("valid pdf");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        let widths: Vec<i64> = pages.values().map(|&id| image_width(&doc, id)).collect();
        assert_eq!(widths, vec![1600, 1067, 1600]);

        let first = doc.get_dictionary(pages[&1]).unwrap();
        let media_box = first.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 1440.0);
        assert_eq!(media_box[3].as_float().unwrap(), 810.0);
    }

    fn placement_matrix(doc: &Document, page_id: ObjectId) -> Vec<f32> {
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        let cm = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .expect("page places its image with cm");
        cm.operands.iter().map(|o| o.as_float().unwrap()).collect()
    }

    fn assert_matrix(actual: &[f32], expected: [f32; 6]) {
        assert_eq!(actual.len(), 6, "{actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 0.01, "{actual:?} != {expected:?}");
        }
    }

    #[tokio::test]
    async fn image_is_placed_flush_top_left_in_points() {
        let mut assembler = Box::new(PdfAssembler::new(&ExportConfig::default()));
        assembler.append(capture(0, 1600, 450)).unwrap();
        assembler.append(capture(1, 1067, 1600)).unwrap();
        let artifact = assembler.finalize().await.unwrap();

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let pages = doc.get_pages();
        // Wide: full page width, top half of the page in PDF's bottom-up space.
        assert_matrix(&placement_matrix(&doc, pages[&1]), [1440.0, 0.0, 0.0, 405.0, 0.0, 405.0]);
        // Tall: full page height, pinned to the left edge.
        assert_matrix(&placement_matrix(&doc, pages[&2]), [540.17, 0.0, 0.0, 810.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn empty_document_fails_to_finalize() {
        let assembler = Box::new(PdfAssembler::new(&ExportConfig::default()));
        let err = assembler.finalize().await.unwrap_err();
        assert!(matches!(
            err,
            ExportError::AssemblyFailed {
                format: ExportKind::Pdf,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn title_lands_in_info_dictionary() {
        let config = ExportConfig::builder().title("Q3 Review").build().unwrap();
        let mut assembler = Box::new(PdfAssembler::new(&config));
        assembler.append(capture(0, 16, 9)).unwrap();
        let artifact = assembler.finalize().await.unwrap();

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Q3 Review");
    }
}
