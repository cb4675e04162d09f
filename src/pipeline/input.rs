//! Image source loading: local path or HTTP/HTTPS URL → decoded bitmap.
//!
//! [`SourceLoader`] is the default [`ImageLoader`]. Local sources are read
//! with `tokio::fs`; URLs are downloaded with a per-request timeout. Bytes are
//! decoded with the `image` crate on a blocking thread.
//!
//! ## Tainting
//!
//! A remote image fetched without a cross-origin attribute is returned with
//! `tainted = true`. The capture stage refuses to read pixels from tainted
//! images, the same way a canvas that drew an un-granted cross-origin image
//! refuses to export. The readiness gate prevents this by preparing every
//! remote image with [`CrossOrigin::Anonymous`] before loading starts.

use crate::error::ExportError;
use crate::section::CrossOrigin;
use futures::future::BoxFuture;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What the gate asks a loader to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub src: String,
    pub cross_origin: Option<CrossOrigin>,
    /// Served from an origin other than the document's.
    pub remote: bool,
}

/// A settled, successfully decoded image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixels: Arc<DynamicImage>,
    /// Pixels may not be read back into a capture.
    pub tainted: bool,
}

/// Loads one image source. Each call is that resource's readiness future:
/// it resolves exactly once, with the image or with the failure.
pub trait ImageLoader: Send + Sync {
    fn load<'a>(&'a self, request: &'a ImageRequest) -> BoxFuture<'a, Result<LoadedImage, ExportError>>;
}

/// Check if the source string looks like a URL.
pub fn is_url(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Whether `src` is served from an origin other than `document_origin`.
///
/// Local paths are never remote. Without a document origin every URL is.
pub fn is_remote(src: &str, document_origin: Option<&str>) -> bool {
    if !is_url(src) {
        return false;
    }
    let Some(origin) = document_origin else {
        return true;
    };
    match (reqwest::Url::parse(src), reqwest::Url::parse(origin)) {
        (Ok(a), Ok(b)) => a.origin() != b.origin(),
        _ => true,
    }
}

/// Default loader: local files and HTTP/HTTPS downloads.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl SourceLoader {
    pub fn new(timeout_secs: u64) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Vec<u8>, ExportError> {
        if is_url(&request.src) {
            self.download(request).await
        } else {
            read_local(&request.src).await
        }
    }

    async fn download(&self, request: &ImageRequest) -> Result<Vec<u8>, ExportError> {
        let url = &request.src;
        info!("Downloading image from: {}", url);

        // The client carries no cookie store, so no mode sends credentials.
        let response = self.client.get(url).send().await.map_err(|e| ExportError::ResourceLoadFailed {
            src: url.clone(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            },
        })?;

        if !response.status().is_success() {
            return Err(ExportError::ResourceLoadFailed {
                src: url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::ResourceLoadFailed {
                src: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}

impl ImageLoader for SourceLoader {
    fn load<'a>(&'a self, request: &'a ImageRequest) -> BoxFuture<'a, Result<LoadedImage, ExportError>> {
        Box::pin(async move {
            let bytes = self.fetch(request).await?;
            let pixels = decode(&request.src, bytes).await?;
            let tainted = request.remote && request.cross_origin.is_none();
            debug!(
                "Loaded '{}' → {}x{} px{}",
                request.src,
                pixels.width(),
                pixels.height(),
                if tainted { " (tainted)" } else { "" }
            );
            Ok(LoadedImage {
                pixels: Arc::new(pixels),
                tainted,
            })
        })
    }
}

/// Read a local image file.
async fn read_local(src: &str) -> Result<Vec<u8>, ExportError> {
    let path = PathBuf::from(src.strip_prefix("file://").unwrap_or(src));
    tokio::fs::read(&path)
        .await
        .map_err(|e| ExportError::ResourceLoadFailed {
            src: src.to_string(),
            reason: match e.kind() {
                std::io::ErrorKind::NotFound => "file not found".to_string(),
                std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
                _ => e.to_string(),
            },
        })
}

/// Decode image bytes off the async worker threads.
async fn decode(src: &str, bytes: Vec<u8>) -> Result<DynamicImage, ExportError> {
    let src_owned = src.to_string();
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| ExportError::Internal(format!("Decode task panicked: {}", e)))?
        .map_err(|e| ExportError::ResourceLoadFailed {
            src: src_owned,
            reason: format!("decode: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/hero.png"));
        assert!(is_url("http://example.com/hero.png"));
        assert!(!is_url("/tmp/hero.png"));
        assert!(!is_url("hero.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_is_remote() {
        assert!(!is_remote("img/hero.png", None));
        assert!(is_remote("https://cdn.example.net/a.png", None));
        assert!(!is_remote(
            "https://example.com/a.png",
            Some("https://example.com")
        ));
        assert!(is_remote(
            "https://cdn.example.net/a.png",
            Some("https://example.com")
        ));
        // Scheme is part of the origin.
        assert!(is_remote(
            "http://example.com/a.png",
            Some("https://example.com")
        ));
    }

    #[tokio::test]
    async fn loads_local_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let loader = SourceLoader::new(5).unwrap();
        let request = ImageRequest {
            src: path.to_string_lossy().to_string(),
            cross_origin: None,
            remote: false,
        };
        let loaded = loader.load(&request).await.expect("local load");
        assert_eq!((loaded.pixels.width(), loaded.pixels.height()), (4, 3));
        assert!(!loaded.tainted);
    }

    #[tokio::test]
    async fn missing_file_is_a_load_failure() {
        let loader = SourceLoader::new(5).unwrap();
        let request = ImageRequest {
            src: "/definitely/not/here.png".into(),
            cross_origin: None,
            remote: false,
        };
        let err = loader.load(&request).await.unwrap_err();
        assert!(matches!(err, ExportError::ResourceLoadFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"not an image").unwrap();

        let loader = SourceLoader::new(5).unwrap();
        let request = ImageRequest {
            src: path.to_string_lossy().to_string(),
            cross_origin: None,
            remote: false,
        };
        let err = loader.load(&request).await.unwrap_err();
        assert!(err.to_string().contains("decode"), "{err}");
    }
}
