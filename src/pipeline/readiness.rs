//! Readiness gate: no capture starts until fonts and every image have settled.
//!
//! "Settled" means loaded *or* failed. A broken image is logged and drawn as
//! nothing; it does not abort the job. Readiness is best-effort, not a
//! correctness check.
//!
//! ## Isolated copies
//!
//! The sections handed to the pipeline belong to the presentation layer and
//! are never mutated. [`prepare_sections`] clones them into
//! [`PreparedSection`]s and sets `cross_origin = Anonymous` on every remote
//! image that lacks one. This happens before any load begins, since changing
//! the mode of an in-flight request would force a reload.
//!
//! ## Stalls
//!
//! With no [`crate::ExportConfig::readiness_timeout`], an image whose load
//! future never resolves keeps the gate closed forever. That is the default
//! behaviour; the timeout turns it into [`ExportError::ReadinessTimeout`].

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::pipeline::input::{is_remote, ImageLoader, ImageRequest, LoadedImage};
use crate::section::{ContentSection, CrossOrigin};
use futures::future::{join_all, BoxFuture};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A pipeline-owned copy of one section, ready for capture.
#[derive(Debug, Clone)]
pub struct PreparedSection {
    /// Position in document order.
    pub index: usize,
    /// Intrinsic size after the unmeasurable fallback.
    pub size: (u32, u32),
    pub section: ContentSection,
}

/// Clone `sections` and set cross-origin mode on remote images.
pub fn prepare_sections(sections: &[ContentSection], config: &ExportConfig) -> Vec<PreparedSection> {
    let origin = config.document_origin.as_deref();
    sections
        .iter()
        .enumerate()
        .map(|(index, original)| {
            let mut section = original.clone();
            for layer in &mut section.layers {
                if layer.cross_origin.is_none() && is_remote(&layer.src, origin) {
                    debug!("Section {}: cross-origin=anonymous for {}", index, layer.src);
                    layer.cross_origin = Some(CrossOrigin::Anonymous);
                }
            }
            PreparedSection {
                index,
                size: section.intrinsic_size(config.fallback_size),
                section,
            }
        })
        .collect()
}

/// Font availability. Resolves once every font the content uses is usable.
pub trait FontReadiness: Send + Sync {
    fn ready(&self) -> BoxFuture<'_, ()>;
}

/// Fonts that are ready from the start (nothing to load).
#[derive(Debug, Clone, Copy, Default)]
pub struct FontsReady;

impl FontReadiness for FontsReady {
    fn ready(&self) -> BoxFuture<'_, ()> {
        Box::pin(futures::future::ready(()))
    }
}

/// Font files declared by the content source; each one settles once read.
#[derive(Debug, Clone, Default)]
pub struct FontFiles {
    paths: Vec<PathBuf>,
}

impl FontFiles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl FontReadiness for FontFiles {
    fn ready(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let reads = self.paths.iter().map(|path| async move {
                match tokio::fs::read(path).await {
                    Ok(bytes) => debug!("Font ready: {} ({} bytes)", path.display(), bytes.len()),
                    Err(e) => warn!("Font {} failed to load: {}", path.display(), e),
                }
            });
            join_all(reads).await;
        })
    }
}

/// Final state of one image source.
#[derive(Debug, Clone)]
pub enum ImageState {
    Loaded(LoadedImage),
    Failed(String),
}

/// Every image source referenced by the job, all settled.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    images: HashMap<String, ImageState>,
}

impl ResourceSet {
    /// Build a set from already-settled states, e.g. for a custom rasterizer.
    pub fn from_states(states: impl IntoIterator<Item = (String, ImageState)>) -> Self {
        Self {
            images: states.into_iter().collect(),
        }
    }

    pub fn get(&self, src: &str) -> Option<&ImageState> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.images
            .values()
            .filter(|s| matches!(s, ImageState::Failed(_)))
            .count()
    }
}

/// The barrier in front of the capture loop.
pub struct ReadinessGate<'a> {
    fonts: &'a dyn FontReadiness,
    loader: &'a dyn ImageLoader,
    document_origin: Option<&'a str>,
    timeout: Option<Duration>,
}

impl<'a> ReadinessGate<'a> {
    pub fn new(
        fonts: &'a dyn FontReadiness,
        loader: &'a dyn ImageLoader,
        config: &'a ExportConfig,
    ) -> Self {
        Self {
            fonts,
            loader,
            document_origin: config.document_origin.as_deref(),
            timeout: config.readiness_timeout,
        }
    }

    /// Wait until fonts are ready and every image in `sections` has settled.
    pub async fn wait(&self, sections: &[PreparedSection]) -> Result<ResourceSet, ExportError> {
        let requests = collect_requests(sections, self.document_origin);
        let settled = AtomicUsize::new(0);
        info!("Waiting for fonts and {} image(s)", requests.len());

        let wait = self.settle_all(&requests, &settled);
        let images = match self.timeout {
            None => wait.await,
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                let pending = requests.len() - settled.load(Ordering::SeqCst);
                ExportError::ReadinessTimeout {
                    pending: pending.max(1),
                    timeout: limit,
                }
            })?,
        };

        let set = ResourceSet { images };
        info!(
            "Resources settled: {} image(s), {} failed",
            set.len(),
            set.failed_count()
        );
        Ok(set)
    }

    async fn settle_all(
        &self,
        requests: &[ImageRequest],
        settled: &AtomicUsize,
    ) -> HashMap<String, ImageState> {
        self.fonts.ready().await;
        debug!("Fonts ready");

        let loads = requests.iter().map(|request| async move {
            let state = match self.loader.load(request).await {
                Ok(image) => ImageState::Loaded(image),
                Err(e) => {
                    warn!("Image '{}' settled with failure: {}", request.src, e);
                    ImageState::Failed(e.to_string())
                }
            };
            settled.fetch_add(1, Ordering::SeqCst);
            (request.src.clone(), state)
        });
        join_all(loads).await.into_iter().collect()
    }
}

/// One request per distinct source, in first-seen order.
fn collect_requests(sections: &[PreparedSection], origin: Option<&str>) -> Vec<ImageRequest> {
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    for layer in sections.iter().flat_map(|s| &s.section.layers) {
        if seen.insert(layer.src.as_str()) {
            requests.push(ImageRequest {
                src: layer.src.clone(),
                cross_origin: layer.cross_origin,
                remote: is_remote(&layer.src, origin),
            });
        }
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::ImageLayer;
    use image::{DynamicImage, RgbaImage};
    use std::sync::{Arc, Mutex};

    /// Records requests and resolves local sources, fails `broken*` ones.
    #[derive(Default)]
    struct RecordingLoader {
        seen: Mutex<Vec<ImageRequest>>,
    }

    impl ImageLoader for RecordingLoader {
        fn load<'a>(&'a self, request: &'a ImageRequest) -> BoxFuture<'a, Result<LoadedImage, ExportError>> {
            self.seen.lock().unwrap().push(request.clone());
            Box::pin(async move {
                if request.src.starts_with("broken") {
                    return Err(ExportError::ResourceLoadFailed {
                        src: request.src.clone(),
                        reason: "404".into(),
                    });
                }
                Ok(LoadedImage {
                    pixels: Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(2, 2))),
                    tainted: false,
                })
            })
        }
    }

    fn sections() -> Vec<ContentSection> {
        vec![
            ContentSection::sized(1600, 900)
                .with_layer(ImageLayer::new("https://cdn.example.net/hero.png"))
                .with_layer(ImageLayer::new("local.png")),
            ContentSection::default().with_layer(ImageLayer::new("local.png")),
        ]
    }

    #[test]
    fn prepare_sets_cross_origin_on_copies_only() {
        let original = sections();
        let prepared = prepare_sections(&original, &ExportConfig::default());

        assert_eq!(
            prepared[0].section.layers[0].cross_origin,
            Some(CrossOrigin::Anonymous)
        );
        assert_eq!(prepared[0].section.layers[1].cross_origin, None);
        // The presentation layer's sections are untouched.
        assert_eq!(original[0].layers[0].cross_origin, None);
        assert_eq!(original, sections());
    }

    #[test]
    fn prepare_keeps_explicit_cross_origin() {
        let mut layer = ImageLayer::new("https://cdn.example.net/a.png");
        layer.cross_origin = Some(CrossOrigin::UseCredentials);
        let prepared = prepare_sections(
            &[ContentSection::sized(10, 10).with_layer(layer)],
            &ExportConfig::default(),
        );
        assert_eq!(
            prepared[0].section.layers[0].cross_origin,
            Some(CrossOrigin::UseCredentials)
        );
    }

    #[test]
    fn prepare_applies_fallback_size() {
        let prepared = prepare_sections(&sections(), &ExportConfig::default());
        assert_eq!(prepared[1].size, (1600, 900));
        assert_eq!(prepared[1].index, 1);
    }

    #[test]
    fn same_origin_images_are_left_alone() {
        let config = ExportConfig::builder()
            .document_origin("https://cdn.example.net")
            .build()
            .unwrap();
        let prepared = prepare_sections(&sections(), &config);
        assert_eq!(prepared[0].section.layers[0].cross_origin, None);
    }

    #[tokio::test]
    async fn failures_count_as_settled() {
        let config = ExportConfig::default();
        let loader = RecordingLoader::default();
        let prepared = prepare_sections(
            &[ContentSection::sized(10, 10)
                .with_layer(ImageLayer::new("ok.png"))
                .with_layer(ImageLayer::new("broken.png"))],
            &config,
        );

        let set = ReadinessGate::new(&FontsReady, &loader, &config)
            .wait(&prepared)
            .await
            .expect("gate opens despite a broken image");

        assert_eq!(set.len(), 2);
        assert_eq!(set.failed_count(), 1);
        assert!(matches!(set.get("ok.png"), Some(ImageState::Loaded(_))));
        assert!(matches!(set.get("broken.png"), Some(ImageState::Failed(_))));
    }

    #[tokio::test]
    async fn duplicate_sources_load_once_with_prepared_mode() {
        let config = ExportConfig::default();
        let loader = RecordingLoader::default();
        let prepared = prepare_sections(&sections(), &config);

        ReadinessGate::new(&FontsReady, &loader, &config)
            .wait(&prepared)
            .await
            .unwrap();

        let seen = loader.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].cross_origin, Some(CrossOrigin::Anonymous));
        assert!(seen[0].remote);
        assert!(!seen[1].remote);
    }

    #[tokio::test]
    async fn missing_font_files_still_settle() {
        let config = ExportConfig::default();
        let fonts = FontFiles::new(vec![PathBuf::from("/no/such/font.ttf")]);
        let loader = RecordingLoader::default();
        let set = ReadinessGate::new(&fonts, &loader, &config)
            .wait(&[])
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
