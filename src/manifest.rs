//! JSON manifest: a content source on disk.
//!
//! ```json
//! {
//!   "title": "Spring launch",
//!   "origin": "https://example.com",
//!   "fonts": ["fonts/Inter.woff2"],
//!   "sections": [
//!     { "width": 1600, "height": 900, "background": "#0b1d3a",
//!       "layers": [{ "src": "hero.png", "x": 0, "y": 0, "width": 1600, "height": 900 }] },
//!     { "width": 800, "height": 1200,
//!       "layers": [{ "src": "https://cdn.example.net/chart.png" }] }
//!   ]
//! }
//! ```
//!
//! Relative image and font paths resolve against the manifest's directory.
//! URLs and absolute paths are left alone.

use crate::error::ExportError;
use crate::pipeline::input::is_url;
use crate::section::ContentSection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A content source as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub title: Option<String>,
    /// Origin the content is served from, e.g. `https://example.com`.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub fonts: Vec<PathBuf>,
    #[serde(default)]
    pub sections: Vec<ContentSection>,
}

impl Manifest {
    /// Parse a manifest from JSON text. Paths are left as written.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for font in &mut self.fonts {
            if font.is_relative() {
                *font = base.join(&*font);
            }
        }
        for layer in self.sections.iter_mut().flat_map(|s| s.layers.iter_mut()) {
            if is_url(&layer.src) || layer.src.starts_with("file://") {
                continue;
            }
            let path = Path::new(&layer.src);
            if path.is_relative() {
                layer.src = base.join(path).to_string_lossy().into_owned();
            }
        }
    }
}

/// Read and parse the manifest at `path`.
pub async fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest, ExportError> {
    let path = path.as_ref();
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExportError::ManifestNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ExportError::InvalidManifest {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
    };

    let mut manifest = Manifest::from_json(&text).map_err(|e| ExportError::InvalidManifest {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.resolve_paths(base);
    debug!(
        "Manifest {}: {} section(s), {} font(s)",
        path.display(),
        manifest.sections.len(),
        manifest.fonts.len()
    );
    Ok(manifest)
}
