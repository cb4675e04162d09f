//! Where finished artifacts and operator notices go.
//!
//! ## Why a sink trait?
//!
//! The pipeline ends with an in-memory [`Artifact`]. Handing it to the
//! operator is environment-specific: the CLI writes a file, an embedding
//! application might stream it to a browser download. [`ArtifactSink`] is
//! called exactly once per successful job, and never for a failed one.

use crate::assemble::Artifact;
use crate::error::{ExportError, Notice};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Receives each finished artifact.
pub trait ArtifactSink: Send + Sync {
    /// Persist `artifact`, returning where it ended up.
    fn save<'a>(&'a self, artifact: &'a Artifact) -> BoxFuture<'a, Result<PathBuf, ExportError>>;
}

/// Writes artifacts into a directory under their fixed file names.
///
/// Uses atomic write (temp file + rename), so an existing file of the same
/// name is replaced whole or not at all.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn save<'a>(&'a self, artifact: &'a Artifact) -> BoxFuture<'a, Result<PathBuf, ExportError>> {
        Box::pin(async move {
            let path = self.dir.join(&artifact.file_name);
            let write_err = |e: std::io::Error| ExportError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            };

            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(write_err)?;

            let tmp_path = path.with_extension(format!("{}.tmp", artifact.kind.extension()));
            tokio::fs::write(&tmp_path, &artifact.bytes)
                .await
                .map_err(write_err)?;
            if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(write_err(e));
            }

            info!(
                "Saved {} ({} bytes) to {}",
                artifact.kind,
                artifact.bytes.len(),
                path.display()
            );
            Ok(path)
        })
    }
}

/// Keeps artifacts in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything saved so far, oldest first.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.saved.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.saved.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemorySink {
    fn save<'a>(&'a self, artifact: &'a Artifact) -> BoxFuture<'a, Result<PathBuf, ExportError>> {
        Box::pin(async move {
            let mut saved = self
                .saved
                .lock()
                .map_err(|_| ExportError::Internal("memory sink lock poisoned".into()))?;
            saved.push(artifact.clone());
            debug!("Kept {} in memory ({} bytes)", artifact.file_name, artifact.bytes.len());
            Ok(PathBuf::from(&artifact.file_name))
        })
    }
}

/// Receives the operator-facing notice of a failed job.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Reports notices through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn notify(&self, notice: Notice) {
        warn!("{}", notice);
    }
}

/// Records notices in memory.
#[derive(Debug, Default)]
pub struct MemoryNotices {
    seen: Mutex<Vec<Notice>>,
}

impl MemoryNotices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl NoticeSink for MemoryNotices {
    fn notify(&self, notice: Notice) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notice);
        }
    }
}
