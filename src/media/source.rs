//! Asset sources
//!
//! The engine never touches the filesystem directly; it goes through
//! [`AssetStore`], which production binds to [`FileStore`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncRead;

/// A sequential, type-erased audio byte stream
///
/// Everything that flows through the pipeline (file reads, mixer output) is
/// carried as a `ProgramStream`, so stages can be re-rooted on each other.
pub type ProgramStream = Box<dyn AsyncRead + Send + Unpin>;

/// Storage backend for program and effect assets
pub trait AssetStore: Send + Sync + 'static {
    /// Open an asset for sequential reading
    fn open(&self, asset: &Path) -> impl Future<Output = io::Result<ProgramStream>> + Send;

    /// List every available effect asset
    fn effects(&self) -> impl Future<Output = io::Result<Vec<PathBuf>>> + Send;
}

impl<T: AssetStore> AssetStore for Arc<T> {
    async fn open(&self, asset: &Path) -> io::Result<ProgramStream> {
        (**self).open(asset).await
    }

    async fn effects(&self) -> io::Result<Vec<PathBuf>> {
        (**self).effects().await
    }
}

/// Filesystem-backed asset store
#[derive(Debug, Clone)]
pub struct FileStore {
    fx_dir: PathBuf,
}

impl FileStore {
    /// Create a store whose effects live in `fx_dir`
    pub fn new(fx_dir: impl Into<PathBuf>) -> Self {
        Self {
            fx_dir: fx_dir.into(),
        }
    }

    /// Directory scanned for effects
    pub fn fx_dir(&self) -> &Path {
        &self.fx_dir
    }
}

impl AssetStore for FileStore {
    async fn open(&self, asset: &Path) -> io::Result<ProgramStream> {
        let file = tokio::fs::File::open(asset).await?;
        Ok(Box::new(file))
    }

    async fn effects(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.fx_dir).await?;
        let mut effects = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                effects.push(entry.path());
            }
        }

        effects.sort();
        Ok(effects)
    }
}
