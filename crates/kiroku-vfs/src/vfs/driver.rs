//! Drivers that connect filesystem roots.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

use super::backends::LocalFileSystem;
use super::error::{VfsError, VfsResult};
use super::ops::FileSystem;
use crate::codec::{FileSystemNormalizer, VoidNormalizer};
use crate::config::VfsConfig;

/// Opens and closes filesystems of one kind.
#[async_trait]
pub trait FileSystemDriver: Send + Sync {
    type Fs: FileSystem;

    /// Normalizer for reading and writing structured files on connected
    /// filesystems.
    fn normalizer(&self) -> Arc<dyn FileSystemNormalizer>;

    /// Open the filesystem rooted at `path`.
    async fn connect(&self, path: &Path) -> VfsResult<Self::Fs>;

    /// Release a connected filesystem.
    async fn disconnect(&self, fs: Self::Fs) -> VfsResult<()>;
}

/// Connects directories on the local disk.
#[derive(Clone)]
pub struct LocalDriver {
    normalizer: Arc<dyn FileSystemNormalizer>,
    config: VfsConfig,
}

impl std::fmt::Debug for LocalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDriver")
            .field("normalizer", &"<dyn FileSystemNormalizer>")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for LocalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDriver {
    /// Driver with no codecs and default settings.
    pub fn new() -> Self {
        Self {
            normalizer: Arc::new(VoidNormalizer),
            config: VfsConfig::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn FileSystemNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Settings given to every filesystem this driver connects.
    pub fn with_config(mut self, config: VfsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }
}

#[async_trait]
impl FileSystemDriver for LocalDriver {
    type Fs = LocalFileSystem;

    fn normalizer(&self) -> Arc<dyn FileSystemNormalizer> {
        Arc::clone(&self.normalizer)
    }

    #[tracing::instrument(skip(self), name = "driver.connect")]
    async fn connect(&self, path: &Path) -> VfsResult<LocalFileSystem> {
        let root = fs::canonicalize(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::not_found(path.display().to_string()),
            _ => VfsError::Io(e),
        })?;

        let meta = fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path.display().to_string()));
        }

        tracing::debug!("connected {}", root.display());
        Ok(LocalFileSystem::with_config(root, self.config.clone()))
    }

    async fn disconnect(&self, fs: LocalFileSystem) -> VfsResult<()> {
        tracing::debug!("disconnected {}", fs.root().display());
        Ok(())
    }
}
