//! Reading and writing structured files through a filesystem.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::{CodecRegistry, MimeTable};
use crate::vfs::{FileSystem, VfsError, VfsResult};

/// Decodes files into values and encodes values into files.
///
/// Every failure, whatever its cause, comes back as
/// [`VfsError::Normalize`] or [`VfsError::Denormalize`] carrying the path
/// and the underlying error.
#[async_trait]
pub trait FileSystemNormalizer: Send + Sync {
    /// Read `path` from `fs` and decode it.
    async fn normalize_from_file(&self, fs: &dyn FileSystem, path: &Path) -> VfsResult<Value>;

    /// Encode `value` and write it as the whole of `path` on `fs`.
    async fn denormalize_to_file(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        value: &Value,
    ) -> VfsResult<()>;
}

/// Picks the codec from the file extension.
#[derive(Debug, Clone)]
pub struct CodecNormalizer {
    registry: CodecRegistry,
    mimes: MimeTable,
}

impl Default for CodecNormalizer {
    fn default() -> Self {
        Self::new(CodecRegistry::with_defaults(), MimeTable::with_defaults())
    }
}

impl CodecNormalizer {
    pub fn new(registry: CodecRegistry, mimes: MimeTable) -> Self {
        Self { registry, mimes }
    }

    fn extension(path: &Path) -> VfsResult<&str> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| VfsError::codec(format!("{} has no extension", path.display())))
    }

    async fn decode(&self, fs: &dyn FileSystem, path: &Path) -> VfsResult<Value> {
        if !fs.is_file(path).await? {
            return Err(VfsError::not_found(path.display().to_string()));
        }

        let codec = self
            .registry
            .get(self.mimes.codec_for_extension(Self::extension(path)?)?)?;
        let bytes = fs.get(path).await?;
        codec.decode(&bytes)
    }

    async fn encode(&self, fs: &dyn FileSystem, path: &Path, value: &Value) -> VfsResult<()> {
        let codec = self
            .registry
            .get(self.mimes.codec_for_extension(Self::extension(path)?)?)?;
        let bytes = codec.encode(value)?;
        fs.put(path, &bytes).await
    }
}

#[async_trait]
impl FileSystemNormalizer for CodecNormalizer {
    #[tracing::instrument(skip(self, fs), name = "codec.normalize")]
    async fn normalize_from_file(&self, fs: &dyn FileSystem, path: &Path) -> VfsResult<Value> {
        self.decode(fs, path)
            .await
            .map_err(|e| VfsError::normalize(path.display().to_string(), e))
    }

    #[tracing::instrument(skip(self, fs, value), name = "codec.denormalize")]
    async fn denormalize_to_file(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        value: &Value,
    ) -> VfsResult<()> {
        self.encode(fs, path, value)
            .await
            .map_err(|e| VfsError::denormalize(path.display().to_string(), e))
    }
}

/// Normalizer used when no codecs are configured. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidNormalizer;

#[async_trait]
impl FileSystemNormalizer for VoidNormalizer {
    async fn normalize_from_file(&self, _fs: &dyn FileSystem, path: &Path) -> VfsResult<Value> {
        Err(VfsError::normalize(
            path.display().to_string(),
            VfsError::other("no codecs configured"),
        ))
    }

    async fn denormalize_to_file(
        &self,
        _fs: &dyn FileSystem,
        path: &Path,
        _value: &Value,
    ) -> VfsResult<()> {
        Err(VfsError::denormalize(
            path.display().to_string(),
            VfsError::other("no codecs configured"),
        ))
    }
}
