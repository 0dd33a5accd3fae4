//! Filesystem operations trait.
//!
//! Whole-file, path-based operations over one rooted tree. Paths are always
//! relative to the filesystem's root; a leading `/` is accepted and means
//! the same thing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{DirEntry, FileAttr, PathInfo};
use super::VfsResult;
use crate::sequence::{EditableSequence, SequenceMode};

/// Core filesystem operations.
///
/// Every path is checked against the root before anything touches the disk.
/// Paths that leave the root fail with
/// [`VfsError::PathEscapesRoot`](super::VfsError::PathEscapesRoot), and a
/// read-only filesystem rejects every mutation with
/// [`VfsError::ReadOnly`](super::VfsError::ReadOnly).
#[async_trait]
pub trait FileSystem: Send + Sync {
    // ========================================================================
    // Creating and removing
    // ========================================================================

    /// Create an empty file, or bump the modification time of an existing one.
    async fn touch(&self, path: &Path) -> VfsResult<()>;

    /// Create a single directory. The parent must exist.
    async fn make_directory(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn remove_directory(&self, path: &Path) -> VfsResult<()>;

    /// Move a file or directory. The source must exist.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Copy a file. The destination is created or replaced.
    async fn copy(&self, from: &Path, to: &Path) -> VfsResult<()>;

    // ========================================================================
    // Contents
    // ========================================================================

    /// Write `content` as the whole file, creating it if needed.
    async fn put(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Add `content` to the end of an existing file.
    async fn append(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Cut an existing file to zero length.
    async fn truncate(&self, path: &Path) -> VfsResult<()>;

    /// Read the whole file.
    async fn get(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Open a file for unit-by-unit editing.
    ///
    /// `None` picks the filesystem's configured mode and unit size.
    async fn open_sequence(
        &self,
        path: &Path,
        mode: Option<SequenceMode>,
        unit_size: Option<usize>,
    ) -> VfsResult<EditableSequence>;

    // ========================================================================
    // Directories
    // ========================================================================

    /// Entries of a directory, sorted by name.
    async fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Entry names of a directory, sorted. Empty for anything that is not a
    /// directory.
    async fn list(&self, path: &Path) -> VfsResult<Vec<String>>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Size of a file in bytes.
    async fn size(&self, path: &Path) -> VfsResult<u64>;

    /// Absolute, canonical location of an existing path on disk.
    async fn real_path(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Change permission bits.
    async fn set_file_mode(&self, path: &Path, mode: u32) -> VfsResult<()>;

    /// Permission bits (`0o777` mask).
    async fn file_mode(&self, path: &Path) -> VfsResult<u32>;

    async fn is_readable(&self, path: &Path) -> VfsResult<bool>;
    async fn is_writable(&self, path: &Path) -> VfsResult<bool>;
    async fn is_executable(&self, path: &Path) -> VfsResult<bool>;
    async fn is_file(&self, path: &Path) -> VfsResult<bool>;
    async fn is_directory(&self, path: &Path) -> VfsResult<bool>;

    /// Split a path into directory, basename, extension and stem.
    ///
    /// Purely lexical; the path does not have to exist.
    fn path_info(&self, path: &Path) -> VfsResult<PathInfo>;

    /// Attributes of a path, without following a final symlink.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }
}
