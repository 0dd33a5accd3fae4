//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use async_trait::async_trait;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::VfsConfig;
use crate::sequence::{EditableSequence, SequenceMode};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::FileSystem;
use crate::vfs::types::{DirEntry, FileAttr, FileType, PathInfo, rooted};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/data`, then `get("logs/app.log")` reads `/srv/data/logs/app.log`.
///
/// Path security is enforced twice: lexically, `..` may never climb above
/// the root; and on disk, whatever an existing path (or its parent)
/// canonicalizes to must still be under the root, so symlinks cannot be
/// used to leave it either.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    config: VfsConfig,
}

impl LocalFileSystem {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, VfsConfig::default())
    }

    /// Create a local filesystem with explicit defaults.
    pub fn with_config(root: impl Into<PathBuf>, config: VfsConfig) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self { root, config }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, VfsConfig::default().with_read_only(true))
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.config.read_only = read_only;
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Normalize `path` into a root-relative path without touching the disk.
    ///
    /// `.` and leading `/` are dropped; `..` pops a component and fails
    /// once there is nothing left to pop.
    fn relative(&self, path: &Path) -> VfsResult<PathBuf> {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir if out.pop() => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(VfsError::path_escapes_root(path.display().to_string()));
                }
            }
        }
        Ok(out)
    }

    /// Root-relative form of `path`, rendered with a leading `/`.
    pub fn virtual_path(&self, path: &Path) -> VfsResult<String> {
        Ok(rooted(&self.relative(path)?))
    }

    /// Resolve a path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root, lexically or through
    /// a symlink.
    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let full = self.root.join(self.relative(path)?);

        // For new files, the parent decides where they would land
        let probe = if full.exists() {
            Some(full.as_path())
        } else {
            full.parent().filter(|parent| parent.exists())
        };

        if let Some(probe) = probe {
            let canonical = dunce::canonicalize(probe).map_err(io_error(path))?;
            if !canonical.starts_with(&self.root) {
                return Err(VfsError::path_escapes_root(format!(
                    "{} is not under {}",
                    canonical.display(),
                    self.root.display()
                )));
            }
        }

        Ok(full)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.config.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    async fn metadata(&self, path: &Path) -> VfsResult<Option<std::fs::Metadata>> {
        let full_path = self.resolve(path)?;
        match fs::metadata(&full_path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    async fn access(&self, path: &Path, mode: rustix::fs::Access) -> VfsResult<bool> {
        let full_path = self.resolve(path)?;
        Ok(rustix::fs::access(&full_path, mode).is_ok())
    }
}

/// Map an OS error for `path` onto the matching VFS error.
fn io_error(path: &Path) -> impl FnOnce(io::Error) -> VfsError + '_ {
    move |e| {
        let name = path.display().to_string();
        match e.kind() {
            io::ErrorKind::NotFound => VfsError::not_found(name),
            io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(name),
            io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(name),
            io::ErrorKind::NotADirectory => VfsError::not_a_directory(name),
            io::ErrorKind::IsADirectory => VfsError::is_a_directory(name),
            _ => VfsError::Io(e),
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    #[tracing::instrument(skip(self), name = "fs.touch")]
    async fn touch(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full_path)
            .await
            .map_err(io_error(path))?;

        let file = file.into_std().await;
        file.set_modified(SystemTime::now())
            .map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.make_directory")]
    async fn make_directory(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        fs::create_dir(&full_path).await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.remove_directory")]
    async fn remove_directory(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        fs::remove_dir(&full_path).await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.rename")]
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;

        fs::rename(&from_path, &to_path)
            .await
            .map_err(io_error(from))
    }

    #[tracing::instrument(skip(self), name = "fs.unlink")]
    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path).await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.copy")]
    async fn copy(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;

        let copied = fs::copy(&from_path, &to_path)
            .await
            .map_err(io_error(from))?;
        tracing::debug!("copied {} bytes", copied);
        Ok(())
    }

    #[tracing::instrument(skip(self, content), fields(len = content.len()), name = "fs.put")]
    async fn put(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        fs::write(&full_path, content).await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self, content), fields(len = content.len()), name = "fs.append")]
    async fn append(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&full_path)
            .await
            .map_err(io_error(path))?;

        file.write_all(content).await.map_err(io_error(path))?;
        file.flush().await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.truncate")]
    async fn truncate(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new()
            .write(true)
            .open(&full_path)
            .await
            .map_err(io_error(path))?;

        file.set_len(0).await.map_err(io_error(path))
    }

    async fn get(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path).await.map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.open_sequence")]
    async fn open_sequence(
        &self,
        path: &Path,
        mode: Option<SequenceMode>,
        unit_size: Option<usize>,
    ) -> VfsResult<EditableSequence> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        match fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(VfsError::not_found(path.display().to_string())),
            Err(e) => return Err(io_error(path)(e)),
        }

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&full_path)
            .await
            .map_err(io_error(path))?
            .into_std()
            .await;

        EditableSequence::with_label(
            file,
            self.virtual_path(path)?,
            mode.unwrap_or(self.config.mode),
            unit_size.unwrap_or(self.config.unit_size),
        )
    }

    async fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        if !fs::metadata(&full_path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(VfsError::not_found(path.display().to_string()));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await.map_err(io_error(path))?;

        while let Some(entry) = dir.next_entry().await.map_err(io_error(path))? {
            let file_type = entry.file_type().await.map_err(io_error(path))?;
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy(),
                FileType::from_std(file_type),
            ));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn list(&self, path: &Path) -> VfsResult<Vec<String>> {
        if !self.is_directory(path).await? {
            return Ok(Vec::new());
        }

        Ok(self
            .read_dir(path)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    async fn size(&self, path: &Path) -> VfsResult<u64> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await.map_err(io_error(path))?;
        Ok(meta.len())
    }

    async fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        let full_path = self.resolve(path)?;
        dunce::canonicalize(&full_path).map_err(io_error(path))
    }

    #[tracing::instrument(skip(self), name = "fs.set_file_mode")]
    async fn set_file_mode(&self, path: &Path, mode: u32) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
        fs::set_permissions(&full_path, permissions)
            .await
            .map_err(io_error(path))
    }

    async fn file_mode(&self, path: &Path) -> VfsResult<u32> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await.map_err(io_error(path))?;
        Ok(meta.permissions().mode() & 0o777)
    }

    async fn is_readable(&self, path: &Path) -> VfsResult<bool> {
        self.access(path, rustix::fs::Access::READ_OK).await
    }

    async fn is_writable(&self, path: &Path) -> VfsResult<bool> {
        self.access(path, rustix::fs::Access::WRITE_OK).await
    }

    async fn is_executable(&self, path: &Path) -> VfsResult<bool> {
        self.access(path, rustix::fs::Access::EXEC_OK).await
    }

    async fn is_file(&self, path: &Path) -> VfsResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|meta| meta.is_file()))
    }

    async fn is_directory(&self, path: &Path) -> VfsResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|meta| meta.is_dir()))
    }

    fn path_info(&self, path: &Path) -> VfsResult<PathInfo> {
        Ok(PathInfo::from_relative(&self.relative(path)?))
    }

    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(io_error(path))?;
        Ok(FileAttr::from(&meta))
    }

    fn read_only(&self) -> bool {
        self.config.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::RandomAccess;
    use tempfile::TempDir;

    async fn setup() -> (LocalFileSystem, TempDir) {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        (fs, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("test.txt"), b"hello world").await.unwrap();
        assert_eq!(fs.get(Path::new("test.txt")).await.unwrap(), b"hello world");
        assert_eq!(fs.size(Path::new("/test.txt")).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_append_requires_existing_file() {
        let (fs, _dir) = setup().await;

        let err = fs.append(Path::new("missing.txt"), b"x").await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        fs.put(Path::new("log.txt"), b"a").await.unwrap();
        fs.append(Path::new("log.txt"), b"b").await.unwrap();
        assert_eq!(fs.get(Path::new("log.txt")).await.unwrap(), b"ab");
    }

    #[tokio::test]
    async fn test_touch_creates_empty_file() {
        let (fs, _dir) = setup().await;

        fs.touch(Path::new("empty")).await.unwrap();
        assert!(fs.is_file(Path::new("empty")).await.unwrap());
        assert_eq!(fs.size(Path::new("empty")).await.unwrap(), 0);

        fs.put(Path::new("full"), b"keep").await.unwrap();
        fs.touch(Path::new("full")).await.unwrap();
        assert_eq!(fs.get(Path::new("full")).await.unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_truncate() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("test.txt"), b"hello world").await.unwrap();
        fs.truncate(Path::new("test.txt")).await.unwrap();
        assert_eq!(fs.size(Path::new("test.txt")).await.unwrap(), 0);

        let err = fs.truncate(Path::new("nope.txt")).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directories() {
        let (fs, _dir) = setup().await;

        fs.make_directory(Path::new("sub")).await.unwrap();
        fs.put(Path::new("sub/b.txt"), b"").await.unwrap();
        fs.put(Path::new("sub/a.txt"), b"").await.unwrap();
        fs.make_directory(Path::new("sub/inner")).await.unwrap();

        let entries = fs.read_dir(Path::new("sub")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry::new("a.txt", FileType::File),
                DirEntry::new("b.txt", FileType::File),
                DirEntry::new("inner", FileType::Directory),
            ]
        );
        assert_eq!(
            fs.list(Path::new("sub")).await.unwrap(),
            vec!["a.txt", "b.txt", "inner"]
        );

        fs.remove_directory(Path::new("sub/inner")).await.unwrap();
        assert!(!fs.is_directory(Path::new("sub/inner")).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_of_non_directory_is_empty() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("file.txt"), b"x").await.unwrap();
        assert!(fs.list(Path::new("file.txt")).await.unwrap().is_empty());
        assert!(fs.list(Path::new("missing")).await.unwrap().is_empty());

        let err = fs.read_dir(Path::new("file.txt")).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_make_directory_needs_parent() {
        let (fs, _dir) = setup().await;

        let err = fs.make_directory(Path::new("a/b")).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_and_copy() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("old.txt"), b"content").await.unwrap();
        fs.rename(Path::new("old.txt"), Path::new("new.txt"))
            .await
            .unwrap();
        assert!(!fs.exists(Path::new("old.txt")).await);

        fs.copy(Path::new("new.txt"), Path::new("copy.txt"))
            .await
            .unwrap();
        assert_eq!(fs.get(Path::new("copy.txt")).await.unwrap(), b"content");
        assert_eq!(fs.get(Path::new("new.txt")).await.unwrap(), b"content");

        fs.unlink(Path::new("new.txt")).await.unwrap();
        assert!(!fs.is_file(Path::new("new.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_mode() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("run.sh"), b"#!/bin/sh\n").await.unwrap();
        fs.set_file_mode(Path::new("run.sh"), 0o750).await.unwrap();
        assert_eq!(fs.file_mode(Path::new("run.sh")).await.unwrap(), 0o750);
        assert!(fs.is_executable(Path::new("run.sh")).await.unwrap());

        fs.set_file_mode(Path::new("run.sh"), 0o644).await.unwrap();
        assert!(!fs.is_executable(Path::new("run.sh")).await.unwrap());
        assert!(fs.is_readable(Path::new("run.sh")).await.unwrap());
        assert!(!fs.is_readable(Path::new("ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_only() {
        let (mut fs, _dir) = setup().await;
        fs.put(Path::new("keep.txt"), b"x").await.unwrap();
        fs.set_read_only(true);

        assert!(matches!(
            fs.put(Path::new("test.txt"), b"x").await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(fs.unlink(Path::new("keep.txt")).await, Err(VfsError::ReadOnly)));
        assert!(matches!(
            fs.open_sequence(Path::new("keep.txt"), None, None).await,
            Err(VfsError::ReadOnly)
        ));
        assert_eq!(fs.get(Path::new("keep.txt")).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (fs, _dir) = setup().await;

        let result = fs.get(Path::new("../../../etc/passwd")).await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));

        let result = fs.put(Path::new("a/../../x"), b"").await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));

        assert!(matches!(
            fs.virtual_path(Path::new("a/b/../../..")),
            Err(VfsError::PathEscapesRoot(_))
        ));
        assert_eq!(fs.virtual_path(Path::new("a/b/../..")).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_dot_dot_inside_root_is_fine() {
        let (fs, _dir) = setup().await;

        fs.make_directory(Path::new("a")).await.unwrap();
        fs.put(Path::new("a/../top.txt"), b"t").await.unwrap();
        assert_eq!(fs.get(Path::new("top.txt")).await.unwrap(), b"t");
    }

    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let (fs, dir) = setup().await;
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();

        let result = fs.get(Path::new("out/secret")).await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_real_path() {
        let (fs, dir) = setup().await;
        std::fs::write(dir.path().join("test.txt"), "hello").unwrap();

        let real = fs.real_path(Path::new("test.txt")).await.unwrap();
        assert!(real.is_absolute());
        assert!(real.starts_with(fs.root()));
        assert!(real.ends_with("test.txt"));

        let result = fs.real_path(Path::new("nonexistent.txt")).await;
        assert!(matches!(result, Err(VfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_info_and_virtual_path() {
        let (fs, _dir) = setup().await;

        let info = fs.path_info(Path::new("./conf/../conf/app.json")).unwrap();
        assert_eq!(info.dirname, "/conf");
        assert_eq!(info.filename, "app");
        assert_eq!(fs.virtual_path(Path::new("x/./y")).unwrap(), "/x/y");
        assert!(fs.path_info(Path::new("../x")).is_err());
    }

    #[tokio::test]
    async fn test_getattr() {
        let (fs, _dir) = setup().await;

        fs.put(Path::new("f"), b"abc").await.unwrap();
        let attr = fs.getattr(Path::new("f")).await.unwrap();
        assert!(attr.is_file());
        assert_eq!(attr.size, 3);

        let root = fs.getattr(Path::new("")).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_open_sequence_uses_config_defaults() {
        let dir = TempDir::new().unwrap();
        let config = VfsConfig::default()
            .with_mode(SequenceMode::Line)
            .with_unit_size(128);
        let fs = LocalFileSystem::with_config(dir.path(), config);
        fs.put(Path::new("lines.txt"), b"one\ntwo\n").await.unwrap();

        let mut seq = fs
            .open_sequence(Path::new("lines.txt"), None, None)
            .await
            .unwrap();
        assert_eq!(seq.mode(), SequenceMode::Line);
        assert_eq!(seq.unit_size(), 128);
        assert_eq!(seq.label(), "/lines.txt");
        assert_eq!(seq.get(1).unwrap().unwrap(), b"two");

        let seq = fs
            .open_sequence(Path::new("lines.txt"), Some(SequenceMode::Chunk), Some(3))
            .await
            .unwrap();
        assert_eq!(seq.mode(), SequenceMode::Chunk);
    }

    #[tokio::test]
    async fn test_open_sequence_rejects_missing_and_directories() {
        let (fs, _dir) = setup().await;
        fs.make_directory(Path::new("d")).await.unwrap();

        assert!(matches!(
            fs.open_sequence(Path::new("nope"), None, None).await,
            Err(VfsError::NotFound(_))
        ));
        assert!(matches!(
            fs.open_sequence(Path::new("d"), None, None).await,
            Err(VfsError::NotFound(_))
        ));
    }
}
