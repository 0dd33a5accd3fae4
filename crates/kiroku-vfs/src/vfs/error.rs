//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Shared by the filesystem, the codec layer and the editable sequence so a
/// caller only ever matches on one enum.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Bad index, size or value handed to a sequence. Raised before anything is written.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Another writer holds the exclusive lock. Nothing was modified.
    #[error("file locked: {0}")]
    LockContention(String),

    /// The sequence was closed and its stream released.
    #[error("sequence is closed")]
    Closed,

    /// Codec lookup, encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A file could not be decoded into a value.
    #[error("could not normalize {path}: {source}")]
    Normalize {
        path: String,
        #[source]
        source: Box<VfsError>,
    },

    /// A value could not be encoded into a file.
    #[error("could not denormalize {path}: {source}")]
    Denormalize {
        path: String,
        #[source]
        source: Box<VfsError>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a LockContention error.
    pub fn lock_contention(target: impl Into<String>) -> Self {
        Self::LockContention(target.into())
    }

    /// Create a Codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Wrap a decode failure for `path`.
    pub fn normalize(path: impl Into<String>, source: VfsError) -> Self {
        Self::Normalize {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an encode failure for `path`.
    pub fn denormalize(path: impl Into<String>, source: VfsError) -> Self {
        Self::Denormalize {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Only lock contention qualifies; backoff is up to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VfsError::LockContention(_))
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "filesystem is read-only")
            }
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::LockContention(msg) => io::Error::new(io::ErrorKind::WouldBlock, msg),
            VfsError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, "sequence is closed"),
            VfsError::Codec(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            e @ (VfsError::Normalize { .. } | VfsError::Denormalize { .. }) => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lock_contention_is_retryable() {
        assert!(VfsError::lock_contention("a.txt").is_retryable());
        assert!(!VfsError::Closed.is_retryable());
        assert!(!VfsError::invalid_argument("zero").is_retryable());
    }

    #[test]
    fn test_io_kind_mapping() {
        let e: io::Error = VfsError::lock_contention("a.txt").into();
        assert_eq!(e.kind(), io::ErrorKind::WouldBlock);

        let e: io::Error = VfsError::path_escapes_root("../x").into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_normalize_keeps_cause() {
        let e = VfsError::normalize("conf.json", VfsError::codec("bad json"));
        assert_eq!(e.to_string(), "could not normalize conf.json: codec error: bad json");
        assert!(std::error::Error::source(&e).is_some());
    }
}
