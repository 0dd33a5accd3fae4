//! Jailed filesystem abstraction.
//!
//! Key components:
//!
//! - [`FileSystem`] - whole-file, path-based operations over one root
//! - [`LocalFileSystem`] - local directory tree (with path security)
//! - [`FileSystemDriver`] / [`LocalDriver`] - connect roots and hand out
//!   the normalizer used to read and write structured files
//!
//! ## Design Decisions
//!
//! - **Root-relative paths**: every path is resolved against the root and
//!   rejected if it leaves it, lexically or through a symlink.
//! - **Read-only is a mode, not a backend**: the same backend refuses every
//!   mutation when configured read-only.
//! - **Editing goes through sequences**: random-access edits of one file
//!   happen on an [`EditableSequence`](crate::EditableSequence) opened by
//!   [`FileSystem::open_sequence`], never through the whole-file calls.

pub mod backends;
mod driver;
mod error;
mod ops;
mod types;

pub use backends::LocalFileSystem;
pub use driver::{FileSystemDriver, LocalDriver};
pub use error::{VfsError, VfsResult};
pub use ops::FileSystem;
pub use types::{DirEntry, FileAttr, FileType, PathInfo};
