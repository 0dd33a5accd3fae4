//! Filesystem backends.
//!
//! Backends implement [`FileSystem`](super::FileSystem) over a concrete
//! storage root.

mod local;

pub use local::LocalFileSystem;
