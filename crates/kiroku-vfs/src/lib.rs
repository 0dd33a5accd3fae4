//! Kiroku: a jailed local VFS with a random-access editor for flat files.
//!
//! - [`vfs`] - path-based operations over one directory root, and the
//!   driver that connects roots
//! - [`sequence`] - edit a file chunk by chunk or line by line, in place,
//!   without loading it into memory
//! - [`codec`] - decode and encode structured files (json, toml, ron)
//! - [`config`] - defaults for connected filesystems, loaded from RON
//!
//! ```no_run
//! use std::path::Path;
//! use kiroku_vfs::{FileSystem, FileSystemDriver, LocalDriver, RandomAccess, SequenceMode, Target};
//!
//! # async fn demo() -> kiroku_vfs::VfsResult<()> {
//! let fs = LocalDriver::new().connect(Path::new("/srv/data")).await?;
//! let mut log = fs
//!     .open_sequence(Path::new("app.log"), Some(SequenceMode::Line), None)
//!     .await?;
//!
//! log.set(Target::Index(3), Some(b"rewritten"))?;
//! log.delete(0)?;
//! log.close();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod sequence;
pub mod vfs;

pub use codec::{
    Codec, CodecNormalizer, CodecRegistry, FileSystemNormalizer, JsonCodec, MimeTable, RonCodec,
    TomlCodec, VoidNormalizer,
};
pub use config::{ConfigError, VfsConfig};
pub use sequence::{
    Cursor, DEFAULT_UNIT_SIZE, EditableSequence, RandomAccess, Records, SequenceMode, Sequential,
    Target,
};
pub use vfs::{
    DirEntry, FileAttr, FileSystem, FileSystemDriver, FileType, LocalDriver, LocalFileSystem,
    PathInfo, VfsError, VfsResult,
};
