//! Random-access editor for flat files.
//!
//! An [`EditableSequence`] exposes a file as a sequence of addressable
//! units, either fixed-size byte chunks or newline-delimited records,
//! without loading the file into memory.
//!
//! ## Layout
//!
//! - [`Stream`] - the open file plus positioned read/write/lock primitives
//! - [`LineIndex`] - lazily-built line → offset map (line mode only)
//! - `ChunkAccessor` / `LineAccessor` - per-mode get/set/exists
//! - [`Cursor`] - forward traversal, independent of random access
//!
//! ## Capabilities
//!
//! Random access ([`RandomAccess`]) and traversal ([`Sequential`]) are
//! separate traits over the same owner. Both borrow the one stream, so a
//! random read in the middle of a traversal is fine; the cursor re-seeks
//! before its next read.
//!
//! ## Concurrency
//!
//! Writes take a non-blocking exclusive `flock` for their whole duration,
//! including staged rewrites. Reads take no lock and can observe another
//! process's rewrite half-way through.

mod chunk;
mod cursor;
mod line;
mod line_index;
mod staging;
mod stream;

use std::fs::File;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::vfs::{VfsError, VfsResult};
use chunk::ChunkAccessor;
use line::LineAccessor;

pub use cursor::Cursor;
pub use line_index::LineIndex;
pub use stream::{Stream, StreamLock};

/// Unit size used when none is configured: chunk width, or maximum line length.
pub const DEFAULT_UNIT_SIZE: usize = 4096;

/// Record terminator in line mode.
pub const LINE_SEPARATOR: u8 = b'\n';

/// How a file is split into units. Fixed at construction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SequenceMode {
    /// Fixed-width byte chunks.
    #[default]
    Chunk,
    /// Newline-delimited records.
    Line,
}

/// Where a `set` lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An explicit unit index.
    Index(u64),
    /// After the current end of the stream.
    Append,
}

impl From<u64> for Target {
    fn from(index: u64) -> Self {
        Target::Index(index)
    }
}

/// Index-addressed access to units.
pub trait RandomAccess {
    /// Returns true if a unit exists at `index`.
    fn exists(&mut self, index: u64) -> VfsResult<bool>;

    /// Read the unit at `index`, line separators stripped.
    fn get(&mut self, index: u64) -> VfsResult<Option<Vec<u8>>>;

    /// Write `value` at `target`. `None` at an index deletes that unit and
    /// shifts everything after it forward.
    ///
    /// In line mode an index past the last record is reached by padding
    /// with empty records, one byte each, so a far index writes that many
    /// bytes. Indexes whose record would land beyond the largest file
    /// offset fail with [`VfsError::InvalidArgument`]. A value with interior
    /// separators, or longer than the unit size, is written as given and
    /// reads back as several records.
    fn set(&mut self, target: Target, value: Option<&[u8]>) -> VfsResult<()>;

    /// Remove the unit at `index`. Same as `set(Target::Index(index), None)`.
    fn delete(&mut self, index: u64) -> VfsResult<()> {
        self.set(Target::Index(index), None)
    }

    /// Add a unit after the current end.
    fn push(&mut self, value: &[u8]) -> VfsResult<()> {
        self.set(Target::Append, Some(value))
    }
}

/// Forward-only traversal.
///
/// Finishes when `is_valid` observes end of stream, never on a count.
pub trait Sequential {
    fn rewind(&mut self) -> VfsResult<()>;
    fn advance(&mut self);
    fn current(&mut self) -> VfsResult<Vec<u8>>;
    fn position(&self) -> u64;
    fn is_valid(&mut self) -> VfsResult<bool>;
}

/// Borrowed view of the pieces the accessors and cursor work on.
pub(crate) struct Parts<'a> {
    pub stream: &'a mut Stream,
    pub index: &'a mut LineIndex,
    pub mode: SequenceMode,
    pub unit_size: usize,
}

/// A flat file edited unit by unit.
///
/// Owns the stream. It is released exactly once: by [`close`](Self::close)
/// or when the sequence is dropped. Every operation after `close` fails
/// with [`VfsError::Closed`].
///
/// Not meant to be shared between threads; the line index and cursor are
/// unsynchronized.
#[derive(Debug)]
pub struct EditableSequence {
    stream: Option<Stream>,
    label: String,
    mode: SequenceMode,
    unit_size: usize,
    index: LineIndex,
    cursor: Cursor,
}

impl EditableSequence {
    /// Wrap an already-open, readable and writable file.
    ///
    /// `unit_size` is the chunk width in chunk mode and the maximum record
    /// length in line mode. Zero is rejected.
    pub fn new(file: File, mode: SequenceMode, unit_size: usize) -> VfsResult<Self> {
        Self::with_label(file, "<stream>", mode, unit_size)
    }

    /// Like [`new`](Self::new), naming the stream for errors and traces.
    pub fn with_label(
        file: File,
        label: impl Into<String>,
        mode: SequenceMode,
        unit_size: usize,
    ) -> VfsResult<Self> {
        if unit_size == 0 {
            return Err(VfsError::invalid_argument("unit size must be positive"));
        }

        let label = label.into();
        Ok(Self {
            stream: Some(Stream::new(file, label.clone())),
            label,
            mode,
            unit_size,
            index: LineIndex::new(),
            cursor: Cursor::new(),
        })
    }

    pub fn mode(&self) -> SequenceMode {
        self.mode
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Release the stream. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("closed sequence {}", self.label);
        }
    }

    /// Iterate the units from the start, using the sequence's own cursor.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            seq: self,
            started: false,
            done: false,
        }
    }

    pub(crate) fn parts(&mut self) -> VfsResult<Parts<'_>> {
        let stream = self.stream.as_mut().ok_or(VfsError::Closed)?;
        Ok(Parts {
            stream,
            index: &mut self.index,
            mode: self.mode,
            unit_size: self.unit_size,
        })
    }

    fn chunks(&mut self) -> VfsResult<ChunkAccessor<'_>> {
        let stream = self.stream.as_mut().ok_or(VfsError::Closed)?;
        Ok(ChunkAccessor::new(stream, self.unit_size))
    }

    fn lines(&mut self) -> VfsResult<LineAccessor<'_>> {
        let stream = self.stream.as_mut().ok_or(VfsError::Closed)?;
        Ok(LineAccessor::new(stream, &mut self.index, self.unit_size))
    }
}

impl Drop for EditableSequence {
    fn drop(&mut self) {
        self.close();
    }
}

impl RandomAccess for EditableSequence {
    fn exists(&mut self, index: u64) -> VfsResult<bool> {
        match self.mode {
            SequenceMode::Chunk => self.chunks()?.exists(index),
            SequenceMode::Line => self.lines()?.exists(index),
        }
    }

    fn get(&mut self, index: u64) -> VfsResult<Option<Vec<u8>>> {
        match self.mode {
            SequenceMode::Chunk => self.chunks()?.get(index),
            SequenceMode::Line => self.lines()?.get(index),
        }
    }

    #[tracing::instrument(skip(self, value), fields(stream = %self.label, mode = %self.mode), name = "sequence.set")]
    fn set(&mut self, target: Target, value: Option<&[u8]>) -> VfsResult<()> {
        match (self.mode, target) {
            (SequenceMode::Chunk, Target::Append) => {
                self.chunks()?.append(value.unwrap_or_default())
            }
            (SequenceMode::Chunk, Target::Index(index)) => self.chunks()?.set(index, value),
            (SequenceMode::Line, Target::Append) => self.lines()?.append(value.unwrap_or_default()),
            (SequenceMode::Line, Target::Index(index)) => self.lines()?.set(index, value),
        }
    }
}

impl Sequential for EditableSequence {
    fn rewind(&mut self) -> VfsResult<()> {
        let mut cursor = self.cursor;
        cursor.rewind(self)?;
        self.cursor = cursor;
        Ok(())
    }

    fn advance(&mut self) {
        self.cursor.advance();
    }

    fn current(&mut self) -> VfsResult<Vec<u8>> {
        let cursor = self.cursor;
        cursor.current(self)
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn is_valid(&mut self) -> VfsResult<bool> {
        let cursor = self.cursor;
        cursor.is_valid(self)
    }
}

/// Iterator over every unit, from the start, until end of stream.
///
/// Yields the error and stops if an I/O step fails.
pub struct Records<'a> {
    seq: &'a mut EditableSequence,
    started: bool,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = VfsResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if !self.started {
            self.started = true;
            if let Err(e) = self.seq.rewind() {
                self.done = true;
                return Some(Err(e));
            }
        }

        match self.seq.is_valid() {
            Ok(true) => {
                let unit = self.seq.current();
                self.seq.advance();
                if unit.is_err() {
                    self.done = true;
                }
                Some(unit)
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Drop one trailing separator, as read records carry it.
pub(crate) fn strip_separator(record: &mut Vec<u8>) {
    if record.last() == Some(&LINE_SEPARATOR) {
        record.pop();
    }
}

/// Drop every trailing separator before a value is written as a record.
pub(crate) fn trim_separators(value: &[u8]) -> &[u8] {
    let end = value
        .iter()
        .rposition(|&b| b != LINE_SEPARATOR)
        .map_or(0, |at| at + 1);
    &value[..end]
}
