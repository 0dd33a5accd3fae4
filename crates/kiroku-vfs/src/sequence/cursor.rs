//! Forward-only traversal state.

use crate::sequence::{EditableSequence, SequenceMode, strip_separator};
use crate::vfs::VfsResult;

/// Logical position for sequential traversal.
///
/// Holds no stream state of its own. Random access moves the shared file
/// pointer behind the cursor's back, so every read first reconciles the
/// physical position with the logical one.
///
/// A sequence carries one cursor for its [`Sequential`](crate::Sequential)
/// impl, but any number of standalone cursors can walk the same sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    position: u64,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Step to the next unit. Touches no stream.
    pub fn advance(&mut self) {
        self.position = self.position.saturating_add(1);
    }

    /// Go back to the start of the stream.
    pub fn rewind(&mut self, seq: &mut EditableSequence) -> VfsResult<()> {
        seq.parts()?.stream.seek(0)?;
        self.position = 0;
        Ok(())
    }

    /// Put the stream pointer where the cursor's unit starts.
    ///
    /// Positions that cannot be located (past the last line, or beyond the
    /// addressable chunk range) park the pointer at end of stream.
    pub fn reconcile_position(&self, seq: &mut EditableSequence) -> VfsResult<()> {
        let parts = seq.parts()?;
        let expected = match parts.mode {
            SequenceMode::Chunk => self.position.checked_mul(parts.unit_size as u64),
            SequenceMode::Line => {
                parts
                    .index
                    .extend_to(parts.stream, self.position, parts.unit_size)?;
                parts.index.offset(self.position)
            }
        };

        match expected {
            Some(offset) => {
                if parts.stream.position()? != offset {
                    parts.stream.seek(offset)?;
                }
            }
            None => {
                parts.stream.seek_end()?;
            }
        }
        Ok(())
    }

    /// Returns true while a unit exists at the cursor.
    pub fn is_valid(&self, seq: &mut EditableSequence) -> VfsResult<bool> {
        self.reconcile_position(seq)?;
        Ok(!seq.parts()?.stream.probe_eof()?)
    }

    /// Read the unit at the cursor.
    ///
    /// In line mode the start of the following line is recorded in the
    /// index, since reading the record already found it.
    pub fn current(&self, seq: &mut EditableSequence) -> VfsResult<Vec<u8>> {
        self.reconcile_position(seq)?;
        let parts = seq.parts()?;

        match parts.mode {
            SequenceMode::Chunk => Ok(parts.stream.read_up_to(parts.unit_size)?),
            SequenceMode::Line => {
                let mut record = parts.stream.read_line(parts.unit_size)?;
                let end = parts.stream.position()?;
                if !parts.stream.probe_eof()? {
                    parts.index.record(self.position.saturating_add(1), end);
                }
                strip_separator(&mut record);
                Ok(record)
            }
        }
    }
}
