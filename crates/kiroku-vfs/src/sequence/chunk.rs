//! Fixed-width chunk access.
//!
//! Chunk `i` lives at bytes `[i * unit_size, (i + 1) * unit_size)`. Only
//! the final chunk may be shorter. No index is needed; every position is
//! plain arithmetic.

use crate::sequence::staging::Staging;
use crate::sequence::stream::{Stream, StreamLock};
use crate::vfs::{VfsError, VfsResult};

pub(crate) struct ChunkAccessor<'a> {
    stream: &'a mut Stream,
    unit_size: u64,
}

impl<'a> ChunkAccessor<'a> {
    pub fn new(stream: &'a mut Stream, unit_size: usize) -> Self {
        Self {
            stream,
            unit_size: unit_size as u64,
        }
    }

    fn offset_of(&self, index: u64) -> VfsResult<u64> {
        index.checked_mul(self.unit_size).ok_or_else(|| {
            VfsError::invalid_argument(format!("chunk {index} is beyond the addressable range"))
        })
    }

    pub fn exists(&mut self, index: u64) -> VfsResult<bool> {
        let offset = self.offset_of(index)?;
        self.stream.seek(offset)?;
        Ok(!self.stream.probe_eof()?)
    }

    pub fn get(&mut self, index: u64) -> VfsResult<Option<Vec<u8>>> {
        let offset = self.offset_of(index)?;
        self.stream.seek(offset)?;
        if self.stream.probe_eof()? {
            return Ok(None);
        }
        Ok(Some(self.stream.read_up_to(self.unit_size as usize)?))
    }

    /// Write raw bytes after the current end, no padding or truncation.
    pub fn append(&mut self, value: &[u8]) -> VfsResult<()> {
        let mut stream = StreamLock::acquire(&mut *self.stream)?;
        stream.seek_end()?;
        stream.write_all(value)?;
        Ok(())
    }

    /// Overwrite chunk `index`, or remove it when `value` is `None`.
    ///
    /// Removal is the same as writing an empty chunk: everything after it
    /// moves forward by the old chunk's width.
    pub fn set(&mut self, index: u64, value: Option<&[u8]>) -> VfsResult<()> {
        let value = value.unwrap_or_default();
        let unit_size = self.unit_size;
        let offset = self.offset_of(index)?;
        let next = index
            .checked_add(1)
            .ok_or_else(|| VfsError::invalid_argument(format!("chunk {index} has no successor")))?;
        let next = self.offset_of(next)?;

        let mut stream = StreamLock::acquire(&mut *self.stream)?;

        stream.seek(next)?;
        let is_last = stream.probe_eof()?;
        stream.seek(offset)?;

        if stream.probe_eof()? {
            stream.seek_end()?;
            stream.write_all(value)?;
            return Ok(());
        }

        if value.len() as u64 == unit_size {
            stream.write_all(value)?;
            return Ok(());
        }

        if is_last {
            stream.write_all(value)?;
            let end = stream.position()?;
            stream.truncate(end)?;
            return Ok(());
        }

        let mut staging = Staging::new()?;
        stream.seek(0)?;
        staging.copy_from(&mut stream, Some(offset))?;
        staging.write(value)?;
        stream.seek(next)?;
        staging.copy_from(&mut stream, None)?;
        let len = staging.commit(&mut stream)?;

        tracing::debug!(
            "rewrote {} for chunk {} ({} bytes)",
            stream.label(),
            index,
            len
        );
        Ok(())
    }
}
