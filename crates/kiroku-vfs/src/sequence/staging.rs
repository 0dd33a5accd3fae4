//! Scratch buffer for rewrites that change the length of a unit.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use crate::sequence::stream::Stream;

/// Anonymous temporary file that collects the new stream contents.
///
/// Lives for a single `set` call; the OS reclaims it when dropped, whether
/// the rewrite finished or not.
pub(crate) struct Staging {
    file: File,
    len: u64,
}

impl Staging {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            len: 0,
        })
    }

    /// Copy from the stream's current position, at most `limit` bytes.
    pub fn copy_from(&mut self, stream: &mut Stream, limit: Option<u64>) -> io::Result<()> {
        self.len += stream.copy_into(&mut self.file, limit)?;
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Replace the stream contents with the staged bytes.
    ///
    /// Not atomic: a failure while copying back leaves the stream partially
    /// overwritten.
    pub fn commit(mut self, stream: &mut Stream) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(0))?;
        stream.seek(0)?;
        stream.copy_from(&mut self.file)?;
        stream.truncate(self.len)?;
        Ok(self.len)
    }
}
