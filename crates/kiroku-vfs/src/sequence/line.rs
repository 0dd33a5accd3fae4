//! Newline-delimited record access.
//!
//! Records are located through the [`LineIndex`]. A write that keeps the
//! record's length and stays one record is done in place; anything else is staged through a
//! temporary file and the index is reset, since every offset after the
//! edit point may have moved.

use crate::sequence::line_index::LineIndex;
use crate::sequence::staging::Staging;
use crate::sequence::stream::{Stream, StreamLock};
use crate::sequence::{LINE_SEPARATOR, strip_separator, trim_separators};
use crate::vfs::{VfsError, VfsResult};

/// Newline runs written per call when padding a sparse write.
const PAD_BLOCK: usize = 4096;

/// Largest offset a file may reach; `off_t` is signed.
const MAX_OFFSET: u64 = i64::MAX as u64;

pub(crate) struct LineAccessor<'a> {
    stream: &'a mut Stream,
    index: &'a mut LineIndex,
    max_len: usize,
}

impl<'a> LineAccessor<'a> {
    pub fn new(stream: &'a mut Stream, index: &'a mut LineIndex, max_len: usize) -> Self {
        Self {
            stream,
            index,
            max_len,
        }
    }

    pub fn exists(&mut self, line: u64) -> VfsResult<bool> {
        Ok(record_start(self.stream, self.index, line, self.max_len)?.is_some())
    }

    pub fn get(&mut self, line: u64) -> VfsResult<Option<Vec<u8>>> {
        let Some(start) = record_start(self.stream, self.index, line, self.max_len)? else {
            return Ok(None);
        };

        self.stream.seek(start)?;
        let mut record = self.stream.read_line(self.max_len)?;
        strip_separator(&mut record);
        Ok(Some(record))
    }

    /// Add a record after the current end of the stream.
    ///
    /// Trailing separators in `value` collapse into exactly one. An
    /// unterminated final record is terminated first so the new value
    /// never merges into it.
    pub fn append(&mut self, value: &[u8]) -> VfsResult<()> {
        let mut stream = StreamLock::acquire(&mut *self.stream)?;

        let end = stream.seek_end()?;
        if end > 0 {
            stream.seek(end - 1)?;
            let tail = stream.read_up_to(1)?;
            if tail != [LINE_SEPARATOR] {
                stream.write_all(&[LINE_SEPARATOR])?;
            }
        }

        self.index.reset();
        write_record(&mut stream, value)?;
        Ok(())
    }

    /// Overwrite record `line`, or delete it when `value` is `None`.
    ///
    /// Writing past the last record pads with empty records up to `line`.
    /// Deleting a record that does not exist changes nothing.
    pub fn set(&mut self, line: u64, value: Option<&[u8]>) -> VfsResult<()> {
        let max_len = self.max_len;
        let mut stream = StreamLock::acquire(&mut *self.stream)?;

        match record_start(&mut stream, self.index, line, max_len)? {
            Some(start) => replace_record(&mut stream, self.index, line, start, value, max_len),
            None => match value {
                Some(value) => write_past_end(&mut stream, self.index, line, value, max_len),
                None => Ok(()),
            },
        }
    }
}

/// Offset of `line` if a record actually starts there.
fn record_start(
    stream: &mut Stream,
    index: &mut LineIndex,
    line: u64,
    max_len: usize,
) -> VfsResult<Option<u64>> {
    index.extend_to(stream, line, max_len)?;
    let Some(start) = index.offset(line) else {
        return Ok(None);
    };

    stream.seek(start)?;
    if stream.probe_eof()? {
        return Ok(None);
    }
    Ok(Some(start))
}

fn write_record(stream: &mut Stream, value: &[u8]) -> VfsResult<()> {
    stream.write_all(trim_separators(value))?;
    stream.write_all(&[LINE_SEPARATOR])?;
    Ok(())
}

fn replace_record(
    stream: &mut Stream,
    index: &mut LineIndex,
    line: u64,
    start: u64,
    value: Option<&[u8]>,
    max_len: usize,
) -> VfsResult<()> {
    stream.seek(start)?;
    let old = stream.read_line(max_len)?;
    let after = stream.position()?;
    let is_last = stream.probe_eof()?;

    if is_last {
        stream.seek(start)?;
        match value {
            Some(value) => {
                write_record(stream, value)?;
                index.truncate(line + 1);
            }
            None => index.truncate(line),
        }
        let end = stream.position()?;
        stream.truncate(end)?;
        return Ok(());
    }

    // A value with an interior separator adds records, so every later
    // offset moves even when the byte length matches.
    if let Some(value) = value {
        let value = trim_separators(value);
        let terminated = old.last() == Some(&LINE_SEPARATOR);
        let single = memchr::memchr(LINE_SEPARATOR, value).is_none();
        if terminated && single && value.len() + 1 == old.len() {
            stream.seek(start)?;
            write_record(stream, value)?;
            return Ok(());
        }
    }

    let mut staging = Staging::new()?;
    stream.seek(0)?;
    staging.copy_from(stream, Some(start))?;
    if let Some(value) = value {
        staging.write(trim_separators(value))?;
        staging.write(&[LINE_SEPARATOR])?;
    }
    stream.seek(after)?;
    staging.copy_from(stream, None)?;
    let len = staging.commit(stream)?;
    index.reset();

    tracing::debug!(
        "rewrote {} for line {} ({} bytes), line index reset",
        stream.label(),
        line,
        len
    );
    Ok(())
}

/// Write `value` as record `line`, which lies past the last record.
fn write_past_end(
    stream: &mut Stream,
    index: &mut LineIndex,
    line: u64,
    value: &[u8],
    max_len: usize,
) -> VfsResult<()> {
    // extend_to stopped at the end of the stream, so the highest known
    // line is either the last record or an empty stream's line 0
    let (last_line, last_offset) = index.last();
    stream.seek(last_offset)?;
    let (records, terminated) = if stream.probe_eof()? {
        (last_line, true)
    } else {
        let tail = stream.read_line(max_len)?;
        (last_line + 1, tail.last() == Some(&LINE_SEPARATOR))
    };

    let mut padding = line - records;
    let end = stream.seek_end()?;
    let record_len = trim_separators(value).len() as u64 + 1;
    let fits = end
        .checked_add(u64::from(!terminated))
        .and_then(|at| at.checked_add(padding))
        .and_then(|at| at.checked_add(record_len))
        .is_some_and(|at| at <= MAX_OFFSET);
    if !fits {
        return Err(VfsError::invalid_argument(format!(
            "line {line} is beyond the addressable range"
        )));
    }

    if !terminated {
        stream.write_all(&[LINE_SEPARATOR])?;
    }

    let block = vec![LINE_SEPARATOR; PAD_BLOCK];
    while padding > 0 {
        let run = padding.min(PAD_BLOCK as u64) as usize;
        stream.write_all(&block[..run])?;
        padding -= run as u64;
    }

    write_record(stream, value)
}
