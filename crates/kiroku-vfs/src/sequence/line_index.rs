//! Lazily-extended line → byte offset map.

use std::io;

use crate::sequence::stream::Stream;

/// Start offsets of the lines seen so far.
///
/// Line 0 always maps to offset 0. Known lines form a contiguous range
/// starting at 0 and their offsets strictly increase. Apart from line 0,
/// an offset is only recorded if a record actually starts there, so the
/// index never claims a line past the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    offsets: Vec<u64>,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LineIndex {
    pub fn new() -> Self {
        Self { offsets: vec![0] }
    }

    /// Number of lines whose start offset is known.
    pub fn known(&self) -> usize {
        self.offsets.len()
    }

    /// Start offset of `line`, if learned.
    pub fn offset(&self, line: u64) -> Option<u64> {
        usize::try_from(line)
            .ok()
            .and_then(|line| self.offsets.get(line))
            .copied()
    }

    /// Highest known line and its start offset.
    pub fn last(&self) -> (u64, u64) {
        let line = self.offsets.len() - 1;
        (line as u64, self.offsets[line])
    }

    /// Record the start of `line` if it directly follows the known range.
    ///
    /// Returns false (and records nothing) for anything that would break
    /// contiguity or ordering.
    pub fn record(&mut self, line: u64, offset: u64) -> bool {
        let (last_line, last_offset) = self.last();
        if line != last_line + 1 || offset <= last_offset {
            return false;
        }
        self.offsets.push(offset);
        true
    }

    /// Forget everything except `0 → 0`.
    pub fn reset(&mut self) {
        self.offsets.truncate(1);
    }

    /// Keep the first `lines` entries (never fewer than one).
    pub fn truncate(&mut self, lines: u64) {
        let keep = usize::try_from(lines).unwrap_or(usize::MAX).max(1);
        self.offsets.truncate(keep);
    }

    /// Learn line starts until `target` is known or the stream ends.
    ///
    /// Reads forward from the highest known line, one bounded record at a
    /// time. Leaves the stream pointer somewhere inside the scanned range.
    pub fn extend_to(&mut self, stream: &mut Stream, target: u64, max_len: usize) -> io::Result<()> {
        let (mut line, offset) = self.last();
        if target <= line {
            return Ok(());
        }

        stream.seek(offset)?;
        while line < target {
            if stream.probe_eof()? {
                break;
            }

            stream.read_line(max_len)?;
            let next = stream.position()?;
            if stream.probe_eof()? {
                break;
            }

            self.offsets.push(next);
            line += 1;
        }

        Ok(())
    }
}
