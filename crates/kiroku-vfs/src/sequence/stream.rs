//! Stream primitive.
//!
//! Wraps one open, seekable file handle and exposes the handful of
//! positioned operations the accessors are built from. The physical
//! read/write pointer is shared by every caller; nothing here tries to
//! preserve it across calls except [`Stream::probe_eof`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};

use crate::sequence::LINE_SEPARATOR;
use crate::vfs::{VfsError, VfsResult};

/// Bytes scanned per read while looking for a line separator.
const SCAN_BLOCK: usize = 512;

/// One open, seekable, lockable byte stream.
#[derive(Debug)]
pub struct Stream {
    file: File,
    label: String,
}

impl Stream {
    /// Wrap an already-open file. `label` shows up in lock errors and traces.
    pub fn new(file: File, label: impl Into<String>) -> Self {
        Self {
            file,
            label: label.into(),
        }
    }

    /// Name used in errors and spans.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Move the pointer to an absolute offset.
    pub fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Move the pointer to the end of the stream, returning its length.
    pub fn seek_end(&mut self) -> io::Result<u64> {
        self.file.seek(SeekFrom::End(0))
    }

    /// Current pointer position.
    pub fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    /// Read until `max` bytes are collected or the stream ends.
    pub fn read_up_to(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(max.min(SCAN_BLOCK * 8));
        Read::by_ref(&mut self.file)
            .take(max as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read one record: up to and including the next separator, at most
    /// `max` bytes, or whatever remains before the end of the stream.
    ///
    /// The pointer is left directly after the returned bytes.
    pub fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut block = [0u8; SCAN_BLOCK];

        while line.len() < max {
            let want = (max - line.len()).min(SCAN_BLOCK);
            let read = read_retrying(&mut self.file, &mut block[..want])?;
            if read == 0 {
                break;
            }

            if let Some(at) = memchr::memchr(LINE_SEPARATOR, &block[..read]) {
                line.extend_from_slice(&block[..=at]);
                let overshoot = (read - at - 1) as i64;
                if overshoot > 0 {
                    self.file.seek(SeekFrom::Current(-overshoot))?;
                }
                break;
            }

            line.extend_from_slice(&block[..read]);
        }

        Ok(line)
    }

    /// Write all bytes at the current position.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    /// Cut (or extend) the stream to `len` bytes. The pointer does not move.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    /// Returns true if nothing can be read at the current position.
    ///
    /// Attempts a single one-byte read and restores the pointer afterwards.
    /// A failed read is the only end-of-stream signal trusted here.
    pub fn probe_eof(&mut self) -> io::Result<bool> {
        let position = self.position()?;
        let mut byte = [0u8; 1];
        let read = read_retrying(&mut self.file, &mut byte)?;
        self.seek(position)?;
        Ok(read == 0)
    }

    /// Copy from the current position into `dst`, at most `limit` bytes
    /// (or through the end of the stream when `limit` is `None`).
    pub fn copy_into(&mut self, dst: &mut impl Write, limit: Option<u64>) -> io::Result<u64> {
        match limit {
            Some(limit) => io::copy(&mut Read::by_ref(&mut self.file).take(limit), dst),
            None => io::copy(&mut self.file, dst),
        }
    }

    /// Copy everything `src` yields into the stream at the current position.
    pub fn copy_from(&mut self, src: &mut impl Read) -> io::Result<u64> {
        io::copy(src, &mut self.file)
    }

    /// Try to take the exclusive whole-file lock without blocking.
    ///
    /// Returns `Ok(false)` when another open handle already holds it.
    pub fn try_lock_exclusive(&mut self) -> io::Result<bool> {
        use rustix::fs::{FlockOperation, flock};

        match flock(&self.file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => Ok(true),
            Err(e) if e == rustix::io::Errno::WOULDBLOCK => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Release the exclusive lock.
    pub fn unlock(&mut self) -> io::Result<()> {
        use rustix::fs::{FlockOperation, flock};

        flock(&self.file, FlockOperation::Unlock).map_err(io::Error::from)
    }
}

fn read_retrying(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Ok(read) => return Ok(read),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Exclusive lock held for the duration of one mutation.
///
/// Released on drop, so early returns and `?` never leak the lock.
pub struct StreamLock<'a> {
    stream: &'a mut Stream,
}

impl<'a> StreamLock<'a> {
    /// Take the lock or fail with [`VfsError::LockContention`].
    pub fn acquire(stream: &'a mut Stream) -> VfsResult<Self> {
        if stream.try_lock_exclusive()? {
            Ok(Self { stream })
        } else {
            Err(VfsError::lock_contention(stream.label()))
        }
    }
}

impl Deref for StreamLock<'_> {
    type Target = Stream;

    fn deref(&self) -> &Stream {
        self.stream
    }
}

impl DerefMut for StreamLock<'_> {
    fn deref_mut(&mut self) -> &mut Stream {
        self.stream
    }
}

impl Drop for StreamLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.stream.unlock() {
            tracing::warn!("failed to unlock {}: {}", self.stream.label(), e);
        }
    }
}
