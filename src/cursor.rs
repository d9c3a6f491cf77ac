//! Positional byte cursor over a shared immutable buffer.
//!
//! A [`ByteStream`] is a window `[start, end)` into a reference-counted
//! [`Bytes`] buffer plus a read position. Forking a stream produces another
//! window over the same allocation with its own position, so page and
//! resource views never copy the underlying document.
//!
//! All integers are big-endian unless the method name says otherwise.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// A byte range into the outermost document buffer.
///
/// Offsets are absolute from the first byte of the buffer the document was
/// opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ByteRange {
    /// Absolute start offset
    pub offset: u32,
    /// Length in bytes
    pub length: u32,
}

impl ByteRange {
    /// Create a new range.
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> usize {
        self.offset as usize + self.length as usize
    }

    /// Whether the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Zero-copy view of this range inside `buffer`.
    pub fn slice_of(&self, buffer: &Bytes) -> Result<Bytes> {
        if self.end() > buffer.len() {
            return Err(Error::TruncatedInput {
                offset: self.offset as usize,
                needed: self.length as usize,
                available: buffer.len().saturating_sub(self.offset as usize),
            });
        }
        Ok(buffer.slice(self.offset as usize..self.end()))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

/// Cursor over a window of a shared byte buffer.
#[derive(Clone)]
pub struct ByteStream {
    data: Bytes,
    start: usize,
    end: usize,
    pos: usize,
}

impl ByteStream {
    /// Create a stream covering the whole buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let end = data.len();
        Self {
            data,
            start: 0,
            end,
            pos: 0,
        }
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Read position relative to the start of the view.
    pub fn position(&self) -> usize {
        self.pos - self.start
    }

    /// Read position relative to the start of the backing buffer.
    pub fn absolute_position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the read position and the end of the view.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Whether every byte of the view has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.end
    }

    /// Absolute range covered by this view.
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.start as u32, self.len() as u32)
    }

    /// Zero-copy handle to the bytes of this view.
    pub fn as_bytes(&self) -> Bytes {
        self.data.slice(self.start..self.end)
    }

    /// The whole backing buffer, independent of the view.
    pub fn buffer(&self) -> &Bytes {
        &self.data
    }

    /// Move the read position to `offset` bytes past the start of the view.
    pub fn seek_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(Error::TruncatedInput {
                offset: self.start + offset,
                needed: 0,
                available: 0,
            });
        }
        self.pos = self.start + offset;
        Ok(())
    }

    /// Move the read position by `delta` bytes.
    pub fn seek_by(&mut self, delta: i64) -> Result<()> {
        let target = self.position() as i64 + delta;
        if target < 0 {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed: delta.unsigned_abs() as usize,
                available: self.position(),
            });
        }
        self.seek_to(target as usize)
    }

    /// Skip `n` bytes; fails without moving if fewer remain.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.ensure(n)?;
        let at = self.pos;
        self.pos += n;
        Ok(&self.data[at..at + n])
    }

    /// Read one unsigned byte.
    pub fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian `u16`.
    pub fn uint16(&mut self) -> Result<u16> {
        self.take(2).map(BigEndian::read_u16)
    }

    /// Read a little-endian `u16`.
    pub fn uint16_le(&mut self) -> Result<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    /// Read a big-endian 24-bit unsigned integer.
    pub fn uint24(&mut self) -> Result<u32> {
        self.take(3).map(BigEndian::read_u24)
    }

    /// Read a big-endian `u32`.
    pub fn uint32(&mut self) -> Result<u32> {
        self.take(4).map(BigEndian::read_u32)
    }

    /// Read a big-endian `i32`.
    pub fn int32(&mut self) -> Result<i32> {
        self.take(4).map(BigEndian::read_i32)
    }

    /// Read a 4-byte tag.
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let raw = self.take(4)?;
        Ok([raw[0], raw[1], raw[2], raw[3]])
    }

    /// Read `n` bytes as a zero-copy slice of the backing buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.ensure(n)?;
        let at = self.pos;
        self.pos += n;
        Ok(self.data.slice(at..at + n))
    }

    /// Read a NUL-terminated string.
    ///
    /// The terminator is consumed. A string that runs into the end of the
    /// view without a terminator is returned as-is. Invalid UTF-8 is replaced.
    pub fn read_str_nt(&mut self) -> Result<String> {
        if self.is_exhausted() {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed: 1,
                available: 0,
            });
        }
        let window = &self.data[self.pos..self.end];
        let (text, consumed) = match window.iter().position(|&b| b == 0) {
            Some(nul) => (&window[..nul], nul + 1),
            None => (window, window.len()),
        };
        let s = String::from_utf8_lossy(text).into_owned();
        self.pos += consumed;
        Ok(s)
    }

    /// Fork a view of the next `len` bytes without moving this stream.
    pub fn fork(&self, len: usize) -> Result<ByteStream> {
        self.ensure(len)?;
        Ok(ByteStream {
            data: self.data.clone(),
            start: self.pos,
            end: self.pos + len,
            pos: self.pos,
        })
    }

    /// Fork a view of an absolute range, which must lie inside this view.
    pub fn fork_range(&self, range: ByteRange) -> Result<ByteStream> {
        let offset = range.offset as usize;
        if offset < self.start || range.end() > self.end {
            return Err(Error::TruncatedInput {
                offset,
                needed: range.length as usize,
                available: self.end.saturating_sub(offset),
            });
        }
        Ok(ByteStream {
            data: self.data.clone(),
            start: offset,
            end: range.end(),
            pos: offset,
        })
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("pos", &self.pos)
            .finish()
    }
}
