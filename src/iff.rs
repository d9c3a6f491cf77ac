//! IFF-style chunk framing.
//!
//! Every DjVu structure is a chunk: a 4-byte identifier, a big-endian 32-bit
//! payload length, the payload, and one zero pad byte when the length is odd.
//! `FORM` chunks are composite: their payload starts with a 4-byte sub-type
//! followed by a sequence of sibling chunks.
//!
//! A file is the 4-byte magic `AT&T` followed by exactly one top-level FORM.

use crate::cursor::{ByteRange, ByteStream};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// File magic preceding the top-level FORM.
pub const MAGIC: [u8; 4] = *b"AT&T";

/// Size of a chunk header (identifier + length).
pub const HEADER_LEN: usize = 8;

/// A 4-byte chunk identifier or FORM sub-type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Composite chunk
    pub const FORM: ChunkId = ChunkId(*b"FORM");
    /// Bundle directory
    pub const DIRM: ChunkId = ChunkId(*b"DIRM");
    /// Navigation (bookmarks)
    pub const NAVM: ChunkId = ChunkId(*b"NAVM");
    /// Inclusion of a shared resource by id
    pub const INCL: ChunkId = ChunkId(*b"INCL");
    /// Page information
    pub const INFO: ChunkId = ChunkId(*b"INFO");
    /// Multi-file document sub-type
    pub const DJVM: ChunkId = ChunkId(*b"DJVM");
    /// Single page sub-type
    pub const DJVU: ChunkId = ChunkId(*b"DJVU");
    /// Shared resource sub-type
    pub const DJVI: ChunkId = ChunkId(*b"DJVI");
    /// Thumbnails sub-type
    pub const THUM: ChunkId = ChunkId(*b"THUM");

    /// Identifier as text, with non-ASCII bytes replaced.
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({:?})", self.as_str())
    }
}

/// Header of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk identifier
    pub id: ChunkId,
    /// Payload length in bytes, excluding the header and pad byte
    pub length: u32,
    /// Absolute offset of the first header byte
    pub offset: usize,
}

impl ChunkHeader {
    /// Whether this is a composite `FORM` chunk.
    pub fn is_composite(&self) -> bool {
        self.id == ChunkId::FORM
    }

    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + HEADER_LEN
    }

    /// Header plus payload, excluding the pad byte.
    pub fn total_len(&self) -> usize {
        self.length as usize + HEADER_LEN
    }

    /// Absolute range of header plus payload.
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.offset as u32, self.total_len() as u32)
    }
}

/// Sub-type of a composite chunk, as a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    /// `DJVM`: bundled multi-file document
    MultiFile,
    /// `DJVU`: one page
    SinglePage,
    /// `DJVI`: shared resource included by pages
    SharedResource,
    /// Anything else (thumbnails, unknown extensions)
    Unrecognized(ChunkId),
}

impl FormKind {
    /// Classify a sub-type tag.
    pub fn from_subtype(tag: ChunkId) -> Self {
        match tag {
            ChunkId::DJVM => FormKind::MultiFile,
            ChunkId::DJVU => FormKind::SinglePage,
            ChunkId::DJVI => FormKind::SharedResource,
            other => FormKind::Unrecognized(other),
        }
    }

    /// The sub-type tag this kind was read from.
    pub fn subtype(&self) -> ChunkId {
        match self {
            FormKind::MultiFile => ChunkId::DJVM,
            FormKind::SinglePage => ChunkId::DJVU,
            FormKind::SharedResource => ChunkId::DJVI,
            FormKind::Unrecognized(tag) => *tag,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FORM:{}", self.subtype())
    }
}

/// Read a chunk header at the cursor.
///
/// Leaves the cursor at the first payload byte. Fails with
/// [`Error::MalformedContainer`] when fewer than 8 bytes remain.
pub fn read_chunk_header(cursor: &mut ByteStream) -> Result<ChunkHeader> {
    let offset = cursor.absolute_position();
    if cursor.remaining() < HEADER_LEN {
        return Err(Error::MalformedContainer {
            offset,
            reason: format!(
                "chunk header needs {} bytes, {} left",
                HEADER_LEN,
                cursor.remaining()
            ),
        });
    }
    let id = ChunkId(cursor.read_tag()?);
    let length = cursor.uint32()?;
    Ok(ChunkHeader { id, length, offset })
}

/// Move the cursor to the next sibling of `header`.
///
/// Skips `length + (length mod 2)` bytes past the header. A pad byte that
/// would fall just beyond the end of the view is not required.
pub fn advance_past_chunk(cursor: &mut ByteStream, header: &ChunkHeader) -> Result<()> {
    let view_start = cursor.absolute_position() - cursor.position();
    let payload_end = header.payload_offset() + header.length as usize;
    let view_end = view_start + cursor.len();
    if payload_end > view_end {
        return Err(Error::TruncatedInput {
            offset: header.payload_offset(),
            needed: header.length as usize,
            available: view_end.saturating_sub(header.payload_offset()),
        });
    }
    let padded_end = payload_end + (header.length & 1) as usize;
    cursor.seek_to(padded_end.min(view_end) - view_start)
}

/// Fork a view covering exactly the header and payload of `header`.
///
/// The fork is taken from the header offset, independent of where the
/// parent cursor currently is.
pub fn fork_chunk(cursor: &ByteStream, header: &ChunkHeader) -> Result<ByteStream> {
    cursor.fork_range(header.range())
}

/// Read the 4-byte sub-type of a composite chunk whose header was just read.
pub fn read_form_kind(cursor: &mut ByteStream, header: &ChunkHeader) -> Result<FormKind> {
    if !header.is_composite() {
        return Err(Error::MalformedContainer {
            offset: header.offset,
            reason: format!("expected FORM, found {}", header.id),
        });
    }
    if header.length < 4 {
        return Err(Error::MalformedContainer {
            offset: header.offset,
            reason: format!("FORM payload of {} bytes has no sub-type", header.length),
        });
    }
    Ok(FormKind::from_subtype(ChunkId(cursor.read_tag()?)))
}

/// Iterator over sibling chunk headers inside a view.
///
/// Each item leaves the underlying cursor past the chunk, so payloads are
/// read through [`fork_chunk`] on [`ChunkIter::view`].
pub struct ChunkIter {
    cursor: ByteStream,
    failed: bool,
}

impl ChunkIter {
    /// Iterate chunks from the current position of `cursor` to the end of its view.
    pub fn new(cursor: ByteStream) -> Self {
        Self {
            cursor,
            failed: false,
        }
    }

    /// The view being iterated.
    pub fn view(&self) -> &ByteStream {
        &self.cursor
    }
}

impl Iterator for ChunkIter {
    type Item = Result<ChunkHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_exhausted() {
            return None;
        }
        let step = read_chunk_header(&mut self.cursor).and_then(|header| {
            advance_past_chunk(&mut self.cursor, &header)?;
            Ok(header)
        });
        if step.is_err() {
            self.failed = true;
        }
        Some(step)
    }
}

fn length_field(len: usize) -> Result<[u8; 4]> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Writer(format!("chunk of {} bytes exceeds 32-bit length", len)))?;
    let mut field = [0u8; 4];
    BigEndian::write_u32(&mut field, len);
    Ok(field)
}

/// Encode a leaf chunk, padded to even length.
pub fn encode_chunk(id: ChunkId, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    out.extend_from_slice(&id.0);
    out.extend_from_slice(&length_field(payload.len())?);
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    Ok(out)
}

/// Encode a composite chunk from already-encoded children.
pub fn encode_form(subtype: ChunkId, children: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + 4 + children.len() + 1);
    out.extend_from_slice(&ChunkId::FORM.0);
    out.extend_from_slice(&length_field(children.len() + 4)?);
    out.extend_from_slice(&subtype.0);
    out.extend_from_slice(children);
    if children.len() % 2 == 1 {
        out.push(0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_chunk_header() {
        let mut s = ByteStream::new(b"INCL\x00\x00\x00\x02d1".to_vec());
        let h = read_chunk_header(&mut s).unwrap();
        assert_eq!(h.id, ChunkId::INCL);
        assert_eq!(h.length, 2);
        assert_eq!(h.offset, 0);
        assert_eq!(s.position(), 8);
        assert!(!h.is_composite());
    }

    #[test]
    fn test_short_header_is_malformed() {
        let mut s = ByteStream::new(b"INCL\x00\x00".to_vec());
        let err = read_chunk_header(&mut s).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer { offset: 0, .. }));
    }

    #[test]
    fn test_advance_skips_pad_byte_for_odd_length() {
        // 3-byte payload + pad, then a sibling
        let mut data = b"AAAA\x00\x00\x00\x03xyz\x00".to_vec();
        data.extend_from_slice(b"BBBB\x00\x00\x00\x00");
        let mut s = ByteStream::new(data);
        let h = read_chunk_header(&mut s).unwrap();
        advance_past_chunk(&mut s, &h).unwrap();
        assert_eq!(s.position(), 12);
        let next = read_chunk_header(&mut s).unwrap();
        assert_eq!(next.id, ChunkId(*b"BBBB"));
    }

    #[test]
    fn test_advance_even_length_has_no_pad() {
        let mut data = b"AAAA\x00\x00\x00\x04wxyz".to_vec();
        data.extend_from_slice(b"BBBB\x00\x00\x00\x00");
        let mut s = ByteStream::new(data);
        let h = read_chunk_header(&mut s).unwrap();
        advance_past_chunk(&mut s, &h).unwrap();
        assert_eq!(s.position(), 12);
    }

    #[test]
    fn test_advance_tolerates_missing_final_pad() {
        let mut s = ByteStream::new(b"AAAA\x00\x00\x00\x01x".to_vec());
        let h = read_chunk_header(&mut s).unwrap();
        advance_past_chunk(&mut s, &h).unwrap();
        assert!(s.is_exhausted());
    }

    #[test]
    fn test_advance_overrun_is_truncated() {
        let mut s = ByteStream::new(b"AAAA\x00\x00\x00\x09x".to_vec());
        let h = read_chunk_header(&mut s).unwrap();
        assert!(matches!(
            advance_past_chunk(&mut s, &h),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_fork_chunk_is_position_independent() {
        let chunk = encode_chunk(ChunkId::INCL, b"dict").unwrap();
        let mut data = b"PAD!".to_vec();
        data.extend_from_slice(&chunk);
        let mut s = ByteStream::new(data);
        s.seek_to(4).unwrap();
        let h = read_chunk_header(&mut s).unwrap();
        s.seek_to(0).unwrap();
        let fork = fork_chunk(&s, &h).unwrap();
        assert_eq!(fork.len(), 12);
        assert_eq!(&fork.as_bytes()[..], &chunk[..]);
    }

    #[test]
    fn test_form_kinds() {
        assert_eq!(FormKind::from_subtype(ChunkId::DJVM), FormKind::MultiFile);
        assert_eq!(FormKind::from_subtype(ChunkId::DJVU), FormKind::SinglePage);
        assert_eq!(FormKind::from_subtype(ChunkId::DJVI), FormKind::SharedResource);
        assert_eq!(
            FormKind::from_subtype(ChunkId::THUM),
            FormKind::Unrecognized(ChunkId::THUM)
        );
        assert_eq!(format!("{}", FormKind::SharedResource), "FORM:DJVI");
    }

    #[test]
    fn test_read_form_kind_requires_form() {
        let form = encode_form(ChunkId::DJVI, &encode_chunk(ChunkId::INCL, b"x").unwrap()).unwrap();
        let mut s = ByteStream::new(form);
        let h = read_chunk_header(&mut s).unwrap();
        assert_eq!(read_form_kind(&mut s, &h).unwrap(), FormKind::SharedResource);

        let mut s = ByteStream::new(encode_chunk(ChunkId::INFO, b"abcd").unwrap());
        let h = read_chunk_header(&mut s).unwrap();
        assert!(matches!(
            read_form_kind(&mut s, &h),
            Err(Error::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_chunk_iter() {
        let mut children = encode_chunk(ChunkId::INFO, b"abc").unwrap();
        children.extend(encode_chunk(ChunkId::INCL, b"d1").unwrap());
        children.extend(encode_chunk(ChunkId::INCL, b"d3").unwrap());
        let ids: Vec<ChunkId> = ChunkIter::new(ByteStream::new(children))
            .map(|h| h.unwrap().id)
            .collect();
        assert_eq!(ids, vec![ChunkId::INFO, ChunkId::INCL, ChunkId::INCL]);
    }

    #[test]
    fn test_chunk_iter_stops_after_error() {
        let mut children = encode_chunk(ChunkId::INFO, b"ab").unwrap();
        children.extend_from_slice(b"INC");
        let items: Vec<_> = ChunkIter::new(ByteStream::new(children)).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_encode_form_layout() {
        let child = encode_chunk(ChunkId::INCL, b"abc").unwrap();
        assert_eq!(child.len(), 12);
        let form = encode_form(ChunkId::DJVU, &child).unwrap();
        assert_eq!(&form[0..4], b"FORM");
        assert_eq!(BigEndian::read_u32(&form[4..8]), 16);
        assert_eq!(&form[8..12], b"DJVU");
        assert_eq!(form.len(), 24);
    }
}
