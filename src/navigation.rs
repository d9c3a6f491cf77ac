//! Document navigation (`NAVM` chunk).
//!
//! The chunk is kept verbatim so that slices can copy it unchanged. Its
//! payload is a BZZ stream holding the bookmark tree in pre-order:
//!
//! ```text
//! count  u16 BE              total number of bookmarks
//! per bookmark:
//!   children   u8
//!   title      u24 BE length + bytes
//!   url        u24 BE length + bytes
//! ```

use crate::cursor::ByteStream;
use crate::decoders::{bzz_compress, decode_bzz_with_options};
use crate::error::{Error, Result};
use crate::iff::{encode_chunk, fork_chunk, read_chunk_header, ChunkHeader, ChunkId};
use crate::parser_config::ParserOptions;
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use serde::Serialize;

/// A single bookmark in the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    /// Display title
    pub title: String,

    /// Target, usually `#<page id>` or `#<page number>`
    pub url: String,

    /// Nested bookmarks
    pub children: Vec<Bookmark>,
}

impl Bookmark {
    /// A bookmark without children.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(Bookmark::count).sum::<usize>()
    }
}

/// The navigation chunk of a bundle.
#[derive(Debug, Clone)]
pub struct Navigation {
    header: ChunkHeader,
    chunk: Bytes,
}

impl Navigation {
    /// Wrap the `NAVM` chunk at the start of `fork`.
    pub fn parse(fork: &ByteStream) -> Result<Self> {
        let mut s = fork.clone();
        let header = read_chunk_header(&mut s)?;
        if header.id != ChunkId::NAVM {
            return Err(Error::MalformedContainer {
                offset: header.offset,
                reason: format!("expected NAVM, found {}", header.id),
            });
        }
        let chunk = fork_chunk(fork, &header)?.as_bytes();
        Ok(Self { header, chunk })
    }

    /// Build a navigation chunk from a bookmark tree.
    pub fn from_bookmarks(bookmarks: &[Bookmark], block_size_kb: usize) -> Result<Self> {
        let total: usize = bookmarks.iter().map(Bookmark::count).sum();
        let total = u16::try_from(total)
            .map_err(|_| Error::Writer(format!("{} bookmarks exceed 65535", total)))?;
        let mut raw = Vec::new();
        raw.write_u16::<BigEndian>(total)?;
        for b in bookmarks {
            write_bookmark(&mut raw, b)?;
        }
        let chunk = encode_chunk(ChunkId::NAVM, &bzz_compress(&raw, block_size_kb))?;
        Self::parse(&ByteStream::new(chunk))
    }

    /// The chunk header and payload, without the pad byte.
    pub fn chunk_bytes(&self) -> Bytes {
        self.chunk.clone()
    }

    /// Header as read from the source document.
    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    /// Decode the bookmark tree.
    pub fn bookmarks(&self, options: &ParserOptions) -> Result<Vec<Bookmark>> {
        let raw = decode_bzz_with_options(&self.chunk[8..], Some(options))?;
        let mut s = ByteStream::new(raw);
        if s.is_exhausted() {
            return Ok(Vec::new());
        }
        let total = s.uint16()? as usize;
        let mut remaining = total;
        let mut roots = Vec::new();
        while remaining > 0 {
            roots.push(read_bookmark(&mut s, &mut remaining, 0)?);
        }
        log::debug!("NAVM: {} bookmarks, {} top-level", total, roots.len());
        Ok(roots)
    }
}

/// Bookmark nesting deeper than this is treated as corrupt.
const MAX_DEPTH: usize = 256;

fn read_bookmark(s: &mut ByteStream, remaining: &mut usize, depth: usize) -> Result<Bookmark> {
    if depth > MAX_DEPTH {
        return Err(Error::Decode("bookmark tree nested too deeply".to_string()));
    }
    *remaining -= 1;
    let children = s.byte()? as usize;
    let title = read_text(s)?;
    let url = read_text(s)?;
    let mut bookmark = Bookmark::new(title, url);
    for _ in 0..children {
        if *remaining == 0 {
            return Err(Error::Decode(
                "bookmark children exceed the declared count".to_string(),
            ));
        }
        bookmark.children.push(read_bookmark(s, remaining, depth + 1)?);
    }
    Ok(bookmark)
}

fn read_text(s: &mut ByteStream) -> Result<String> {
    let len = s.uint24()? as usize;
    let raw = s.read_bytes(len)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn write_bookmark(out: &mut Vec<u8>, b: &Bookmark) -> Result<()> {
    let children = u8::try_from(b.children.len()).map_err(|_| {
        Error::Writer(format!("bookmark '{}' has more than 255 children", b.title))
    })?;
    out.push(children);
    for text in [&b.title, &b.url] {
        out.write_u24::<BigEndian>(text.len() as u32)?;
        out.extend_from_slice(text.as_bytes());
    }
    for child in &b.children {
        write_bookmark(out, child)?;
    }
    Ok(())
}
