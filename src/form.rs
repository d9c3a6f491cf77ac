//! Lazy scan of a component's composite chunk.
//!
//! Pages and shared resources are `FORM` chunks whose children are read only
//! on demand. The first access walks the children once and records the
//! chunk list, the ids named by `INCL` chunks, and the `INFO` chunk of a
//! page. The result is cached for the lifetime of the component.

use crate::cursor::{ByteRange, ByteStream};
use crate::error::{Error, Result};
use crate::iff::{
    fork_chunk, read_chunk_header, read_form_kind, ChunkHeader, ChunkId, ChunkIter, FormKind, MAGIC,
};
use serde::Serialize;
use std::sync::OnceLock;

/// Page metadata from the `INFO` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Minor format version
    pub minor_version: u8,
    /// Major format version
    pub major_version: u8,
    /// Resolution in dots per inch
    pub dpi: u16,
    /// Display gamma times ten
    pub gamma_tenths: u8,
    /// Counter-clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotation: u16,
}

impl PageInfo {
    /// Parse an `INFO` payload.
    ///
    /// Only width and height are required; older encoders omit the rest,
    /// which then take their customary defaults. The resolution is stored
    /// little-endian.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut s = ByteStream::new(payload.to_vec());
        let width = s.uint16()?;
        let height = s.uint16()?;
        let minor_version = if s.is_exhausted() { 0 } else { s.byte()? };
        let major_version = if s.is_exhausted() { 0 } else { s.byte()? };
        let dpi = if s.remaining() >= 2 { s.uint16_le()? } else { 300 };
        let gamma_tenths = if s.is_exhausted() { 22 } else { s.byte()? };
        let rotation = if s.is_exhausted() {
            0
        } else {
            match s.byte()? & 0x07 {
                6 => 90,
                2 => 180,
                5 => 270,
                _ => 0,
            }
        };
        Ok(Self {
            width,
            height,
            minor_version,
            major_version,
            dpi,
            gamma_tenths,
            rotation,
        })
    }

    /// Display gamma.
    pub fn gamma(&self) -> f32 {
        self.gamma_tenths as f32 / 10.0
    }
}

/// What a scan found inside one component.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FormContents {
    pub kind: FormKind,
    pub chunks: Vec<ChunkHeader>,
    pub includes: Vec<String>,
    pub info: Option<PageInfo>,
}

/// Walk the children of the composite chunk at the start of `view`.
///
/// A leading `AT&T` magic is skipped, so a whole single-page file can be
/// scanned directly.
pub(crate) fn scan(view: &ByteStream) -> Result<FormContents> {
    let mut s = view.clone();
    s.seek_to(0)?;
    if s.remaining() >= 4 && s.fork(4)?.as_bytes()[..] == MAGIC[..] {
        s.skip(4)?;
    }
    let header = read_chunk_header(&mut s)?;
    let kind = read_form_kind(&mut s, &header)?;
    let body_range = ByteRange::new(
        (header.payload_offset() + 4) as u32,
        header.length - 4,
    );
    let body = s.fork_range(body_range)?;

    let mut contents = FormContents {
        kind,
        chunks: Vec::new(),
        includes: Vec::new(),
        info: None,
    };
    for child in ChunkIter::new(body.clone()) {
        let child = child?;
        contents.chunks.push(child);
        match child.id {
            ChunkId::INCL => {
                let id = payload_text(&body, &child)?;
                if id.is_empty() {
                    log::warn!("Empty INCL chunk at byte {}", child.offset);
                } else {
                    contents.includes.push(id);
                }
            },
            ChunkId::INFO if contents.info.is_none() => {
                let mut c = fork_chunk(&body, &child)?;
                c.skip(8)?;
                contents.info = Some(PageInfo::parse(&c.read_bytes(child.length as usize)?)?);
            },
            _ => {},
        }
    }
    log::debug!(
        "Scanned {} at {}: {} chunks, {} includes",
        kind,
        view.range(),
        contents.chunks.len(),
        contents.includes.len()
    );
    Ok(contents)
}

fn payload_text(parent: &ByteStream, header: &ChunkHeader) -> Result<String> {
    let mut c = fork_chunk(parent, header)?;
    c.skip(8)?;
    let raw = c.read_bytes(header.length as usize)?;
    let text = String::from_utf8_lossy(&raw);
    Ok(text
        .trim_end_matches(|ch: char| ch == '\0' || ch.is_ascii_whitespace())
        .to_string())
}

/// A component view with a once-only, thread-safe scan cache.
pub(crate) struct LazyForm {
    view: ByteStream,
    contents: OnceLock<std::result::Result<FormContents, (usize, String)>>,
}

impl LazyForm {
    pub fn new(view: ByteStream) -> Self {
        Self {
            view,
            contents: OnceLock::new(),
        }
    }

    pub fn view(&self) -> &ByteStream {
        &self.view
    }

    /// Scan on first use; later calls (from any thread) share the result.
    pub fn get(&self) -> Result<&FormContents> {
        let cached = self.contents.get_or_init(|| {
            scan(&self.view).map_err(|e| (self.view.absolute_position(), e.to_string()))
        });
        match cached {
            Ok(contents) => Ok(contents),
            Err((offset, reason)) => Err(Error::MalformedContainer {
                offset: *offset,
                reason: reason.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for LazyForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyForm")
            .field("range", &self.view.range())
            .field("scanned", &self.contents.get().is_some())
            .finish()
    }
}
