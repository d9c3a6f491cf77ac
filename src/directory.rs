//! Bundle directory (`DIRM` chunk).
//!
//! The directory lists every component of a multi-file document in
//! parallel, index-aligned tables. Its payload is laid out as:
//!
//! ```text
//! dflags      u8       bit 7 = bundled, low 7 bits = format version
//! nfiles      u16 BE
//! offsets     nfiles x u32 BE, absolute from the start of the file
//! BZZ stream  -> nfiles x u24 sizes
//!                nfiles x u8 flags
//!                per file: id\0 [name\0] [title\0]
//! ```
//!
//! The string table may end early; trailing files then have no id.

use crate::cursor::ByteStream;
use crate::decoders::{bzz_compress, decode_bzz_with_options};
use crate::error::{Error, Result};
use crate::iff::{read_chunk_header, ChunkId};
use crate::parser_config::ParserOptions;
use bitflags::bitflags;
use byteorder::{BigEndian, WriteBytesExt};

/// `dflags` bit marking a bundled document.
pub const DFLAGS_BUNDLED: u8 = 0x80;

/// Directory format version written by this crate.
pub const DIRECTORY_VERSION: u8 = 1;

bitflags! {
    /// Per-file directory flags.
    ///
    /// A component is classified by its `FORM` sub-type; [`FileFlags::PAGE`]
    /// is checked against it. Other bits are carried through unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileFlags: u8 {
        /// Bit 0: file is a page
        const PAGE = 1 << 0;
        /// Bit 1: file holds thumbnails
        const THUMBNAILS = 1 << 1;
        /// Bit 6: a title follows the id in the string table
        const HAS_TITLE = 1 << 6;
        /// Bit 7: a name follows the id in the string table
        const HAS_NAME = 1 << 7;
    }
}

impl FileFlags {
    /// Whether the file is a page rather than a shared resource.
    pub fn is_page(&self) -> bool {
        self.contains(FileFlags::PAGE)
    }
}

/// One component as described by the directory, without its offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileRecord {
    /// Directory flags
    pub flags: FileFlags,
    /// Size of the component's top-level chunk in bytes
    pub size: u32,
    /// Component id, absent when the string table ended early
    pub id: Option<String>,
    /// Optional file name
    pub name: Option<String>,
    /// Optional human-readable title
    pub title: Option<String>,
}

impl FileRecord {
    /// A record for a page component.
    pub fn page(id: impl Into<String>, size: u32) -> Self {
        Self {
            flags: FileFlags::PAGE,
            size,
            id: Some(id.into()),
            name: None,
            title: None,
        }
    }

    /// A record for a shared resource component.
    pub fn resource(id: impl Into<String>, size: u32) -> Self {
        Self {
            flags: FileFlags::empty(),
            size,
            id: Some(id.into()),
            name: None,
            title: None,
        }
    }
}

/// Borrowed view of one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry<'a> {
    /// Position in the directory
    pub index: usize,
    /// Absolute offset of the component's chunk header
    pub offset: u32,
    /// Size of the component's top-level chunk
    pub size: u32,
    /// Directory flags
    pub flags: FileFlags,
    /// Component id
    pub id: Option<&'a str>,
    /// Optional file name
    pub name: Option<&'a str>,
    /// Optional title
    pub title: Option<&'a str>,
}

impl DirectoryEntry<'_> {
    /// Whether this entry is a page.
    pub fn is_page(&self) -> bool {
        self.flags.is_page()
    }

    /// Owned copy of the entry without its offset.
    pub fn to_record(&self) -> FileRecord {
        FileRecord {
            flags: self.flags,
            size: self.size,
            id: self.id.map(str::to_string),
            name: self.name.map(str::to_string),
            title: self.title.map(str::to_string),
        }
    }
}

/// Decoded directory.
///
/// `offsets`, `sizes` and `flags` always have one slot per file; `ids` may
/// be shorter, and `names`/`titles` are aligned with `ids`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directory {
    dflags: u8,
    offsets: Vec<u32>,
    sizes: Vec<u32>,
    flags: Vec<FileFlags>,
    ids: Vec<String>,
    names: Vec<Option<String>>,
    titles: Vec<Option<String>>,
}

impl Directory {
    /// Parse a `DIRM` chunk.
    ///
    /// `chunk` must be positioned at the chunk header; it is typically a fork
    /// bounded to the chunk.
    pub fn decode(chunk: &ByteStream, options: &ParserOptions) -> Result<Self> {
        let mut s = chunk.clone();
        let header = read_chunk_header(&mut s)
            .map_err(|e| Error::MalformedDirectory(format!("no chunk header: {}", e)))?;
        if header.id != ChunkId::DIRM {
            return Err(Error::MalformedDirectory(format!(
                "expected DIRM, found {}",
                header.id
            )));
        }
        let length = header.length as usize;
        if s.remaining() < length {
            return Err(Error::MalformedDirectory(format!(
                "payload of {} bytes truncated to {}",
                length,
                s.remaining()
            )));
        }
        if length < 3 {
            return Err(Error::MalformedDirectory(format!(
                "payload of {} bytes is shorter than its 3-byte prefix",
                length
            )));
        }

        let dflags = s.byte()?;
        let nfiles = s.uint16()? as usize;
        if 3 + 4 * nfiles > length {
            return Err(Error::MalformedDirectory(format!(
                "offset table for {} files overruns {}-byte payload",
                nfiles, length
            )));
        }
        let offsets = (0..nfiles).map(|_| s.uint32()).collect::<Result<Vec<_>>>()?;

        let mut dir = Directory {
            dflags,
            offsets,
            ..Default::default()
        };
        if nfiles == 0 {
            if length > 3 {
                options.tolerate(
                    &format!("DIRM lists no files but carries {} extra bytes", length - 3),
                    Error::MalformedDirectory,
                )?;
            }
            log::debug!("DIRM lists no files");
            return Ok(dir);
        }

        let compressed = s.read_bytes(length - 3 - 4 * nfiles)?;
        if compressed.is_empty() {
            return Err(Error::MalformedDirectory(format!(
                "{} files but no compressed tables",
                nfiles
            )));
        }
        let tables = decode_bzz_with_options(&compressed, Some(options))?;
        dir.read_tables(ByteStream::new(tables), nfiles)?;

        log::debug!(
            "DIRM: {} files, {} ids, dflags {:#04x}",
            nfiles,
            dir.ids.len(),
            dflags
        );
        if dir.ids.len() < nfiles {
            log::warn!(
                "Directory names only {} of {} files; trailing files have no id",
                dir.ids.len(),
                nfiles
            );
        }
        Ok(dir)
    }

    fn read_tables(&mut self, mut t: ByteStream, nfiles: usize) -> Result<()> {
        if t.remaining() < 4 * nfiles {
            return Err(Error::MalformedDirectory(format!(
                "decompressed tables hold {} bytes, sizes and flags for {} files need {}",
                t.remaining(),
                nfiles,
                4 * nfiles
            )));
        }
        self.sizes = (0..nfiles).map(|_| t.uint24()).collect::<Result<Vec<_>>>()?;
        self.flags = (0..nfiles)
            .map(|_| t.byte().map(FileFlags::from_bits_retain))
            .collect::<Result<Vec<_>>>()?;

        for i in 0..nfiles {
            if t.is_exhausted() {
                break;
            }
            self.ids.push(t.read_str_nt()?);
            let name = if self.flags[i].contains(FileFlags::HAS_NAME) && !t.is_exhausted() {
                Some(t.read_str_nt()?)
            } else {
                None
            };
            let title = if self.flags[i].contains(FileFlags::HAS_TITLE) && !t.is_exhausted() {
                Some(t.read_str_nt()?)
            } else {
                None
            };
            self.names.push(name);
            self.titles.push(title);
        }
        Ok(())
    }

    /// Build a directory from records and their offsets.
    ///
    /// Ids must be contiguous from the first record: a record without an id
    /// followed by one with an id gets an empty id. Name and title flags are
    /// derived from the records' contents.
    pub fn from_records(dflags: u8, offsets: Vec<u32>, records: &[FileRecord]) -> Result<Self> {
        if offsets.len() != records.len() {
            return Err(Error::Writer(format!(
                "{} offsets for {} records",
                offsets.len(),
                records.len()
            )));
        }
        let named = records
            .iter()
            .rposition(|r| r.id.is_some())
            .map_or(0, |last| last + 1);

        let mut dir = Directory {
            dflags,
            offsets,
            ..Default::default()
        };
        for (i, record) in records.iter().enumerate() {
            let mut flags = record.flags - (FileFlags::HAS_NAME | FileFlags::HAS_TITLE);
            if i < named {
                if record.id.is_none() {
                    log::warn!("Directory entry {} has no id; writing an empty one", i);
                }
                dir.ids.push(record.id.clone().unwrap_or_default());
                if record.name.is_some() {
                    flags |= FileFlags::HAS_NAME;
                }
                if record.title.is_some() {
                    flags |= FileFlags::HAS_TITLE;
                }
                dir.names.push(record.name.clone());
                dir.titles.push(record.title.clone());
            }
            dir.sizes.push(record.size);
            dir.flags.push(flags);
        }
        Ok(dir)
    }

    /// Number of files listed.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the directory lists no files.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Directory flags byte.
    pub fn dflags(&self) -> u8 {
        self.dflags
    }

    /// Whether the bundled bit is set.
    pub fn is_bundled(&self) -> bool {
        self.dflags & DFLAGS_BUNDLED != 0
    }

    /// Directory format version.
    pub fn version(&self) -> u8 {
        self.dflags & 0x7f
    }

    /// Absolute component offsets.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Component sizes.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Component flags.
    pub fn flags(&self) -> &[FileFlags] {
        &self.flags
    }

    /// Component ids; may be shorter than [`Directory::len`].
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of entries flagged as pages.
    pub fn page_count(&self) -> usize {
        self.flags.iter().filter(|f| f.is_page()).count()
    }

    /// Entry at `index`.
    pub fn entry(&self, index: usize) -> Option<DirectoryEntry<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(DirectoryEntry {
            index,
            offset: self.offsets[index],
            size: self.sizes.get(index).copied().unwrap_or(0),
            flags: self.flags.get(index).copied().unwrap_or_default(),
            id: self.ids.get(index).map(String::as_str),
            name: self.names.get(index).and_then(|n| n.as_deref()),
            title: self.titles.get(index).and_then(|t| t.as_deref()),
        })
    }

    /// Iterate all entries in directory order.
    pub fn entries(&self) -> impl Iterator<Item = DirectoryEntry<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.entry(i))
    }

    /// Index of the entry with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Replace the offset table; its length must match the file count.
    pub fn set_offsets(&mut self, offsets: Vec<u32>) -> Result<()> {
        if offsets.len() != self.len() {
            return Err(Error::Writer(format!(
                "{} offsets for {} files",
                offsets.len(),
                self.len()
            )));
        }
        self.offsets = offsets;
        Ok(())
    }

    /// BZZ-compress the size, flag and string tables.
    pub fn encode_tables(&self, block_size_kb: usize) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let mut raw = Vec::with_capacity(self.len() * 16);
        for &size in &self.sizes {
            if size > 0xff_ffff {
                return Err(Error::Writer(format!(
                    "component of {} bytes does not fit a 24-bit directory size",
                    size
                )));
            }
            raw.write_u24::<BigEndian>(size)?;
        }
        raw.extend(self.flags.iter().map(|f| f.bits()));
        for (i, id) in self.ids.iter().enumerate() {
            raw.extend_from_slice(id.as_bytes());
            raw.push(0);
            for text in [&self.names[i], &self.titles[i]].into_iter().flatten() {
                raw.extend_from_slice(text.as_bytes());
                raw.push(0);
            }
        }
        Ok(bzz_compress(&raw, block_size_kb))
    }

    /// Assemble the chunk payload from previously encoded tables.
    pub fn encode_payload(&self, tables: &[u8]) -> Result<Vec<u8>> {
        let nfiles = u16::try_from(self.len()).map_err(|_| {
            Error::Writer(format!("{} files exceed the 65535-entry directory", self.len()))
        })?;
        let mut payload = Vec::with_capacity(3 + 4 * self.len() + tables.len());
        payload.push(self.dflags);
        payload.write_u16::<BigEndian>(nfiles)?;
        for &offset in &self.offsets {
            payload.write_u32::<BigEndian>(offset)?;
        }
        payload.extend_from_slice(tables);
        Ok(payload)
    }

    /// Payload length for a directory whose compressed tables take `tables_len` bytes.
    pub fn payload_len(&self, tables_len: usize) -> usize {
        3 + 4 * self.len() + tables_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iff::encode_chunk;

    fn dirm_bytes(dir: &Directory) -> Vec<u8> {
        let tables = dir.encode_tables(50).unwrap();
        encode_chunk(ChunkId::DIRM, &dir.encode_payload(&tables).unwrap()).unwrap()
    }

    fn sample_records() -> Vec<FileRecord> {
        vec![
            FileRecord::resource("dict0001.iff", 120),
            FileRecord::page("p0001.djvu", 400),
            FileRecord {
                title: Some("Cover".to_string()),
                name: Some("cover.djvu".to_string()),
                ..FileRecord::page("p0002.djvu", 302)
            },
        ]
    }

    #[test]
    fn test_decode_written_directory() {
        let dir = Directory::from_records(0x81, vec![100, 228, 640], &sample_records()).unwrap();
        let bytes = dirm_bytes(&dir);
        let decoded = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap();

        assert_eq!(decoded.len(), 3);
        assert!(decoded.is_bundled());
        assert_eq!(decoded.version(), 1);
        assert_eq!(decoded.offsets(), &[100, 228, 640]);
        assert_eq!(decoded.sizes(), &[120, 400, 302]);
        assert_eq!(decoded.ids(), &["dict0001.iff", "p0001.djvu", "p0002.djvu"]);
        assert_eq!(decoded.page_count(), 2);

        let cover = decoded.entry(2).unwrap();
        assert_eq!(cover.name, Some("cover.djvu"));
        assert_eq!(cover.title, Some("Cover"));
        assert!(cover.flags.contains(FileFlags::HAS_NAME | FileFlags::HAS_TITLE));
        assert!(cover.is_page());
        assert!(!decoded.entry(0).unwrap().is_page());
        assert_eq!(decoded.position_of("p0001.djvu"), Some(1));
    }

    #[test]
    fn test_short_id_table_is_tolerated() {
        let mut records = sample_records();
        records[2].id = None;
        records[2].name = None;
        records[2].title = None;
        let dir = Directory::from_records(0x81, vec![1, 2, 3], &records).unwrap();
        let decoded =
            Directory::decode(&ByteStream::new(dirm_bytes(&dir)), &ParserOptions::default()).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.ids().len(), 2);
        assert_eq!(decoded.entry(2).unwrap().id, None);
    }

    #[test]
    fn test_id_gap_becomes_empty_id() {
        let mut records = sample_records();
        records[0].id = None;
        let dir = Directory::from_records(0x81, vec![1, 2, 3], &records).unwrap();
        assert_eq!(dir.ids(), &["", "p0001.djvu", "p0002.djvu"]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = Directory::from_records(0x81, Vec::new(), &[]).unwrap();
        let bytes = dirm_bytes(&dir);
        assert_eq!(bytes.len(), 8 + 4); // 3-byte payload + pad
        let decoded = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_empty_directory_with_trailing_bytes() {
        let bytes = encode_chunk(ChunkId::DIRM, &[0x81, 0, 0, 0xde, 0xad]).unwrap();
        let lenient =
            Directory::decode(&ByteStream::new(bytes.clone()), &ParserOptions::default()).unwrap();
        assert!(lenient.is_empty());
        let err = Directory::decode(&ByteStream::new(bytes), &ParserOptions::strict()).unwrap_err();
        assert!(matches!(err, Error::MalformedDirectory(ref m) if m.contains("2 extra bytes")));
    }

    #[test]
    fn test_not_dirm() {
        let bytes = encode_chunk(ChunkId::NAVM, &[0x81, 0, 0]).unwrap();
        let err = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedDirectory(ref m) if m.contains("NAVM")));
    }

    #[test]
    fn test_offset_table_overrun() {
        // Claims 5 files but carries only one offset
        let bytes = encode_chunk(ChunkId::DIRM, &[0x81, 0, 5, 0, 0, 0, 16]).unwrap();
        let err = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedDirectory(_)));
    }

    #[test]
    fn test_missing_compressed_tables() {
        let bytes = encode_chunk(ChunkId::DIRM, &[0x81, 0, 1, 0, 0, 0, 16]).unwrap();
        let err = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedDirectory(ref m) if m.contains("no compressed")));
    }

    #[test]
    fn test_truncated_size_table() {
        // Two files, but the tables only cover one size
        let tables = bzz_compress(&[0, 0, 10, 1], 50);
        let mut payload = vec![0x81, 0, 2, 0, 0, 0, 16, 0, 0, 0, 32];
        payload.extend_from_slice(&tables);
        let bytes = encode_chunk(ChunkId::DIRM, &payload).unwrap();
        let err = Directory::decode(&ByteStream::new(bytes), &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedDirectory(_)));
    }

    #[test]
    fn test_unknown_flag_bits_are_kept() {
        let mut records = sample_records();
        records[0].flags = FileFlags::from_bits_retain(0x20);
        let dir = Directory::from_records(0x81, vec![1, 2, 3], &records).unwrap();
        let decoded =
            Directory::decode(&ByteStream::new(dirm_bytes(&dir)), &ParserOptions::default()).unwrap();
        assert_eq!(decoded.flags()[0].bits(), 0x20);
        assert!(!decoded.flags()[0].is_page());
    }

    #[test]
    fn test_oversized_component_rejected() {
        let records = vec![FileRecord::page("huge", 0x0100_0000)];
        let dir = Directory::from_records(0x81, vec![0], &records).unwrap();
        assert!(matches!(dir.encode_tables(50), Err(Error::Writer(_))));
    }
}
