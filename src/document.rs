//! Document assembly.
//!
//! [`Document::open`] walks the outer framing once and builds the document
//! graph: pages in directory order, shared resources keyed by id, and the
//! optional navigation chunk. Component contents are never decoded here;
//! pages and resources scan their children lazily on first use.

use crate::cursor::{ByteRange, ByteStream};
use crate::directory::{Directory, FileFlags};
use crate::error::{Error, Result};
use crate::iff::{
    advance_past_chunk, fork_chunk, read_chunk_header, read_form_kind, ChunkId, ChunkIter,
    FormKind, HEADER_LEN, MAGIC,
};
use crate::navigation::Navigation;
use crate::page::Page;
use crate::parser_config::ParserOptions;
use crate::resource::Resource;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::RangeBounds;
use std::path::Path;

/// Offset of the first child of a bundle's outer form.
const FIRST_CHILD_OFFSET: usize = 16;

/// A component left out of the document graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedComponent {
    /// Directory index
    pub index: usize,
    /// What the component turned out to be, e.g. `FORM:THUM`
    pub kind: String,
    /// Where it sits in the buffer
    pub range: ByteRange,
}

/// One directory entry as reported by [`Document::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    /// Directory index
    pub index: usize,
    /// Absolute offset of the component
    pub offset: u32,
    /// Component size
    pub size: u32,
    /// Raw directory flags
    pub flags: u8,
    /// Component id
    pub id: Option<String>,
    /// `page`, `resource` or `thumbnails`
    pub kind: &'static str,
}

/// Serializable overview of a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    /// Outer form, e.g. `FORM:DJVM`
    pub form: String,
    /// Buffer size in bytes
    pub size: usize,
    /// Number of pages
    pub page_count: usize,
    /// Directory entries; empty for single-page files
    pub entries: Vec<EntrySummary>,
    /// Shared resource ids in directory order
    pub resource_ids: Vec<String>,
    /// Whether a navigation chunk is present
    pub has_navigation: bool,
    /// Components that were not assembled
    pub skipped: Vec<SkippedComponent>,
}

/// An opened DjVu document.
///
/// The document owns a reference-counted handle to its buffer; every page
/// and resource is a view into that same allocation.
#[derive(Debug)]
pub struct Document {
    buffer: Bytes,
    options: ParserOptions,
    kind: FormKind,
    directory: Option<Directory>,
    navigation: Option<Navigation>,
    pages: Vec<Page>,
    resources: IndexMap<String, Resource>,
    skipped: Vec<SkippedComponent>,
    components: Vec<Option<ByteRange>>,
}

impl Document {
    /// Open a document from an in-memory buffer with default options.
    ///
    /// # Example
    ///
    /// ```
    /// use djvu_oxide::Document;
    ///
    /// let err = Document::open(b"%PDF-1.7".to_vec()).unwrap_err();
    /// assert!(matches!(err, djvu_oxide::Error::UnrecognizedFormat(_)));
    /// ```
    pub fn open(buffer: impl Into<Bytes>) -> Result<Self> {
        Self::open_with_options(buffer, ParserOptions::default())
    }

    /// Read and open a file with default options.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_options(path, ParserOptions::default())
    }

    /// Read and open a file.
    pub fn from_file_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading {}", path.display());
        Self::open_with_options(std::fs::read(path)?, options)
    }

    /// Open a document from an in-memory buffer.
    pub fn open_with_options(buffer: impl Into<Bytes>, options: ParserOptions) -> Result<Self> {
        let buffer = buffer.into();
        if options.max_file_size > 0 && buffer.len() > options.max_file_size {
            return Err(Error::LimitExceeded(format!(
                "input of {} bytes exceeds the {}-byte limit",
                buffer.len(),
                options.max_file_size
            )));
        }
        if buffer.len() < HEADER_LEN || buffer[..4] != MAGIC || buffer[4..8] != ChunkId::FORM.0 {
            let shown = &buffer[..buffer.len().min(HEADER_LEN)];
            return Err(Error::UnrecognizedFormat(
                shown.escape_ascii().to_string(),
            ));
        }

        let root = ByteStream::new(buffer.clone());
        let mut s = root.clone();
        s.skip(MAGIC.len())?;
        let header = read_chunk_header(&mut s)?;
        let kind = read_form_kind(&mut s, &header)?;
        if header.total_len() > buffer.len() - MAGIC.len() {
            options.tolerate(
                &format!(
                    "outer {} claims {} bytes, buffer holds {}",
                    kind,
                    header.total_len(),
                    buffer.len() - MAGIC.len()
                ),
                |reason| Error::MalformedContainer { offset: 4, reason },
            )?;
        }

        let mut doc = Document {
            buffer,
            options,
            kind,
            directory: None,
            navigation: None,
            pages: Vec::new(),
            resources: IndexMap::new(),
            skipped: Vec::new(),
            components: Vec::new(),
        };
        if kind == FormKind::MultiFile {
            doc.assemble_bundle(&root)?;
        } else {
            doc.pages.push(Page::new(root));
        }
        log::info!(
            "Opened {}: {} pages, {} shared resources, navigation: {}",
            doc.kind,
            doc.pages.len(),
            doc.resources.len(),
            doc.navigation.is_some()
        );
        Ok(doc)
    }

    fn assemble_bundle(&mut self, root: &ByteStream) -> Result<()> {
        let mut s = root.clone();
        s.seek_to(FIRST_CHILD_OFFSET)?;
        let dirm = read_chunk_header(&mut s)?;
        if dirm.id != ChunkId::DIRM {
            return Err(Error::MalformedContainer {
                offset: FIRST_CHILD_OFFSET,
                reason: format!("expected DIRM after the outer header, found {}", dirm.id),
            });
        }
        let directory = Directory::decode(&fork_chunk(root, &dirm)?, &self.options)?;
        advance_past_chunk(&mut s, &dirm)?;

        if s.remaining() >= HEADER_LEN && s.fork(4)?.as_bytes()[..] == ChunkId::NAVM.0[..] {
            let mut peek = s.clone();
            let navm = read_chunk_header(&mut peek)?;
            self.navigation = Some(Navigation::parse(&fork_chunk(root, &navm)?)?);
        }

        for entry in directory.entries() {
            let mut c = root.clone();
            c.seek_to(entry.offset as usize)?;
            let header = read_chunk_header(&mut c)?;
            let range = header.range();
            self.components
                .push((range.end() <= self.buffer.len()).then_some(range));
            if !header.is_composite() {
                self.options.tolerate(
                    &format!(
                        "directory entry {} points at {} rather than FORM; skipping",
                        entry.index, header.id
                    ),
                    |reason| Error::MalformedContainer {
                        offset: header.offset,
                        reason,
                    },
                )?;
                self.skipped.push(SkippedComponent {
                    index: entry.index,
                    kind: header.id.to_string(),
                    range,
                });
                continue;
            }
            let kind = read_form_kind(&mut c, &header)?;
            if header.total_len() != entry.size as usize {
                self.options.tolerate(
                    &format!(
                        "directory entry {} says {} bytes, its chunk has {}",
                        entry.index,
                        entry.size,
                        header.total_len()
                    ),
                    |reason| Error::MalformedContainer {
                        offset: header.offset,
                        reason,
                    },
                )?;
            }
            if entry.is_page() != (kind == FormKind::SinglePage) {
                self.options.tolerate(
                    &format!(
                        "directory entry {} is flagged {} but holds {}",
                        entry.index,
                        if entry.is_page() { "page" } else { "non-page" },
                        kind
                    ),
                    |reason| Error::MalformedContainer {
                        offset: header.offset,
                        reason,
                    },
                )?;
            }

            let view = fork_chunk(root, &header)?;
            let id = entry.id.map(str::to_string);
            log::debug!("Entry {}: {} at {} ({:?})", entry.index, kind, header.range(), id);
            match kind {
                FormKind::SinglePage => {
                    self.pages.push(Page::from_entry(view, entry.index, id));
                },
                FormKind::SharedResource => match id {
                    Some(id) => {
                        if self.resources.contains_key(&id) {
                            log::warn!(
                                "Duplicate resource id '{}' at entry {}; keeping the first",
                                id,
                                entry.index
                            );
                            continue;
                        }
                        let resource = Resource::from_entry(view, entry.index, id.clone());
                        self.resources.insert(id, resource);
                    },
                    None => {
                        self.options.tolerate(
                            &format!("shared resource at entry {} has no id; skipping", entry.index),
                            Error::MalformedDirectory,
                        )?;
                        self.skipped.push(SkippedComponent {
                            index: entry.index,
                            kind: kind.to_string(),
                            range: view.range(),
                        });
                    },
                },
                FormKind::MultiFile | FormKind::Unrecognized(_) => {
                    log::info!("Skipping entry {}: {}", entry.index, kind);
                    self.skipped.push(SkippedComponent {
                        index: entry.index,
                        kind: kind.to_string(),
                        range: view.range(),
                    });
                },
            }
        }
        self.directory = Some(directory);
        Ok(())
    }

    /// The whole input buffer.
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Options the document was opened with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Kind of the outer form.
    pub fn kind(&self) -> FormKind {
        self.kind
    }

    /// Whether this is a bundled multi-file document.
    pub fn is_multi_file(&self) -> bool {
        self.kind == FormKind::MultiFile
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Page at `index` (0-based).
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Shared resource by id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Shared resources in directory order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Shared resource ids in directory order.
    pub fn resource_ids(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Navigation chunk, if the bundle has one.
    pub fn navigation(&self) -> Option<&Navigation> {
        self.navigation.as_ref()
    }

    /// Directory of a bundled document.
    pub fn directory(&self) -> Option<&Directory> {
        self.directory.as_ref()
    }

    /// Components left out of the graph.
    pub fn skipped(&self) -> &[SkippedComponent] {
        &self.skipped
    }

    /// Range of directory entry `index` as framed by its own chunk header.
    ///
    /// This is the range pages and resources are viewed through, which can
    /// differ from the directory's size field. `None` for single-page files
    /// and for components that run past the end of the buffer.
    pub fn component_range(&self, index: usize) -> Option<ByteRange> {
        self.components.get(index).copied().flatten()
    }

    /// Extract the pages in `range` into a new bundle.
    ///
    /// See [`crate::slice::slice`].
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<Bytes> {
        crate::slice::slice(self, range)
    }

    /// Count the `FORM` chunks directly inside the outer form.
    ///
    /// Single-page files count as one.
    pub fn count_top_level_forms(&self) -> Result<usize> {
        if !self.is_multi_file() {
            return Ok(1);
        }
        let mut s = ByteStream::new(self.buffer.clone());
        s.skip(MAGIC.len())?;
        let outer = read_chunk_header(&mut s)?;
        let end = outer.payload_offset() + outer.length as usize;
        let body_len = end.min(self.buffer.len()).saturating_sub(FIRST_CHILD_OFFSET);
        s.seek_to(FIRST_CHILD_OFFSET)?;
        let mut count = 0;
        for child in ChunkIter::new(s.fork(body_len)?) {
            if child?.is_composite() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Serializable overview of the document.
    pub fn summary(&self) -> DocumentSummary {
        let entries = self
            .directory
            .iter()
            .flat_map(|d| d.entries())
            .map(|e| EntrySummary {
                index: e.index,
                offset: e.offset,
                size: e.size,
                flags: e.flags.bits(),
                id: e.id.map(str::to_string),
                kind: if e.is_page() {
                    "page"
                } else if e.flags.contains(FileFlags::THUMBNAILS) {
                    "thumbnails"
                } else {
                    "resource"
                },
            })
            .collect();
        DocumentSummary {
            form: self.kind.to_string(),
            size: self.buffer.len(),
            page_count: self.page_count(),
            entries,
            resource_ids: self.resources.keys().cloned().collect(),
            has_navigation: self.navigation.is_some(),
            skipped: self.skipped.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::FileRecord;
    use crate::iff::{encode_chunk, encode_form};
    use crate::writer::{DirectoryDescriptor, DjvuWriter};

    fn component(subtype: ChunkId, includes: &[&str]) -> Bytes {
        let mut children = encode_chunk(ChunkId(*b"Sjbz"), &[7; 9]).unwrap();
        for id in includes {
            children.extend(encode_chunk(ChunkId::INCL, id.as_bytes()).unwrap());
        }
        Bytes::from(encode_form(subtype, &children).unwrap())
    }

    fn bundle(parts: Vec<(FileRecord, Bytes)>) -> Bytes {
        let mut w = DjvuWriter::new();
        w.begin_multi_file_document().unwrap();
        let (records, chunks): (Vec<_>, Vec<_>) = parts.into_iter().unzip();
        w.write_directory(DirectoryDescriptor {
            entries: records,
            ..Default::default()
        })
        .unwrap();
        for c in chunks {
            w.write_chunk_verbatim(c).unwrap();
        }
        w.finalize().unwrap()
    }

    fn sample() -> Bytes {
        let dict = component(ChunkId::DJVI, &[]);
        let p1 = component(ChunkId::DJVU, &["dict"]);
        let p2 = component(ChunkId::DJVU, &[]);
        let thumbs = component(ChunkId::THUM, &[]);
        bundle(vec![
            (FileRecord::resource("dict", dict.len() as u32), dict),
            (FileRecord::page("p1", p1.len() as u32), p1),
            (FileRecord::page("p2", p2.len() as u32), p2),
            (
                FileRecord {
                    flags: FileFlags::THUMBNAILS,
                    size: thumbs.len() as u32,
                    ..Default::default()
                },
                thumbs,
            ),
        ])
    }

    #[test]
    fn test_open_bundle() {
        let doc = Document::open(sample()).unwrap();
        assert!(doc.is_multi_file());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.resource_ids(), vec!["dict"]);
        assert_eq!(doc.page(0).unwrap().id(), Some("p1"));
        assert_eq!(doc.page(1).unwrap().directory_index(), Some(2));
        assert!(doc.navigation().is_none());
        assert_eq!(doc.skipped().len(), 1);
        assert_eq!(doc.skipped()[0].kind, "FORM:THUM");
        assert_eq!(doc.count_top_level_forms().unwrap(), 4);
    }

    #[test]
    fn test_page_views_share_the_buffer() {
        let buf = sample();
        let doc = Document::open(buf.clone()).unwrap();
        let page = doc.page(0).unwrap();
        let range = page.range();
        assert_eq!(&buf[range.offset as usize..range.end()], &page.bytes()[..]);
        assert!(page.dependencies().unwrap().contains("dict"));
    }

    #[test]
    fn test_component_ranges_match_views() {
        let doc = Document::open(sample()).unwrap();
        assert_eq!(doc.component_range(1), Some(doc.page(0).unwrap().range()));
        assert_eq!(doc.component_range(0), Some(doc.resource("dict").unwrap().range()));
        assert_eq!(doc.component_range(3), Some(doc.skipped()[0].range));
        assert_eq!(doc.component_range(4), None);
    }

    #[test]
    fn test_single_page_spans_buffer() {
        let mut file = MAGIC.to_vec();
        file.extend_from_slice(&component(ChunkId::DJVU, &[]));
        let len = file.len() as u32;
        let doc = Document::open(file).unwrap();
        assert!(!doc.is_multi_file());
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page(0).unwrap().range(), ByteRange::new(0, len));
        assert!(doc.directory().is_none());
        assert_eq!(doc.component_range(0), None);
        assert_eq!(doc.count_top_level_forms().unwrap(), 1);
    }

    #[test]
    fn test_bad_magic() {
        let inputs: [&[u8]; 4] = [b"", b"AT&T", b"AT&TFORX\0\0\0\x04DJVU", b"RIFF\0\0\0\x04WAVE"];
        for input in inputs {
            assert!(matches!(
                Document::open(input.to_vec()),
                Err(Error::UnrecognizedFormat(_))
            ));
        }
    }

    #[test]
    fn test_missing_dirm() {
        let body = encode_chunk(ChunkId::NAVM, &[0; 4]).unwrap();
        let mut file = MAGIC.to_vec();
        file.extend(encode_form(ChunkId::DJVM, &body).unwrap());
        assert!(matches!(
            Document::open(file),
            Err(Error::MalformedContainer { offset: 16, .. })
        ));
    }

    #[test]
    fn test_file_size_limit() {
        let opts = ParserOptions {
            max_file_size: 10,
            ..ParserOptions::default()
        };
        assert!(matches!(
            Document::open_with_options(sample(), opts),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_summary_serializes() {
        let doc = Document::open(sample()).unwrap();
        let summary = doc.summary();
        assert_eq!(summary.entries.len(), 4);
        assert_eq!(summary.entries[3].kind, "thumbnails");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"page_count\":2"));
    }

    #[test]
    fn test_document_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Document>();
    }
}
