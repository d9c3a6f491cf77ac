//! Bundle fixtures shared by the integration tests.
//!
//! Documents are built from chunk encoders and the crate's own writer, so
//! every fixture is a structurally valid bundle unless a test corrupts it.

#![allow(dead_code)]

use bytes::Bytes;
use djvu_oxide::iff::{encode_chunk, encode_form, MAGIC};
use djvu_oxide::{
    Bookmark, ChunkId, DirectoryDescriptor, DjvuWriter, FileFlags, FileRecord, Navigation,
};

/// One component of a fixture bundle.
pub enum Part {
    Page { id: String, includes: Vec<String> },
    Resource { id: String, includes: Vec<String> },
    Thumbnails,
    Raw { record: FileRecord, bytes: Vec<u8> },
}

pub fn page(id: &str, includes: &[&str]) -> Part {
    Part::Page {
        id: id.to_string(),
        includes: includes.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn resource(id: &str, includes: &[&str]) -> Part {
    Part::Resource {
        id: id.to_string(),
        includes: includes.iter().map(|s| s.to_string()).collect(),
    }
}

/// `FORM:DJVU` with an INFO chunk, the given includes and an odd-length
/// image chunk whose contents depend on `seed`.
pub fn page_form(seed: &str, includes: &[String]) -> Vec<u8> {
    let mut body = encode_chunk(ChunkId::INFO, &[0x02, 0x58, 0x03, 0x20, 24, 0, 0x96, 0x00, 22, 1])
        .unwrap();
    for id in includes {
        body.extend(encode_chunk(ChunkId::INCL, id.as_bytes()).unwrap());
    }
    let mut image = seed.as_bytes().to_vec();
    image.extend_from_slice(&[0x5a; 7]);
    if image.len() % 2 == 0 {
        image.push(0x5a);
    }
    body.extend(encode_chunk(ChunkId(*b"Sjbz"), &image).unwrap());
    encode_form(ChunkId::DJVU, &body).unwrap()
}

pub fn resource_form(seed: &str, includes: &[String]) -> Vec<u8> {
    let mut body = Vec::new();
    for id in includes {
        body.extend(encode_chunk(ChunkId::INCL, id.as_bytes()).unwrap());
    }
    body.extend(encode_chunk(ChunkId(*b"Djbz"), seed.as_bytes()).unwrap());
    encode_form(ChunkId::DJVI, &body).unwrap()
}

fn component(part: &Part) -> (FileRecord, Vec<u8>) {
    match part {
        Part::Page { id, includes } => {
            let bytes = page_form(id, includes);
            (FileRecord::page(id.clone(), bytes.len() as u32), bytes)
        },
        Part::Resource { id, includes } => {
            let bytes = resource_form(id, includes);
            (FileRecord::resource(id.clone(), bytes.len() as u32), bytes)
        },
        Part::Thumbnails => {
            let body = encode_chunk(ChunkId(*b"TH44"), &[1, 2, 3]).unwrap();
            let bytes = encode_form(ChunkId::THUM, &body).unwrap();
            let record = FileRecord {
                flags: FileFlags::THUMBNAILS,
                size: bytes.len() as u32,
                ..Default::default()
            };
            (record, bytes)
        },
        Part::Raw { record, bytes } => (record.clone(), bytes.clone()),
    }
}

/// Lay out a bundle with the parts in directory order.
pub fn build(parts: &[Part], bookmarks: Option<&[Bookmark]>) -> Bytes {
    let (records, chunks): (Vec<_>, Vec<_>) = parts.iter().map(component).unzip();
    let mut writer = DjvuWriter::new();
    writer.begin_multi_file_document().unwrap();
    writer
        .write_directory(DirectoryDescriptor {
            entries: records,
            ..Default::default()
        })
        .unwrap();
    if let Some(bookmarks) = bookmarks {
        let nav = Navigation::from_bookmarks(bookmarks, 50).unwrap();
        writer.write_navigation(nav.chunk_bytes()).unwrap();
    }
    for chunk in chunks {
        writer.write_chunk_verbatim(Bytes::from(chunk)).unwrap();
    }
    writer.finalize().unwrap()
}

/// Twenty pages over six dictionaries; pages 5 to 9 use only `d1` and `d3`.
pub fn twenty_pages() -> Bytes {
    let mut parts = vec![
        resource("d0", &[]),
        resource("d1", &[]),
        resource("d2", &[]),
    ];
    for p in 0..20 {
        let id = format!("p{:02}", p);
        let includes: &[&str] = match p {
            5 | 7 | 9 => &["d1"],
            6 => &["d3", "d1"],
            8 => &["d3"],
            _ if p % 2 == 0 => &["d0", "d2"],
            _ => &["d4"],
        };
        parts.push(page(&id, includes));
        if p == 4 {
            parts.push(resource("d3", &[]));
            parts.push(resource("d4", &[]));
        }
    }
    parts.push(resource("d5", &[]));
    parts.push(Part::Thumbnails);
    build(&parts, None)
}

/// A standalone single-page file.
pub fn single_page(includes: &[&str]) -> Vec<u8> {
    let includes: Vec<String> = includes.iter().map(|s| s.to_string()).collect();
    let mut file = MAGIC.to_vec();
    file.extend(page_form("solo", &includes));
    file
}
