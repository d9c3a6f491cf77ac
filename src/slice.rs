//! Page-range extraction.
//!
//! Slicing copies a contiguous run of pages into a new bundle together with
//! exactly the shared resources they need. It runs in two passes over the
//! directory:
//!
//! 1. collect the `INCL` ids of every page in range, then close the set over
//!    resources that include further resources;
//! 2. keep the pages in range and the resources whose id is in the set,
//!    copying their bytes verbatim.
//!
//! The writer then lays out a fresh directory with recomputed offsets.

use crate::directory::{Directory, FileFlags};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::writer::{DirectoryDescriptor, DjvuWriter};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Bound, RangeBounds};

/// Non-fatal findings of a slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// A shared resource with an id that no retained page needs
    UnreferencedResource {
        /// Directory index in the source
        index: usize,
        /// Resource id
        id: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnreferencedResource { index, id } => {
                write!(f, "resource '{}' (entry {}) is not used by the slice", id, index)
            },
        }
    }
}

/// Result of [`slice_with_report`].
#[derive(Debug, Clone)]
pub struct SliceOutput {
    /// The new document
    pub bytes: Bytes,
    /// Source directory indices of the retained entries, in order
    ///
    /// Empty when the source has no directory.
    pub retained: Vec<usize>,
    /// Resource ids needed by the retained pages, after closure
    pub dependencies: BTreeSet<String>,
    /// Resources that were dropped
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract pages `range` of `doc` into a new bundle.
///
/// The range is half-open over 0-based page positions; unbounded ends mean
/// the first and last page. An empty range yields a bundle without pages.
///
/// # Errors
///
/// [`Error::InvalidRange`] if the start is past the end or the end is past
/// the last page.
pub fn slice<R: RangeBounds<usize>>(doc: &Document, range: R) -> Result<Bytes> {
    Ok(slice_with_report(doc, range)?.bytes)
}

/// Like [`slice`], also reporting what was kept and dropped.
pub fn slice_with_report<R: RangeBounds<usize>>(doc: &Document, range: R) -> Result<SliceOutput> {
    let (from, to) = resolve_range(&range, doc.page_count())?;
    let Some(directory) = doc.directory() else {
        return slice_single_page(doc, from, to);
    };

    let dependencies = collect_dependencies(doc, directory, from, to)?;

    // Page positions follow the pages assembled at open, not the flag bits
    let assembled: BTreeSet<usize> =
        doc.pages().iter().filter_map(Page::directory_index).collect();
    let in_range: BTreeSet<usize> = doc.pages()[from..to]
        .iter()
        .filter_map(Page::directory_index)
        .collect();

    let mut records = Vec::new();
    let mut chunks = Vec::new();
    let mut retained = Vec::new();
    let mut diagnostics = Vec::new();
    for entry in directory.entries() {
        let is_page = assembled.contains(&entry.index);
        let keep = if is_page {
            in_range.contains(&entry.index)
        } else {
            match entry.id {
                Some(id) if dependencies.contains(id) => true,
                Some(id) if !id.is_empty() && !entry.is_page() => {
                    let diagnostic = Diagnostic::UnreferencedResource {
                        index: entry.index,
                        id: id.to_string(),
                    };
                    log::warn!("{}", diagnostic);
                    diagnostics.push(diagnostic);
                    false
                },
                _ => {
                    log::debug!("Dropping entry {}: not a page and not included", entry.index);
                    false
                },
            }
        };
        if !keep {
            continue;
        }
        let Some(range) = doc.component_range(entry.index) else {
            log::warn!("Entry {} runs past the end of the buffer; dropping", entry.index);
            continue;
        };
        let chunk = range.slice_of(doc.buffer())?;
        let mut record = entry.to_record();
        record.size = range.length;
        record.flags.set(FileFlags::PAGE, is_page);
        records.push(record);
        chunks.push(chunk);
        retained.push(entry.index);
    }

    let mut writer = DjvuWriter::new();
    writer.begin_multi_file_document()?;
    writer.write_directory(DirectoryDescriptor {
        dflags: directory.dflags(),
        entries: records,
    })?;
    if let Some(nav) = doc.navigation() {
        writer.write_navigation(nav.chunk_bytes())?;
    }
    for chunk in chunks {
        writer.write_chunk_verbatim(chunk)?;
    }
    let bytes = writer.finalize()?;

    log::info!(
        "Sliced pages {}..{}: kept {} of {} entries, {} shared resources, {} bytes",
        from,
        to,
        retained.len(),
        directory.len(),
        dependencies.len(),
        bytes.len()
    );
    Ok(SliceOutput {
        bytes,
        retained,
        dependencies,
        diagnostics,
    })
}

fn resolve_range<R: RangeBounds<usize>>(range: &R, page_count: usize) -> Result<(usize, usize)> {
    let invalid = |from, to| Error::InvalidRange {
        from,
        to,
        page_count,
    };
    let from = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_add(1).ok_or_else(|| invalid(n, n))?,
        Bound::Unbounded => 0,
    };
    let to = match range.end_bound() {
        Bound::Included(&n) => n.checked_add(1).ok_or_else(|| invalid(from, n))?,
        Bound::Excluded(&n) => n,
        Bound::Unbounded => page_count,
    };
    if from > to || to > page_count {
        return Err(invalid(from, to));
    }
    Ok((from, to))
}

/// Ids included by pages `[from, to)`, closed over resource includes.
fn collect_dependencies(
    doc: &Document,
    directory: &Directory,
    from: usize,
    to: usize,
) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    for page in &doc.pages()[from..to] {
        ids.extend(page.dependencies()?);
    }

    let mut pending: Vec<String> = ids.iter().cloned().collect();
    while let Some(id) = pending.pop() {
        let Some(index) = directory.position_of(&id) else {
            log::warn!("Included id '{}' has no directory entry", id);
            continue;
        };
        // Skipped at open, e.g. not a FORM; kept but not followed
        let Some(resource) = doc.resource(&id) else {
            log::debug!("Entry {} ('{}') is not an assembled resource", index, id);
            continue;
        };
        for dep in resource.dependencies()? {
            if ids.insert(dep.clone()) {
                pending.push(dep);
            }
        }
    }
    Ok(ids)
}

/// A file without a directory holds exactly one page.
fn slice_single_page(doc: &Document, from: usize, to: usize) -> Result<SliceOutput> {
    if from < to {
        let dependencies = match doc.page(0) {
            Some(page) => page.dependencies()?,
            None => BTreeSet::new(),
        };
        log::info!("Slice covers the only page; returning the source unchanged");
        return Ok(SliceOutput {
            bytes: doc.buffer().clone(),
            retained: Vec::new(),
            dependencies,
            diagnostics: Vec::new(),
        });
    }
    let mut writer = DjvuWriter::new();
    writer.begin_multi_file_document()?;
    writer.write_directory(DirectoryDescriptor::default())?;
    Ok(SliceOutput {
        bytes: writer.finalize()?,
        retained: Vec::new(),
        dependencies: BTreeSet::new(),
        diagnostics: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(&(2..5), 10).unwrap(), (2, 5));
        assert_eq!(resolve_range(&(..), 10).unwrap(), (0, 10));
        assert_eq!(resolve_range(&(3..), 10).unwrap(), (3, 10));
        assert_eq!(resolve_range(&(..=4), 10).unwrap(), (0, 5));
        assert_eq!(resolve_range(&(4..4), 10).unwrap(), (4, 4));
        assert_eq!(resolve_range(&(10..10), 10).unwrap(), (10, 10));
    }

    #[test]
    fn test_resolve_range_rejects() {
        assert!(matches!(
            resolve_range(&(5..11), 10),
            Err(Error::InvalidRange { from: 5, to: 11, page_count: 10 })
        ));
        #[allow(clippy::reversed_empty_ranges)]
        let backwards = 6..5;
        assert!(matches!(
            resolve_range(&backwards, 10),
            Err(Error::InvalidRange { from: 6, to: 5, .. })
        ));
        assert!(resolve_range(&(0..=usize::MAX), 10).is_err());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::UnreferencedResource {
            index: 4,
            id: "dict9".to_string(),
        };
        assert_eq!(d.to_string(), "resource 'dict9' (entry 4) is not used by the slice");
    }
}
