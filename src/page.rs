//! Pages and the per-page dependency lister.
//!
//! A [`Page`] is a zero-copy view of one `FORM:DJVU` component. Its
//! children are scanned lazily, at most once, the first time dependencies,
//! metadata or the chunk list are requested.

use crate::cursor::{ByteRange, ByteStream};
use crate::error::Result;
use crate::form::{scan, LazyForm, PageInfo};
use crate::iff::ChunkHeader;
use bytes::Bytes;
use std::collections::BTreeSet;

/// One page of a document.
#[derive(Debug)]
pub struct Page {
    form: LazyForm,
    id: Option<String>,
    entry: Option<usize>,
}

impl Page {
    /// A page over `view`, which starts at the page's chunk header (or at the
    /// `AT&T` magic of a single-page file).
    pub fn new(view: ByteStream) -> Self {
        Self {
            form: LazyForm::new(view),
            id: None,
            entry: None,
        }
    }

    pub(crate) fn from_entry(view: ByteStream, entry: usize, id: Option<String>) -> Self {
        Self {
            form: LazyForm::new(view),
            id,
            entry: Some(entry),
        }
    }

    /// Directory id of the page, if it came from a bundle.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Directory index of the page, if it came from a bundle.
    pub fn directory_index(&self) -> Option<usize> {
        self.entry
    }

    /// Byte range of the page in the document buffer.
    pub fn range(&self) -> ByteRange {
        self.form.view().range()
    }

    /// Raw bytes of the page component.
    pub fn bytes(&self) -> Bytes {
        self.form.view().as_bytes()
    }

    /// Ids of the shared resources this page includes directly.
    pub fn dependencies(&self) -> Result<BTreeSet<String>> {
        Ok(self.form.get()?.includes.iter().cloned().collect())
    }

    /// Page metadata, if the page has an `INFO` chunk.
    pub fn info(&self) -> Result<Option<PageInfo>> {
        Ok(self.form.get()?.info)
    }

    /// Headers of the page's child chunks.
    pub fn chunks(&self) -> Result<&[ChunkHeader]> {
        Ok(&self.form.get()?.chunks)
    }
}

/// List the `INCL` ids of the component at the start of `view` without
/// building a [`Page`].
pub fn list_dependency_ids(view: &ByteStream) -> Result<BTreeSet<String>> {
    Ok(scan(view)?.includes.into_iter().collect())
}
