//! Shared resources (`FORM:DJVI` components).
//!
//! A shared resource typically holds a dictionary or annotations shared by
//! several pages. Resources may themselves include other resources.

use crate::cursor::{ByteRange, ByteStream};
use crate::error::Result;
use crate::form::LazyForm;
use crate::iff::ChunkHeader;
use bytes::Bytes;
use std::collections::BTreeSet;

/// A shared resource, keyed by its directory id.
#[derive(Debug)]
pub struct Resource {
    form: LazyForm,
    id: String,
    entry: usize,
}

impl Resource {
    pub(crate) fn from_entry(view: ByteStream, entry: usize, id: String) -> Self {
        Self {
            form: LazyForm::new(view),
            id,
            entry,
        }
    }

    /// Directory id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory index.
    pub fn directory_index(&self) -> usize {
        self.entry
    }

    /// Byte range in the document buffer.
    pub fn range(&self) -> ByteRange {
        self.form.view().range()
    }

    /// Raw bytes of the component.
    pub fn bytes(&self) -> Bytes {
        self.form.view().as_bytes()
    }

    /// Ids of other resources this one includes.
    pub fn dependencies(&self) -> Result<BTreeSet<String>> {
        Ok(self.form.get()?.includes.iter().cloned().collect())
    }

    /// Headers of the child chunks.
    pub fn chunks(&self) -> Result<&[ChunkHeader]> {
        Ok(&self.form.get()?.chunks)
    }
}
