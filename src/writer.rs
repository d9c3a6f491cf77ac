//! Bundled multi-file document writer.
//!
//! The writer lays out a new `FORM:DJVM` bundle:
//!
//! ```text
//! AT&T FORM <len> DJVM
//!   DIRM   directory with offsets recomputed for this layout
//!   NAVM   optional, copied verbatim
//!   ...    one component chunk per directory entry, copied verbatim
//! ```
//!
//! Every chunk starts on an even offset. Directory sizes are taken from the
//! component bytes actually written.

use crate::decoders::DEFAULT_BLOCK_KB;
use crate::directory::{Directory, FileRecord, DFLAGS_BUNDLED, DIRECTORY_VERSION};
use crate::error::{Error, Result};
use crate::iff::{encode_chunk, ChunkId, HEADER_LEN, MAGIC};
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;

/// Bytes before the first child of the top-level form.
const OUTER_HEADER_LEN: usize = 16;

/// Configuration for bundle generation.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// BZZ block size for the directory tables, in KiB
    pub block_size_kb: usize,
    /// Reject descriptor sizes that disagree with the component bytes
    pub strict_sizes: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            block_size_kb: DEFAULT_BLOCK_KB,
            strict_sizes: false,
        }
    }
}

impl WriterConfig {
    /// Set the BZZ block size.
    pub fn with_block_size_kb(mut self, block_size_kb: usize) -> Self {
        self.block_size_kb = block_size_kb;
        self
    }

    /// Treat descriptor size mismatches as errors.
    pub fn with_strict_sizes(mut self, strict: bool) -> Self {
        self.strict_sizes = strict;
        self
    }
}

/// Directory contents handed to the writer, without offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDescriptor {
    /// Directory flags byte
    pub dflags: u8,
    /// One record per component, in output order
    pub entries: Vec<FileRecord>,
}

impl Default for DirectoryDescriptor {
    fn default() -> Self {
        Self {
            dflags: DFLAGS_BUNDLED | DIRECTORY_VERSION,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Begun,
    Directory,
    Components,
}

/// Writer for bundled documents.
///
/// Calls must follow the order `begin_multi_file_document`,
/// `write_directory`, optionally `write_navigation`, then one
/// `write_chunk_verbatim` per directory entry, then `finalize`.
pub struct DjvuWriter {
    config: WriterConfig,
    stage: Stage,
    descriptor: DirectoryDescriptor,
    navigation: Option<Bytes>,
    components: Vec<Bytes>,
}

impl Default for DjvuWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DjvuWriter {
    /// Create a writer with default config.
    pub fn new() -> Self {
        Self::with_config(WriterConfig::default())
    }

    /// Create a writer with custom config.
    pub fn with_config(config: WriterConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
            descriptor: DirectoryDescriptor::default(),
            navigation: None,
            components: Vec::new(),
        }
    }

    fn expect_stage(&self, allowed: &[Stage], call: &str) -> Result<()> {
        if allowed.contains(&self.stage) {
            return Ok(());
        }
        Err(Error::Writer(format!(
            "{} called out of order (writer is at {:?})",
            call, self.stage
        )))
    }

    /// Start a new multi-file document.
    pub fn begin_multi_file_document(&mut self) -> Result<()> {
        self.expect_stage(&[Stage::Idle], "begin_multi_file_document")?;
        self.stage = Stage::Begun;
        Ok(())
    }

    /// Record the directory of the document being written.
    pub fn write_directory(&mut self, descriptor: DirectoryDescriptor) -> Result<()> {
        self.expect_stage(&[Stage::Begun], "write_directory")?;
        self.descriptor = descriptor;
        self.stage = Stage::Directory;
        Ok(())
    }

    /// Add a `NAVM` chunk (header and payload), copied as-is.
    pub fn write_navigation(&mut self, chunk: Bytes) -> Result<()> {
        self.expect_stage(&[Stage::Directory], "write_navigation")?;
        if self.navigation.is_some() {
            return Err(Error::Writer("navigation written twice".to_string()));
        }
        if chunk.len() < HEADER_LEN || chunk[..4] != ChunkId::NAVM.0 {
            return Err(Error::Writer("navigation bytes are not a NAVM chunk".to_string()));
        }
        self.navigation = Some(chunk);
        Ok(())
    }

    /// Add the next component chunk, copied as-is.
    pub fn write_chunk_verbatim(&mut self, chunk: Bytes) -> Result<()> {
        self.expect_stage(&[Stage::Directory, Stage::Components], "write_chunk_verbatim")?;
        if chunk.len() < HEADER_LEN {
            return Err(Error::Writer(format!(
                "component of {} bytes has no chunk header",
                chunk.len()
            )));
        }
        if self.components.len() >= self.descriptor.entries.len() {
            return Err(Error::Writer(format!(
                "more components than the {} directory entries",
                self.descriptor.entries.len()
            )));
        }
        self.components.push(chunk);
        self.stage = Stage::Components;
        Ok(())
    }

    /// Lay out the document and return its bytes.
    pub fn finalize(self) -> Result<Bytes> {
        self.expect_stage(&[Stage::Directory, Stage::Components], "finalize")?;
        let expected = self.descriptor.entries.len();
        if self.components.len() != expected {
            return Err(Error::Writer(format!(
                "{} components written for {} directory entries",
                self.components.len(),
                expected
            )));
        }

        let mut records = self.descriptor.entries;
        for (i, (record, chunk)) in records.iter_mut().zip(&self.components).enumerate() {
            let actual = chunk.len() as u32;
            if record.size != actual {
                let message = format!(
                    "directory entry {} says {} bytes, component has {}",
                    i, record.size, actual
                );
                if self.config.strict_sizes {
                    return Err(Error::Writer(message));
                }
                log::warn!("{}", message);
                record.size = actual;
            }
        }

        let mut dir = Directory::from_records(self.descriptor.dflags, vec![0; expected], &records)?;
        let tables = dir.encode_tables(self.config.block_size_kb)?;
        let dirm_len = dir.payload_len(tables.len());

        let mut pos = OUTER_HEADER_LEN + padded(HEADER_LEN + dirm_len);
        if let Some(nav) = &self.navigation {
            pos += padded(nav.len());
        }
        let mut offsets = Vec::with_capacity(expected);
        for chunk in &self.components {
            offsets.push(offset_field(pos)?);
            pos += padded(chunk.len());
        }
        let total = pos;
        let form_len = offset_field(total - 12)?;
        dir.set_offsets(offsets)?;

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&ChunkId::FORM.0);
        out.write_u32::<BigEndian>(form_len)?;
        out.extend_from_slice(&ChunkId::DJVM.0);
        out.extend(encode_chunk(ChunkId::DIRM, &dir.encode_payload(&tables)?)?);
        for chunk in self.navigation.iter().chain(&self.components) {
            out.extend_from_slice(chunk);
            if chunk.len() % 2 == 1 {
                out.push(0);
            }
        }
        debug_assert_eq!(out.len(), total);

        log::debug!(
            "Wrote bundle: {} components, {} bytes, navigation: {}",
            expected,
            total,
            self.navigation.is_some()
        );
        Ok(Bytes::from(out))
    }
}

fn padded(len: usize) -> usize {
    len + (len & 1)
}

fn offset_field(pos: usize) -> Result<u32> {
    u32::try_from(pos).map_err(|_| Error::Writer(format!("offset {} exceeds 32 bits", pos)))
}
