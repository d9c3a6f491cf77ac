// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # DjVu Oxide
//!
//! Open, inspect and slice bundled DjVu documents.
//!
//! ## Core Features
//!
//! - **Container model**: `AT&T FORM` framing, `DIRM` directory, `NAVM`
//!   navigation, pages and shared resources as zero-copy views
//! - **Directory decoding**: BZZ-compressed size/flag/id tables via the
//!   built-in ZP arithmetic coder
//! - **Slicing**: extract any page range into a new, self-contained bundle
//!   carrying exactly the shared resources the pages include
//! - **Writing**: lay out bundles with recomputed offsets and fresh
//!   directories
//!
//! Image codecs, text layers and rendering are out of scope; page contents
//! are copied byte for byte.
//!
//! ## Quick Start
//!
//! ```no_run
//! use djvu_oxide::Document;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = Document::from_file("book.djvu")?;
//! println!("{} pages, resources: {:?}", doc.page_count(), doc.resource_ids());
//!
//! // Pages 5..10 with the dictionaries they need
//! let bytes = doc.slice(5..10)?;
//! std::fs::write("chapter.djvu", &bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

/// Parser configuration options
pub mod parser_config;

// Low-level framing
pub mod cursor;
pub mod iff;

// Stream decoders
pub mod decoders;

// Document structure
pub mod directory;
mod form;
pub mod navigation;
pub mod page;
pub mod resource;
pub mod document;

// Extraction and writing
pub mod slice;
pub mod writer;

// Re-exports
pub use cursor::{ByteRange, ByteStream};
pub use directory::{Directory, DirectoryEntry, FileFlags, FileRecord};
pub use document::{Document, DocumentSummary};
pub use error::{Error, Result};
pub use form::PageInfo;
pub use iff::{ChunkHeader, ChunkId, FormKind};
pub use navigation::{Bookmark, Navigation};
pub use page::Page;
pub use parser_config::ParserOptions;
pub use resource::Resource;
pub use slice::{slice, slice_with_report, Diagnostic, SliceOutput};
pub use writer::{DirectoryDescriptor, DjvuWriter, WriterConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
