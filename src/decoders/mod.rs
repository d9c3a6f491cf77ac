//! Compressed stream codecs used inside DjVu containers.
//!
//! This module provides:
//! - the ZP adaptive binary arithmetic coder (`zp`)
//! - the BZZ general-purpose byte-stream codec built on it (`bzz`)
//!
//! Directory tables and navigation chunks are BZZ streams. Image layers use
//! other codecs and are never decoded here.

use crate::error::Result;
use crate::parser_config::ParserOptions;

pub mod bzz;
pub mod zp;

pub use bzz::{bzz_compress, bzz_decompress, BzzDecoder, DEFAULT_BLOCK_KB, MAX_BLOCK_KB};
pub use zp::{BitContext, ZpDecoder, ZpEncoder};

/// Security limit for decompression (decompression bomb protection).
///
/// A DIRM table is a few bytes per component, so legitimate streams stay
/// far below this.
const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Trait for stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data
    ///
    /// # Returns
    ///
    /// The decoded data or an error if decoding fails.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "BZZ").
    fn name(&self) -> &str;
}

/// Decode a BZZ stream with parser options (includes decompression bomb protection).
///
/// Uses `options.max_decompressed_size` when options are given, the default
/// limit otherwise.
///
/// # Examples
///
/// ```
/// use djvu_oxide::decoders::{bzz_compress, decode_bzz_with_options, DEFAULT_BLOCK_KB};
/// use djvu_oxide::parser_config::ParserOptions;
///
/// let packed = bzz_compress(b"page01.djvu", DEFAULT_BLOCK_KB);
/// let options = ParserOptions::strict();
/// let text = decode_bzz_with_options(&packed, Some(&options)).unwrap();
/// assert_eq!(text, b"page01.djvu");
/// ```
pub fn decode_bzz_with_options(data: &[u8], options: Option<&ParserOptions>) -> Result<Vec<u8>> {
    let max_size = options
        .map(|o| o.max_decompressed_size)
        .unwrap_or(DEFAULT_MAX_DECOMPRESSED_SIZE);
    BzzDecoder::with_limit(max_size).decode(data)
}
