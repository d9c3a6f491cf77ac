//! BZZ byte-stream codec.
//!
//! BZZ splits its input into blocks, applies a Burrows-Wheeler block sort
//! with an explicit end marker, recodes the sorted block with a quasi
//! move-to-front list whose ordering follows empirical symbol frequencies,
//! and codes the ranks with the ZP coder.
//!
//! Stream layout, per block:
//! - block size (24 pass-through bits, counting the marker; 0 ends the stream)
//! - estimation speed (one or two pass-through bits)
//! - one coded rank per block symbol
//!
//! The 300 rank contexts persist from one block to the next.

use crate::decoders::zp::{BitContext, ZpDecoder, ZpEncoder};
use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// Largest block a stream may declare, in KiB.
pub const MAX_BLOCK_KB: usize = 4096;

/// Block size used for directory and navigation tables, in KiB.
pub const DEFAULT_BLOCK_KB: usize = 50;

const CONTEXTS: usize = 300;
const CTXIDS: usize = 3;
const FREQMAX: usize = 4;
const MARKER: usize = 256;

/// BZZ decompressor.
#[derive(Debug, Clone, Copy)]
pub struct BzzDecoder {
    /// Maximum output size in bytes (0 = unlimited)
    pub max_output: usize,
}

impl BzzDecoder {
    /// Decoder refusing to produce more than `max_output` bytes.
    pub fn with_limit(max_output: usize) -> Self {
        Self { max_output }
    }
}

impl Default for BzzDecoder {
    fn default() -> Self {
        Self::with_limit(super::DEFAULT_MAX_DECOMPRESSED_SIZE)
    }
}

impl StreamDecoder for BzzDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut zp = ZpDecoder::new(input)?;
        let mut ctx = [0 as BitContext; CONTEXTS];
        let mut out = Vec::new();
        while decode_block(&mut zp, &mut ctx, &mut out, self.max_output)? {}
        log::debug!(
            "BZZ: {} compressed bytes -> {} bytes",
            zp.consumed(),
            out.len()
        );
        Ok(out)
    }

    fn name(&self) -> &str {
        "BZZ"
    }
}

/// Quasi move-to-front list with frequency-driven insertion.
struct QuasiMtf {
    mtf: [u8; 256],
    rmtf: [u8; 256],
    freq: [u32; FREQMAX],
    fadd: u32,
    fshift: u32,
}

impl QuasiMtf {
    fn new(fshift: u32) -> Self {
        let mut mtf = [0u8; 256];
        for (i, slot) in mtf.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self {
            mtf,
            rmtf: mtf,
            freq: [0; FREQMAX],
            fadd: 4,
            fshift,
        }
    }

    fn symbol(&self, rank: usize) -> u8 {
        self.mtf[rank]
    }

    fn rank_of(&self, symbol: u8) -> usize {
        self.rmtf[symbol as usize] as usize
    }

    /// Move the symbol at `rank` forward according to its updated frequency.
    fn rotate(&mut self, rank: usize) {
        let symbol = self.mtf[rank];
        self.fadd += self.fadd >> self.fshift;
        if self.fadd > 0x1000_0000 {
            self.fadd >>= 24;
            for f in self.freq.iter_mut() {
                *f >>= 24;
            }
        }
        let mut fc = self.fadd;
        if rank < FREQMAX {
            fc = fc.wrapping_add(self.freq[rank]);
        }
        let mut k = rank;
        while k >= FREQMAX {
            self.mtf[k] = self.mtf[k - 1];
            self.rmtf[self.mtf[k] as usize] = k as u8;
            k -= 1;
        }
        while k > 0 && fc >= self.freq[k - 1] {
            self.mtf[k] = self.mtf[k - 1];
            self.freq[k] = self.freq[k - 1];
            self.rmtf[self.mtf[k] as usize] = k as u8;
            k -= 1;
        }
        self.mtf[k] = symbol;
        self.freq[k] = fc;
        self.rmtf[symbol as usize] = k as u8;
    }
}

fn decode_raw(zp: &mut ZpDecoder<'_>, bits: u32) -> Result<u32> {
    let m = 1u32 << bits;
    let mut n = 1u32;
    while n < m {
        n = (n << 1) | zp.decode_passthrough()? as u32;
    }
    Ok(n - m)
}

fn decode_binary(zp: &mut ZpDecoder<'_>, ctx: &mut [BitContext], bits: u32) -> Result<usize> {
    let m = 1usize << bits;
    let mut n = 1usize;
    while n < m {
        n = (n << 1) | zp.decode(&mut ctx[n - 1])? as usize;
    }
    Ok(n - m)
}

/// Decode one rank, or [`MARKER`].
fn decode_rank(zp: &mut ZpDecoder<'_>, ctx: &mut [BitContext], previous: usize) -> Result<usize> {
    let ctxid = previous.min(CTXIDS - 1);
    if zp.decode(&mut ctx[ctxid])? {
        return Ok(0);
    }
    if zp.decode(&mut ctx[CTXIDS + ctxid])? {
        return Ok(1);
    }
    let mut base = 2 * CTXIDS;
    for bits in 1..=7u32 {
        if zp.decode(&mut ctx[base])? {
            return Ok((1 << bits) + decode_binary(zp, &mut ctx[base + 1..], bits)?);
        }
        base += 1 << bits;
    }
    Ok(MARKER)
}

/// Decode one block into `out`; returns false at the end-of-stream block.
fn decode_block(
    zp: &mut ZpDecoder<'_>,
    ctx: &mut [BitContext; CONTEXTS],
    out: &mut Vec<u8>,
    max_output: usize,
) -> Result<bool> {
    let size = decode_raw(zp, 24)? as usize;
    if size == 0 {
        return Ok(false);
    }
    if size > MAX_BLOCK_KB * 1024 {
        return Err(Error::Decode(format!(
            "BZZ block of {} bytes exceeds {} KiB",
            size, MAX_BLOCK_KB
        )));
    }
    if max_output > 0 && out.len() + size - 1 > max_output {
        return Err(Error::LimitExceeded(format!(
            "BZZ output would exceed {} bytes",
            max_output
        )));
    }

    let mut fshift = 0;
    if zp.decode_passthrough()? {
        fshift += 1;
        if zp.decode_passthrough()? {
            fshift += 1;
        }
    }

    let mut mtf = QuasiMtf::new(fshift);
    let mut data = vec![0u8; size];
    let mut markerpos = None;
    let mut rank = 3;
    for (i, slot) in data.iter_mut().enumerate() {
        rank = decode_rank(zp, ctx, rank)?;
        if rank == MARKER {
            markerpos = Some(i);
            continue;
        }
        *slot = mtf.symbol(rank);
        mtf.rotate(rank);
    }

    let markerpos = match markerpos {
        Some(p) if p >= 1 && p < size => p,
        _ => return Err(Error::Decode("BZZ block has no valid end marker".to_string())),
    };
    out.extend_from_slice(&unsort_block(&data, markerpos)?);
    Ok(true)
}

/// Invert the block sort of a decoded block, dropping the marker.
fn unsort_block(data: &[u8], markerpos: usize) -> Result<Vec<u8>> {
    let size = data.len();
    let mut posn = vec![0u32; size];
    let mut count = [0u32; 256];
    for (i, &c) in data.iter().enumerate() {
        if i == markerpos {
            continue;
        }
        posn[i] = ((c as u32) << 24) | (count[c as usize] & 0xff_ffff);
        count[c as usize] += 1;
    }
    // Row 0 holds the marker
    let mut last = 1u32;
    for slot in count.iter_mut() {
        let tmp = *slot;
        *slot = last;
        last += tmp;
    }

    let mut block = vec![0u8; size - 1];
    let mut i = 0usize;
    for slot in block.iter_mut().rev() {
        let n = posn[i];
        let c = (n >> 24) as u8;
        *slot = c;
        i = (count[c as usize] + (n & 0xff_ffff)) as usize;
        if i >= size {
            return Err(Error::Decode("BZZ block sort index out of range".to_string()));
        }
    }
    if i != markerpos {
        return Err(Error::Decode("BZZ block sort does not close on the marker".to_string()));
    }
    Ok(block)
}

fn encode_raw(zp: &mut ZpEncoder, bits: u32, x: u32) {
    for i in (0..bits).rev() {
        zp.encode_passthrough((x >> i) & 1 != 0);
    }
}

fn encode_binary(zp: &mut ZpEncoder, ctx: &mut [BitContext], bits: u32, x: usize) {
    let mut n = 1usize;
    for i in (0..bits).rev() {
        let b = (x >> i) & 1;
        zp.encode(b != 0, &mut ctx[n - 1]);
        n = (n << 1) | b;
    }
}

fn encode_rank(zp: &mut ZpEncoder, ctx: &mut [BitContext], previous: usize, rank: usize) {
    let ctxid = previous.min(CTXIDS - 1);
    zp.encode(rank == 0, &mut ctx[ctxid]);
    if rank == 0 {
        return;
    }
    zp.encode(rank == 1, &mut ctx[CTXIDS + ctxid]);
    if rank == 1 {
        return;
    }
    let mut base = 2 * CTXIDS;
    for bits in 1..=7u32 {
        let hit = rank < (1 << (bits + 1));
        zp.encode(hit, &mut ctx[base]);
        if hit {
            encode_binary(zp, &mut ctx[base + 1..], bits, rank - (1 << bits));
            return;
        }
        base += 1 << bits;
    }
}

/// Suffix array of `block` followed by a unique sentinel smaller than every byte.
fn suffix_array(block: &[u8]) -> Vec<usize> {
    let n = block.len() + 1;
    let mut rank: Vec<u32> = block.iter().map(|&b| b as u32 + 1).collect();
    rank.push(0);
    let mut sa: Vec<usize> = (0..n).collect();
    let mut next = vec![0u32; n];
    let mut k = 1;
    loop {
        let key = |i: usize| (rank[i], if i + k < n { rank[i + k] + 1 } else { 0 });
        sa.sort_unstable_by_key(|&i| key(i));
        next[sa[0]] = 0;
        for w in 1..n {
            next[sa[w]] = next[sa[w - 1]] + (key(sa[w - 1]) < key(sa[w])) as u32;
        }
        rank.copy_from_slice(&next);
        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            return sa;
        }
        k *= 2;
    }
}

/// Burrows-Wheeler transform; returns the sorted block and the marker position.
fn sort_block(block: &[u8]) -> (Vec<u8>, usize) {
    let sa = suffix_array(block);
    let mut markerpos = 0;
    let sorted = sa
        .iter()
        .enumerate()
        .map(|(j, &start)| {
            if start == 0 {
                markerpos = j;
                0
            } else {
                block[start - 1]
            }
        })
        .collect();
    (sorted, markerpos)
}

fn encode_block(zp: &mut ZpEncoder, ctx: &mut [BitContext; CONTEXTS], block: &[u8]) {
    let size = block.len() + 1;
    let (sorted, markerpos) = sort_block(block);
    encode_raw(zp, 24, size as u32);

    let fshift = if size < 100_000 {
        zp.encode_passthrough(false);
        0
    } else if size < 1_000_000 {
        zp.encode_passthrough(true);
        zp.encode_passthrough(false);
        1
    } else {
        zp.encode_passthrough(true);
        zp.encode_passthrough(true);
        2
    };

    let mut mtf = QuasiMtf::new(fshift);
    let mut previous = 3;
    for (i, &c) in sorted.iter().enumerate() {
        let rank = if i == markerpos { MARKER } else { mtf.rank_of(c) };
        encode_rank(zp, ctx, previous, rank);
        if rank != MARKER {
            mtf.rotate(rank);
        }
        previous = rank;
    }
}

/// Compress `input` with blocks of at most `block_size_kb` KiB.
pub fn bzz_compress(input: &[u8], block_size_kb: usize) -> Vec<u8> {
    let block_bytes = block_size_kb.clamp(1, MAX_BLOCK_KB) * 1024 - 1;
    let mut zp = ZpEncoder::new();
    let mut ctx = [0 as BitContext; CONTEXTS];
    for block in input.chunks(block_bytes) {
        encode_block(&mut zp, &mut ctx, block);
    }
    encode_raw(&mut zp, 24, 0);
    zp.finish()
}

/// Decompress a whole BZZ stream with the default size limit.
pub fn bzz_decompress(input: &[u8]) -> Result<Vec<u8>> {
    BzzDecoder::default().decode(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_block_banana() {
        let (sorted, markerpos) = sort_block(b"banana");
        // Rotations of "banana$" sorted with '$' smallest
        assert_eq!(markerpos, 4);
        assert_eq!(sorted[0], b'a');
        assert_eq!(&sorted[..4], b"annb");
        assert_eq!(&sorted[5..], b"aa");
        assert_eq!(unsort_block(&sorted, markerpos).unwrap(), b"banana");
    }

    #[test]
    fn test_compress_text() {
        let text = b"A bundled document keeps its directory compressed with BZZ. ".repeat(40);
        let packed = bzz_compress(&text, DEFAULT_BLOCK_KB);
        assert!(packed.len() < text.len() / 4, "packed {} bytes", packed.len());
        assert_eq!(bzz_decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_empty_stream() {
        let packed = bzz_compress(&[], DEFAULT_BLOCK_KB);
        assert!(bzz_decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_multiple_blocks_share_contexts() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
        let packed = bzz_compress(&data, 1);
        assert_eq!(bzz_decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).rev().chain(0..=255u8).collect();
        let packed = bzz_compress(&data, DEFAULT_BLOCK_KB);
        assert_eq!(bzz_decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_output_limit() {
        let data = vec![b'x'; 4096];
        let packed = bzz_compress(&data, DEFAULT_BLOCK_KB);
        let err = BzzDecoder::with_limit(1000).decode(&packed).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));
        assert_eq!(BzzDecoder::with_limit(0).decode(&packed).unwrap(), data);
    }

    #[test]
    fn test_truncated_stream_does_not_yield_original() {
        let text = b"0123456789abcdefghijklmnopqrstuvwxyz".repeat(64);
        let packed = bzz_compress(&text, DEFAULT_BLOCK_KB);
        let truncated = &packed[..packed.len() / 2];
        let intact = bzz_decompress(truncated).map(|d| d == text).unwrap_or(false);
        assert!(!intact);
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        // Pass-through encoding of a block size above the maximum
        let mut zp = ZpEncoder::new();
        encode_raw(&mut zp, 24, (MAX_BLOCK_KB * 1024 + 1) as u32);
        let packed = zp.finish();
        assert!(matches!(bzz_decompress(&packed), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decoder_name() {
        assert_eq!(BzzDecoder::default().name(), "BZZ");
    }
}
