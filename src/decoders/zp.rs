//! ZP adaptive binary arithmetic coder.
//!
//! The ZP coder codes one bit at a time against a [`BitContext`], a single
//! byte of adaptive state indexing a 256-entry probability table. Bits can
//! also be coded in pass-through mode, with a fixed probability of one half
//! and no context.
//!
//! The decoder feeds `0xff` once the input is exhausted and gives up after
//! 25 such bytes. The encoder holds back its first 25 output bits, which the
//! decoder never needs.

use crate::error::{Error, Result};

/// Adaptive state of one binary context.
pub type BitContext = u8;

/// Bytes of `0xff` the decoder may invent past the end of its input.
const EOF_SLACK: i32 = 25;

#[derive(Debug, Clone, Copy)]
struct State {
    /// LPS probability
    p: u16,
    /// MPS adaptation threshold
    m: u16,
    /// Next state after an MPS adaptation
    up: u8,
    /// Next state after an LPS
    dn: u8,
}

const fn st(p: u16, m: u16, up: u8, dn: u8) -> State {
    State { p, m, up, dn }
}

#[rustfmt::skip]
static TABLE: [State; 256] = [
    st(0x8000, 0x0000, 84, 145),
    st(0x8000, 0x0000, 3, 4),
    st(0x8000, 0x0000, 4, 3),
    st(0x6bbd, 0x10a5, 5, 1),
    st(0x6bbd, 0x10a5, 6, 2),
    st(0x5d45, 0x1f28, 7, 3),
    st(0x5d45, 0x1f28, 8, 4),
    st(0x51b9, 0x2bd3, 9, 5),
    st(0x51b9, 0x2bd3, 10, 6),
    st(0x4813, 0x36e3, 11, 7),
    st(0x4813, 0x36e3, 12, 8),
    st(0x3fd5, 0x408c, 13, 9),
    st(0x3fd5, 0x408c, 14, 10),
    st(0x38b1, 0x48fd, 15, 11),
    st(0x38b1, 0x48fd, 16, 12),
    st(0x3275, 0x505d, 17, 13),
    st(0x3275, 0x505d, 18, 14),
    st(0x2cfd, 0x56d0, 19, 15),
    st(0x2cfd, 0x56d0, 20, 16),
    st(0x2825, 0x5c71, 21, 17),
    st(0x2825, 0x5c71, 22, 18),
    st(0x23ab, 0x615b, 23, 19),
    st(0x23ab, 0x615b, 24, 20),
    st(0x1f87, 0x65a5, 25, 21),
    st(0x1f87, 0x65a5, 26, 22),
    st(0x1bbb, 0x6962, 27, 23),
    st(0x1bbb, 0x6962, 28, 24),
    st(0x1845, 0x6ca2, 29, 25),
    st(0x1845, 0x6ca2, 30, 26),
    st(0x1523, 0x6f74, 31, 27),
    st(0x1523, 0x6f74, 32, 28),
    st(0x1253, 0x71e6, 33, 29),
    st(0x1253, 0x71e6, 34, 30),
    st(0x0fcf, 0x7404, 35, 31),
    st(0x0fcf, 0x7404, 36, 32),
    st(0x0d95, 0x75d6, 37, 33),
    st(0x0d95, 0x75d6, 38, 34),
    st(0x0b9d, 0x7768, 39, 35),
    st(0x0b9d, 0x7768, 40, 36),
    st(0x09e3, 0x78c2, 41, 37),
    st(0x09e3, 0x78c2, 42, 38),
    st(0x0861, 0x79ea, 43, 39),
    st(0x0861, 0x79ea, 44, 40),
    st(0x0711, 0x7ae7, 45, 41),
    st(0x0711, 0x7ae7, 46, 42),
    st(0x05f1, 0x7bbe, 47, 43),
    st(0x05f1, 0x7bbe, 48, 44),
    st(0x04f9, 0x7c75, 49, 45),
    st(0x04f9, 0x7c75, 50, 46),
    st(0x0425, 0x7d0f, 51, 47),
    st(0x0425, 0x7d0f, 52, 48),
    st(0x0371, 0x7d91, 53, 49),
    st(0x0371, 0x7d91, 54, 50),
    st(0x02d9, 0x7dfe, 55, 51),
    st(0x02d9, 0x7dfe, 56, 52),
    st(0x0259, 0x7e5a, 57, 53),
    st(0x0259, 0x7e5a, 58, 54),
    st(0x01ed, 0x7ea6, 59, 55),
    st(0x01ed, 0x7ea6, 60, 56),
    st(0x0193, 0x7ee6, 61, 57),
    st(0x0193, 0x7ee6, 62, 58),
    st(0x0149, 0x7f1a, 63, 59),
    st(0x0149, 0x7f1a, 64, 60),
    st(0x010b, 0x7f45, 65, 61),
    st(0x010b, 0x7f45, 66, 62),
    st(0x00d5, 0x7f6b, 67, 63),
    st(0x00d5, 0x7f6b, 68, 64),
    st(0x00a5, 0x7f8d, 69, 65),
    st(0x00a5, 0x7f8d, 70, 66),
    st(0x007b, 0x7faa, 71, 67),
    st(0x007b, 0x7faa, 72, 68),
    st(0x0057, 0x7fc3, 73, 69),
    st(0x0057, 0x7fc3, 74, 70),
    st(0x003b, 0x7fd7, 75, 71),
    st(0x003b, 0x7fd7, 76, 72),
    st(0x0023, 0x7fe7, 77, 73),
    st(0x0023, 0x7fe7, 78, 74),
    st(0x0013, 0x7ff2, 79, 75),
    st(0x0013, 0x7ff2, 80, 76),
    st(0x0007, 0x7ffa, 81, 77),
    st(0x0007, 0x7ffa, 82, 78),
    st(0x0001, 0x7fff, 81, 79),
    st(0x0001, 0x7fff, 82, 80),
    st(0x5695, 0x0000, 9, 85),
    st(0x24ee, 0x0000, 86, 226),
    st(0x8000, 0x0000, 5, 6),
    st(0x0d30, 0x0000, 88, 176),
    st(0x481a, 0x0000, 89, 143),
    st(0x0481, 0x0000, 90, 138),
    st(0x3579, 0x0000, 91, 141),
    st(0x017a, 0x0000, 92, 112),
    st(0x24ef, 0x0000, 93, 135),
    st(0x007b, 0x0000, 94, 104),
    st(0x1978, 0x0000, 95, 133),
    st(0x0028, 0x0000, 96, 100),
    st(0x10ca, 0x0000, 97, 129),
    st(0x000d, 0x0000, 82, 98),
    st(0x0b5d, 0x0000, 99, 127),
    st(0x0034, 0x0000, 76, 72),
    st(0x078a, 0x0000, 101, 125),
    st(0x00a0, 0x0000, 70, 102),
    st(0x050f, 0x0000, 103, 123),
    st(0x0117, 0x0000, 66, 60),
    st(0x0358, 0x0000, 105, 121),
    st(0x01ea, 0x0000, 106, 110),
    st(0x0234, 0x0000, 107, 119),
    st(0x0144, 0x0000, 66, 108),
    st(0x0173, 0x0000, 109, 117),
    st(0x0234, 0x0000, 60, 54),
    st(0x00f5, 0x0000, 111, 115),
    st(0x0353, 0x0000, 56, 48),
    st(0x00a1, 0x0000, 69, 113),
    st(0x05c5, 0x0000, 114, 134),
    st(0x011a, 0x0000, 65, 59),
    st(0x03cf, 0x0000, 116, 132),
    st(0x01aa, 0x0000, 61, 55),
    st(0x0285, 0x0000, 118, 130),
    st(0x0286, 0x0000, 57, 51),
    st(0x01ab, 0x0000, 120, 128),
    st(0x03d3, 0x0000, 53, 47),
    st(0x011a, 0x0000, 122, 126),
    st(0x05c5, 0x0000, 49, 41),
    st(0x00ba, 0x0000, 124, 62),
    st(0x08ad, 0x0000, 43, 37),
    st(0x007a, 0x0000, 72, 66),
    st(0x0ccc, 0x0000, 39, 31),
    st(0x01eb, 0x0000, 60, 54),
    st(0x1302, 0x0000, 33, 25),
    st(0x02e6, 0x0000, 56, 50),
    st(0x1b81, 0x0000, 29, 131),
    st(0x045e, 0x0000, 52, 46),
    st(0x24ef, 0x0000, 23, 17),
    st(0x0690, 0x0000, 48, 40),
    st(0x2865, 0x0000, 23, 15),
    st(0x09de, 0x0000, 42, 136),
    st(0x3987, 0x0000, 137, 7),
    st(0x0dc8, 0x0000, 38, 32),
    st(0x2c99, 0x0000, 21, 139),
    st(0x10ca, 0x0000, 140, 172),
    st(0x3b5f, 0x0000, 15, 9),
    st(0x0b5d, 0x0000, 142, 170),
    st(0x5695, 0x0000, 9, 85),
    st(0x078a, 0x0000, 144, 168),
    st(0x8000, 0x0000, 141, 248),
    st(0x050f, 0x0000, 146, 166),
    st(0x24ee, 0x0000, 147, 247),
    st(0x0358, 0x0000, 148, 164),
    st(0x0d30, 0x0000, 149, 197),
    st(0x0234, 0x0000, 150, 162),
    st(0x0481, 0x0000, 151, 95),
    st(0x0173, 0x0000, 152, 160),
    st(0x017a, 0x0000, 153, 173),
    st(0x00f5, 0x0000, 154, 158),
    st(0x007b, 0x0000, 155, 165),
    st(0x00a1, 0x0000, 70, 156),
    st(0x0028, 0x0000, 157, 161),
    st(0x011a, 0x0000, 66, 60),
    st(0x000d, 0x0000, 81, 159),
    st(0x01aa, 0x0000, 62, 56),
    st(0x0034, 0x0000, 75, 71),
    st(0x0286, 0x0000, 58, 52),
    st(0x00a0, 0x0000, 69, 163),
    st(0x03d3, 0x0000, 54, 48),
    st(0x0117, 0x0000, 65, 59),
    st(0x05c5, 0x0000, 50, 42),
    st(0x01ea, 0x0000, 167, 171),
    st(0x08ad, 0x0000, 44, 38),
    st(0x0144, 0x0000, 65, 169),
    st(0x0ccc, 0x0000, 40, 32),
    st(0x0234, 0x0000, 59, 53),
    st(0x1302, 0x0000, 34, 26),
    st(0x0353, 0x0000, 55, 47),
    st(0x1b81, 0x0000, 30, 174),
    st(0x05c5, 0x0000, 175, 193),
    st(0x24ef, 0x0000, 24, 18),
    st(0x03cf, 0x0000, 177, 191),
    st(0x2b74, 0x0000, 178, 222),
    st(0x0285, 0x0000, 179, 189),
    st(0x201d, 0x0000, 180, 218),
    st(0x01ab, 0x0000, 181, 187),
    st(0x1715, 0x0000, 182, 216),
    st(0x011a, 0x0000, 183, 185),
    st(0x0fb7, 0x0000, 184, 214),
    st(0x00ba, 0x0000, 69, 61),
    st(0x0a67, 0x0000, 186, 212),
    st(0x01eb, 0x0000, 59, 53),
    st(0x06e7, 0x0000, 188, 210),
    st(0x02e6, 0x0000, 55, 49),
    st(0x0496, 0x0000, 190, 208),
    st(0x045e, 0x0000, 51, 45),
    st(0x030d, 0x0000, 192, 206),
    st(0x0690, 0x0000, 47, 39),
    st(0x0206, 0x0000, 194, 204),
    st(0x09de, 0x0000, 41, 195),
    st(0x0155, 0x0000, 196, 202),
    st(0x0dc8, 0x0000, 37, 31),
    st(0x00e1, 0x0000, 198, 200),
    st(0x2b74, 0x0000, 199, 243),
    st(0x0094, 0x0000, 72, 64),
    st(0x201d, 0x0000, 201, 239),
    st(0x0188, 0x0000, 62, 56),
    st(0x1715, 0x0000, 203, 237),
    st(0x0252, 0x0000, 58, 52),
    st(0x0fb7, 0x0000, 205, 235),
    st(0x0383, 0x0000, 54, 48),
    st(0x0a67, 0x0000, 207, 233),
    st(0x0547, 0x0000, 50, 44),
    st(0x06e7, 0x0000, 209, 231),
    st(0x07e2, 0x0000, 46, 38),
    st(0x0496, 0x0000, 211, 229),
    st(0x0bc0, 0x0000, 40, 34),
    st(0x030d, 0x0000, 213, 227),
    st(0x1178, 0x0000, 36, 28),
    st(0x0206, 0x0000, 215, 225),
    st(0x19da, 0x0000, 30, 22),
    st(0x0155, 0x0000, 217, 223),
    st(0x24ef, 0x0000, 26, 16),
    st(0x00e1, 0x0000, 219, 221),
    st(0x320e, 0x0000, 20, 220),
    st(0x0094, 0x0000, 71, 63),
    st(0x432a, 0x0000, 14, 8),
    st(0x0188, 0x0000, 61, 55),
    st(0x447d, 0x0000, 14, 224),
    st(0x0252, 0x0000, 57, 51),
    st(0x5ece, 0x0000, 8, 2),
    st(0x0383, 0x0000, 53, 47),
    st(0x8000, 0x0000, 228, 87),
    st(0x0547, 0x0000, 49, 43),
    st(0x481a, 0x0000, 230, 246),
    st(0x07e2, 0x0000, 45, 37),
    st(0x3579, 0x0000, 232, 244),
    st(0x0bc0, 0x0000, 39, 33),
    st(0x24ef, 0x0000, 234, 238),
    st(0x1178, 0x0000, 35, 27),
    st(0x1978, 0x0000, 138, 236),
    st(0x19da, 0x0000, 29, 21),
    st(0x2865, 0x0000, 24, 16),
    st(0x24ef, 0x0000, 25, 15),
    st(0x3987, 0x0000, 240, 8),
    st(0x320e, 0x0000, 19, 241),
    st(0x2c99, 0x0000, 22, 242),
    st(0x432a, 0x0000, 13, 7),
    st(0x3b5f, 0x0000, 16, 10),
    st(0x447d, 0x0000, 13, 245),
    st(0x5695, 0x0000, 10, 2),
    st(0x5ece, 0x0000, 7, 1),
    st(0x8000, 0x0000, 244, 83),
    st(0x8000, 0x0000, 249, 250),
    st(0x5695, 0x0000, 10, 2),
    st(0x481a, 0x0000, 89, 143),
    st(0x481a, 0x0000, 230, 246),
    st(0x0000, 0x0000, 0, 0),
    st(0x0000, 0x0000, 0, 0),
    st(0x0000, 0x0000, 0, 0),
    st(0x0000, 0x0000, 0, 0),
    st(0x0000, 0x0000, 0, 0),
];

/// Number of leading one bits of a 16-bit interval value.
fn leading_ones(a: u32) -> u32 {
    (!(a as u16)).leading_zeros()
}

/// ZP decoder over a byte slice.
pub struct ZpDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    a: u32,
    code: u32,
    fence: u32,
    buffer: u32,
    scount: i32,
    delay: i32,
}

impl<'a> ZpDecoder<'a> {
    /// Start decoding `input`.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        let mut zp = Self {
            input,
            pos: 0,
            a: 0,
            code: 0,
            fence: 0,
            buffer: 0,
            scount: 0,
            delay: EOF_SLACK,
        };
        let hi = zp.next_byte().unwrap_or(0xff) as u32;
        let lo = zp.next_byte().unwrap_or(0xff) as u32;
        zp.code = (hi << 8) | lo;
        zp.preload()?;
        zp.update_fence();
        Ok(zp)
    }

    /// Number of input bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn preload(&mut self) -> Result<()> {
        while self.scount <= 24 {
            let byte = match self.next_byte() {
                Some(b) => b,
                None => {
                    self.delay -= 1;
                    if self.delay < 1 {
                        return Err(Error::Decode(format!(
                            "ZP stream ended prematurely after {} bytes",
                            self.input.len()
                        )));
                    }
                    0xff
                },
            };
            self.buffer = (self.buffer << 8) | byte as u32;
            self.scount += 8;
        }
        Ok(())
    }

    fn update_fence(&mut self) {
        self.fence = self.code.min(0x7fff);
    }

    fn shift_lps(&mut self, z: u32) -> Result<()> {
        let z = 0x10000 - z;
        self.a += z;
        self.code += z;
        let shift = leading_ones(self.a);
        self.scount -= shift as i32;
        self.a = (self.a << shift) & 0xffff;
        let incoming = (self.buffer >> self.scount as u32) & ((1u32 << shift) - 1);
        self.code = ((self.code << shift) & 0xffff) | incoming;
        if self.scount < 16 {
            self.preload()?;
        }
        self.update_fence();
        Ok(())
    }

    fn shift_mps(&mut self, z: u32) -> Result<()> {
        self.scount -= 1;
        self.a = (z << 1) & 0xffff;
        let incoming = (self.buffer >> self.scount as u32) & 1;
        self.code = ((self.code << 1) & 0xffff) | incoming;
        if self.scount < 16 {
            self.preload()?;
        }
        self.update_fence();
        Ok(())
    }

    /// Decode one bit against an adaptive context.
    pub fn decode(&mut self, ctx: &mut BitContext) -> Result<bool> {
        let state = TABLE[*ctx as usize];
        let mps = *ctx & 1 != 0;
        let z = self.a + state.p as u32;
        if z <= self.fence {
            self.a = z;
            return Ok(mps);
        }
        // Avoid interval reversion
        let z = z.min(0x6000 + ((z + self.a) >> 2));
        if z > self.code {
            *ctx = state.dn;
            self.shift_lps(z)?;
            Ok(!mps)
        } else {
            if self.a >= state.m as u32 {
                *ctx = state.up;
            }
            self.shift_mps(z)?;
            Ok(mps)
        }
    }

    /// Decode one bit with probability one half.
    pub fn decode_passthrough(&mut self) -> Result<bool> {
        let z = 0x8000 + (self.a >> 1);
        if z > self.code {
            self.shift_lps(z)?;
            Ok(true)
        } else {
            self.shift_mps(z)?;
            Ok(false)
        }
    }
}

/// ZP encoder producing a byte vector.
pub struct ZpEncoder {
    out: Vec<u8>,
    a: u32,
    subend: u32,
    buffer: u32,
    nrun: u32,
    byte: u8,
    bits: u8,
    delay: u32,
}

impl Default for ZpEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZpEncoder {
    /// Create an encoder with empty output.
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            a: 0,
            subend: 0,
            buffer: 0xffffff,
            nrun: 0,
            byte: 0,
            bits: 0,
            delay: EOF_SLACK as u32,
        }
    }

    fn outbit(&mut self, bit: u8) {
        if self.delay > 0 {
            // 0xff suspends emission after a flush
            if self.delay < 0xff {
                self.delay -= 1;
            }
            return;
        }
        self.byte = (self.byte << 1) | bit;
        self.bits += 1;
        if self.bits == 8 {
            self.out.push(self.byte);
            self.bits = 0;
            self.byte = 0;
        }
    }

    fn flush_run(&mut self, lead: u8) {
        self.outbit(lead);
        while self.nrun > 0 {
            self.outbit(lead ^ 1);
            self.nrun -= 1;
        }
    }

    fn zemit(&mut self, b: i32) {
        self.buffer = (self.buffer << 1).wrapping_add_signed(b);
        let carry = self.buffer >> 24;
        self.buffer &= 0xffffff;
        match carry {
            1 => self.flush_run(1),
            0xff => self.flush_run(0),
            0 => self.nrun += 1,
            other => log::debug!("ZP encoder: unexpected carry {:#x}", other),
        }
    }

    fn export_bit(&mut self) {
        self.zemit(1 - (self.subend >> 15) as i32);
        self.subend = (self.subend << 1) & 0xffff;
        self.a = (self.a << 1) & 0xffff;
    }

    fn encode_mps(&mut self, z: u32) {
        self.a = z;
        if self.a >= 0x8000 {
            self.export_bit();
        }
    }

    fn encode_lps(&mut self, z: u32) {
        let z = 0x10000 - z;
        self.subend += z;
        self.a += z;
        while self.a >= 0x8000 {
            self.export_bit();
        }
    }

    /// Encode one bit against an adaptive context.
    pub fn encode(&mut self, bit: bool, ctx: &mut BitContext) {
        let state = TABLE[*ctx as usize];
        let mps = *ctx & 1 != 0;
        let z = self.a + state.p as u32;
        if bit != mps {
            let z = z.min(0x6000 + ((z + self.a) >> 2));
            *ctx = state.dn;
            self.encode_lps(z);
        } else if z >= 0x8000 {
            let z = z.min(0x6000 + ((z + self.a) >> 2));
            if self.a >= state.m as u32 {
                *ctx = state.up;
            }
            self.encode_mps(z);
        } else {
            self.a = z;
        }
    }

    /// Encode one bit with probability one half.
    pub fn encode_passthrough(&mut self, bit: bool) {
        let z = 0x8000 + (self.a >> 1);
        if bit {
            self.encode_lps(z);
        } else {
            self.encode_mps(z);
        }
    }

    /// Flush pending state and return the coded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.subend > 0x8000 {
            self.subend = 0x10000;
        } else if self.subend > 0 {
            self.subend = 0x8000;
        }
        while self.buffer != 0xffffff || self.subend != 0 {
            self.zemit(1 - (self.subend >> 15) as i32);
            self.subend = (self.subend << 1) & 0xffff;
        }
        self.flush_run(1);
        while self.bits > 0 {
            self.outbit(1);
        }
        self.delay = 0xff;
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random bits with a given bias (per mille of ones).
    fn biased_bits(n: usize, ones_per_mille: u32, seed: u32) -> Vec<bool> {
        let mut x = seed;
        (0..n)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (x >> 16) % 1000 < ones_per_mille
            })
            .collect()
    }

    #[test]
    fn test_table_transitions_are_valid() {
        for (i, s) in TABLE.iter().enumerate().take(251) {
            assert!((s.up as usize) < 251, "state {} up", i);
            assert!((s.dn as usize) < 251, "state {} dn", i);
            assert!(s.p > 0, "state {} p", i);
        }
    }

    #[test]
    fn test_context_bits_agree() {
        let bits = biased_bits(5000, 120, 7);
        let mut enc = ZpEncoder::new();
        let mut ctx: BitContext = 0;
        for &b in &bits {
            enc.encode(b, &mut ctx);
        }
        let coded = enc.finish();

        let mut dec = ZpDecoder::new(&coded).unwrap();
        let mut ctx: BitContext = 0;
        for (i, &b) in bits.iter().enumerate() {
            assert_eq!(dec.decode(&mut ctx).unwrap(), b, "bit {}", i);
        }
    }

    #[test]
    fn test_passthrough_bits_agree() {
        let bits = biased_bits(777, 500, 3);
        let mut enc = ZpEncoder::new();
        for &b in &bits {
            enc.encode_passthrough(b);
        }
        let coded = enc.finish();

        let mut dec = ZpDecoder::new(&coded).unwrap();
        for &b in &bits {
            assert_eq!(dec.decode_passthrough().unwrap(), b);
        }
    }

    #[test]
    fn test_mixed_contexts_and_passthrough() {
        let bits = biased_bits(3000, 300, 11);
        let mut enc = ZpEncoder::new();
        let mut ctxs = [0 as BitContext; 4];
        for (i, &b) in bits.iter().enumerate() {
            if i % 5 == 0 {
                enc.encode_passthrough(b);
            } else {
                enc.encode(b, &mut ctxs[i % 4]);
            }
        }
        let coded = enc.finish();

        let mut dec = ZpDecoder::new(&coded).unwrap();
        let mut ctxs = [0 as BitContext; 4];
        for (i, &b) in bits.iter().enumerate() {
            let got = if i % 5 == 0 {
                dec.decode_passthrough().unwrap()
            } else {
                dec.decode(&mut ctxs[i % 4]).unwrap()
            };
            assert_eq!(got, b, "bit {}", i);
        }
    }

    #[test]
    fn test_skewed_input_compresses() {
        let mut enc = ZpEncoder::new();
        let mut ctx: BitContext = 0;
        for _ in 0..20_000 {
            enc.encode(false, &mut ctx);
        }
        let coded = enc.finish();
        assert!(coded.len() < 200, "coded {} bytes", coded.len());
    }

    #[test]
    fn test_decoder_gives_up_past_end() {
        let mut dec = ZpDecoder::new(&[]).unwrap();
        let mut failed = false;
        for _ in 0..10_000 {
            if dec.decode_passthrough().is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }
}
