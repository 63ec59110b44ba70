//! QM binary arithmetic coder.
//!
//! This is the adaptive binary arithmetic coder used by JBIG (ITU-T T.82,
//! section 6.8). Each context owns one probability state byte laid out as
//! `(mps << 7) | index`, where `index` selects an entry of the 113-entry
//! probability estimation tables.
//!
//! The encoder appends to a caller-owned `Vec<u8>` and performs the
//! `0xFF -> 0xFF 0x00` escaping itself. The decoder reads from an explicit
//! slice plus cursor so that it can stop in the middle of a symbol when the
//! input runs dry and pick up again after more bytes arrive.

use crate::header::{MARKER_ESC, MARKER_STUFF};

/// Number of contexts (12-bit context values).
pub const NUM_CONTEXTS: usize = 4096;

/// Number of probability estimation states.
pub const NUM_STATES: usize = 113;

/// LPS probability estimates, indexed by state.
static LSZ: [u16; NUM_STATES] = [
    0x5a1d, 0x2586, 0x1114, 0x080b, 0x03d8, 0x01da, 0x00e5, 0x006f, 0x0036, 0x001a, 0x000d, 0x0006,
    0x0003, 0x0001, 0x5a7f, 0x3f25, 0x2cf2, 0x207c, 0x17b9, 0x1182, 0x0cef, 0x09a1, 0x072f, 0x055c,
    0x0406, 0x0303, 0x0240, 0x01b1, 0x0144, 0x00f5, 0x00b7, 0x008a, 0x0068, 0x004e, 0x003b, 0x002c,
    0x5ae1, 0x484c, 0x3a0d, 0x2ef1, 0x261f, 0x1f33, 0x19a8, 0x1518, 0x1177, 0x0e74, 0x0bfb, 0x09f8,
    0x0861, 0x0706, 0x05cd, 0x04de, 0x040f, 0x0363, 0x02d4, 0x025c, 0x01f8, 0x01a4, 0x0160, 0x0125,
    0x00f6, 0x00cb, 0x00ab, 0x008f, 0x5b12, 0x4d04, 0x412c, 0x37d8, 0x2fe8, 0x293c, 0x2379, 0x1edf,
    0x1aa9, 0x174e, 0x1424, 0x119c, 0x0f6b, 0x0d51, 0x0bb6, 0x0a40, 0x5832, 0x4d1c, 0x438e, 0x3bdd,
    0x34ee, 0x2eae, 0x299a, 0x2516, 0x5570, 0x4ca9, 0x44d9, 0x3e22, 0x3824, 0x32b4, 0x2e17, 0x56a8,
    0x4f46, 0x47e5, 0x41cf, 0x3c3d, 0x375e, 0x5231, 0x4c0f, 0x4639, 0x415e, 0x5627, 0x50e7, 0x4b85,
    0x5597, 0x504f, 0x5a10, 0x5522, 0x59eb,
];

/// Next state after coding the more probable symbol.
static NMPS: [u8; NUM_STATES] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 13, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
    27, 28, 29, 30, 31, 32, 33, 34, 35, 9, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50,
    51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 32, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74,
    75, 76, 77, 78, 79, 48, 81, 82, 83, 84, 85, 86, 87, 71, 89, 90, 91, 92, 93, 94, 86, 96, 97, 98,
    99, 100, 93, 102, 103, 104, 99, 106, 107, 103, 109, 107, 111, 109, 111,
];

/// Next state after coding the less probable symbol.
///
/// Bit 7 is set where the MPS value flips, so that
/// `(st & 0x80) ^ NLPS[index]` yields the complete new state byte.
static NLPS: [u8; NUM_STATES] = [
    129, 14, 16, 18, 20, 23, 25, 28, 30, 33, 35, 9, 10, 12, 143, 36, 38, 39, 40, 42, 43, 45, 46,
    48, 49, 51, 52, 54, 56, 57, 59, 60, 62, 63, 32, 33, 165, 64, 65, 67, 68, 69, 70, 72, 73, 74,
    75, 77, 78, 79, 48, 50, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 61, 61, 193, 80, 81, 82, 83,
    84, 86, 87, 87, 72, 72, 74, 74, 75, 77, 77, 208, 88, 89, 90, 91, 92, 93, 86, 216, 95, 96, 97,
    99, 99, 93, 223, 101, 102, 103, 104, 99, 105, 106, 107, 103, 233, 108, 109, 110, 111, 238,
    112, 240,
];

#[inline]
fn fresh_states() -> Box<[u8]> {
    vec![0u8; NUM_CONTEXTS].into_boxed_slice()
}

/// Append one coded byte, stuffing a zero after `0xFF`.
#[inline]
fn emit(out: &mut Vec<u8>, byte: u8) {
    out.push(byte);
    if byte == MARKER_ESC {
        out.push(MARKER_STUFF);
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// QM arithmetic encoder.
#[derive(Debug, Clone)]
pub struct ArithEncoder {
    /// Probability state per context.
    st: Box<[u8]>,
    /// Code register.
    c: u32,
    /// Interval register.
    a: u32,
    /// Number of buffered `0xFF` bytes.
    sc: u32,
    /// Bits left until the next byte is complete.
    ct: u32,
    /// Byte held back because a carry may still reach it.
    buffer: Option<u8>,
}

impl Default for ArithEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithEncoder {
    /// Create an encoder with all contexts in their initial state.
    pub fn new() -> Self {
        Self {
            st: fresh_states(),
            c: 0,
            a: 0x10000,
            sc: 0,
            ct: 11,
            buffer: None,
        }
    }

    /// Prepare for a new stripe.
    ///
    /// With `reuse_states` the adaptive probability estimates of the
    /// previous stripe are kept; otherwise every context starts over.
    pub fn reset(&mut self, reuse_states: bool) {
        if !reuse_states {
            self.st.fill(0);
        }
        self.c = 0;
        self.a = 0x10000;
        self.sc = 0;
        self.ct = 11;
        self.buffer = None;
    }

    /// Current value of the interval register.
    #[inline]
    pub fn interval(&self) -> u32 {
        self.a
    }

    /// Probability state of a context as `(index, mps)`.
    #[inline]
    pub fn state(&self, cx: usize) -> (u8, u8) {
        (self.st[cx] & 0x7f, self.st[cx] >> 7)
    }

    /// Encode one pixel `pix` (0 or 1) in context `cx`.
    pub fn encode(&mut self, cx: usize, pix: u8, out: &mut Vec<u8>) {
        let st = self.st[cx];
        let ss = usize::from(st & 0x7f);
        let lsz = u32::from(LSZ[ss]);

        self.a -= lsz;
        if ((pix << 7) ^ st) & 0x80 != 0 {
            // less probable symbol, with conditional exchange
            if self.a >= lsz {
                self.c += self.a;
                self.a = lsz;
            }
            self.st[cx] = (st & 0x80) ^ NLPS[ss];
        } else {
            if self.a & 0xffff_8000 != 0 {
                return;
            }
            if self.a < lsz {
                self.c += self.a;
                self.a = lsz;
            }
            self.st[cx] = (st & 0x80) | NMPS[ss];
        }

        // renormalize
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out(out);
            }
            if self.a >= 0x8000 {
                break;
            }
        }
    }

    /// Move the top byte of the code register into the output pipeline.
    fn byte_out(&mut self, out: &mut Vec<u8>) {
        let temp = self.c >> 19;
        if temp & 0xffff_ff00 != 0 {
            // the carry runs through every pending 0xFF byte
            if let Some(buffer) = self.buffer {
                emit(out, buffer + 1);
            }
            out.extend(std::iter::repeat_n(0u8, self.sc as usize));
            self.sc = 0;
            self.buffer = Some((temp & 0xff) as u8);
        } else if temp == 0xff {
            self.sc += 1;
        } else {
            if let Some(buffer) = self.buffer {
                out.push(buffer);
            }
            for _ in 0..self.sc {
                out.extend_from_slice(&[MARKER_ESC, MARKER_STUFF]);
            }
            self.sc = 0;
            self.buffer = Some(temp as u8);
        }
        self.c &= 0x7ffff;
        self.ct = 8;
    }

    /// Terminate the code stream.
    ///
    /// Picks the value inside the final interval with the most trailing zero
    /// bits so that as few bytes as possible have to be written. Trailing
    /// zero bytes may still follow; the stripe writer strips those.
    pub fn flush(&mut self, out: &mut Vec<u8>) {
        let temp = (self.a - 1 + self.c) & 0xffff_0000;
        self.c = if temp < self.c { temp + 0x8000 } else { temp };
        self.c <<= self.ct;

        if self.c & 0xf800_0000 != 0 {
            // one final carry
            if let Some(buffer) = self.buffer {
                emit(out, buffer + 1);
            }
            if self.c & 0x07ff_f800 != 0 {
                out.extend(std::iter::repeat_n(0u8, self.sc as usize));
            }
        } else {
            if let Some(buffer) = self.buffer {
                out.push(buffer);
            }
            for _ in 0..self.sc {
                out.extend_from_slice(&[MARKER_ESC, MARKER_STUFF]);
            }
        }
        self.sc = 0;
        self.buffer = None;

        if self.c & 0x07ff_f800 != 0 {
            emit(out, ((self.c >> 19) & 0xff) as u8);
            if self.c & 0x0007_f800 != 0 {
                emit(out, ((self.c >> 11) & 0xff) as u8);
            }
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Result of one [`ArithDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithStatus {
    /// A decoded pixel value (0 or 1).
    Bit(u8),
    /// The input slice is exhausted; call again with more data.
    NeedMoreInput,
    /// A marker was reached while `stop_at_marker` was set.
    Marker,
}

/// QM arithmetic decoder.
#[derive(Debug, Clone)]
pub struct ArithDecoder {
    st: Box<[u8]>,
    c: u32,
    a: u32,
    /// Bits available in `c` below the decision window; -1 once a marker
    /// was seen (zero bits are fed from then on).
    ct: i32,
    startup: bool,
    /// Report the next marker once as [`ArithStatus::Marker`].
    pub stop_at_marker: bool,
}

impl Default for ArithDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithDecoder {
    /// Create a decoder with all contexts in their initial state.
    pub fn new() -> Self {
        Self {
            st: fresh_states(),
            c: 0,
            a: 1,
            ct: 0,
            startup: true,
            stop_at_marker: false,
        }
    }

    /// Prepare for a new stripe, keeping probability states if `reuse_states`.
    pub fn reset(&mut self, reuse_states: bool) {
        if !reuse_states {
            self.st.fill(0);
        }
        self.c = 0;
        self.a = 1;
        self.ct = 0;
        self.startup = true;
        self.stop_at_marker = false;
    }

    /// Current value of the interval register.
    #[inline]
    pub fn interval(&self) -> u32 {
        self.a
    }

    /// Probability state of a context as `(index, mps)`.
    #[inline]
    pub fn state(&self, cx: usize) -> (u8, u8) {
        (self.st[cx] & 0x7f, self.st[cx] >> 7)
    }

    /// Returns true once a marker has been passed and only padding is left.
    #[inline]
    pub fn at_marker(&self) -> bool {
        self.ct < 0
    }

    /// Decode one pixel in context `cx` from `data[*pos..]`.
    ///
    /// `*pos` is advanced past every byte taken into the code register. On
    /// [`ArithStatus::NeedMoreInput`] no state has been lost: append more
    /// data behind `data[*pos..]` and repeat the call with the same context.
    pub fn decode(&mut self, cx: usize, data: &[u8], pos: &mut usize) -> ArithStatus {
        while self.a < 0x8000 || self.startup {
            while (0..=8).contains(&self.ct) {
                let Some(&byte) = data.get(*pos) else {
                    return ArithStatus::NeedMoreInput;
                };
                if byte == MARKER_ESC {
                    let Some(&next) = data.get(*pos + 1) else {
                        return ArithStatus::NeedMoreInput;
                    };
                    if next == MARKER_STUFF {
                        self.c |= 0xff << (8 - self.ct);
                        self.ct += 8;
                        *pos += 2;
                    } else {
                        self.ct = -1;
                        if self.stop_at_marker {
                            self.stop_at_marker = false;
                            return ArithStatus::Marker;
                        }
                    }
                } else {
                    self.c |= u32::from(byte) << (8 - self.ct);
                    self.ct += 8;
                    *pos += 1;
                }
            }
            self.c <<= 1;
            self.a <<= 1;
            if self.ct >= 0 {
                self.ct -= 1;
            }
            if self.a == 0x10000 {
                self.startup = false;
            }
        }

        let st = self.st[cx];
        let ss = usize::from(st & 0x7f);
        let lsz = u32::from(LSZ[ss]);
        let mps = st >> 7;

        self.a -= lsz;
        let pix = if (self.c >> 16) < self.a {
            if self.a & 0xffff_8000 != 0 {
                return ArithStatus::Bit(mps);
            }
            // MPS exchange
            if self.a < lsz {
                self.st[cx] = (st & 0x80) ^ NLPS[ss];
                1 - mps
            } else {
                self.st[cx] = (st & 0x80) | NMPS[ss];
                mps
            }
        } else {
            self.c -= self.a << 16;
            // LPS exchange
            let pix = if self.a < lsz {
                self.st[cx] = (st & 0x80) | NMPS[ss];
                mps
            } else {
                self.st[cx] = (st & 0x80) ^ NLPS[ss];
                1 - mps
            };
            self.a = lsz;
            pix
        };
        ArithStatus::Bit(pix)
    }
}
