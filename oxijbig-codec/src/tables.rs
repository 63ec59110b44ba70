//! Resolution reduction and deterministic prediction tables.
//!
//! The resolution reduction table maps a 12-bit neighbourhood (nine
//! high-resolution pixels around the 2x2 block, plus three already reduced
//! low-resolution neighbours) to the value of the low-resolution pixel. Its
//! contents are those of ITU-T T.82 Table 17: a weighted vote of the
//! neighbourhood plus the exceptions that keep thin lines, edges and
//! periodic patterns alive at the lower resolution.
//!
//! The default deterministic prediction (DP) table lists, for every
//! partially known neighbourhood, whether the reduction table already
//! forces the next high-resolution pixel. It is kept in the 1728-byte form
//! in which a BIE transmits a private table, and unpacked on first use.

use oxijbig_core::error::{JbigError, Result};
use std::sync::OnceLock;

/// Number of entries in the internal DP table.
pub const DP_TABLE_SIZE: usize = 6912;

/// Size of a DP table as transmitted in a BIE (2 bits per entry).
pub const DP_PRIV_BYTES: usize = 1728;

/// Start of each prediction phase in the internal DP table.
pub const PHASE_OFFSET: [usize; 4] = [0, 256, 768, 2816];

/// Width of the DP index of each phase.
pub const PHASE_BITS: [u32; 4] = [8, 9, 11, 12];

/// T.82 Table 17, one bit per entry, most significant bit first.
static RESOLUTION_BITS: [u8; 512] = [
    0x11, 0x73, 0xff, 0xff, 0x33, 0xff, 0xff, 0xff, 0x01, 0x77, 0xff, 0xff,
    0x37, 0xff, 0xff, 0xff, 0x37, 0xff, 0xff, 0xff, 0x7d, 0xff, 0xff, 0xff,
    0x37, 0xff, 0xff, 0xff, 0xff, 0x7d, 0xff, 0xff, 0x01, 0x37, 0xfd, 0xff,
    0x3f, 0xff, 0xff, 0xff, 0x37, 0x7f, 0xff, 0x7f, 0x7f, 0x7f, 0x7f, 0xff,
    0x35, 0xff, 0xf7, 0xff, 0xdf, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0x01, 0x23, 0x05, 0x3b, 0x11, 0x23, 0x71, 0xff,
    0x01, 0x75, 0x3b, 0x7f, 0x00, 0x53, 0xfe, 0xff, 0x01, 0x41, 0x7f, 0xff,
    0x09, 0xb7, 0xff, 0xff, 0x00, 0x53, 0x7f, 0xfb, 0x93, 0x79, 0xff, 0xff,
    0x01, 0x00, 0x73, 0xff, 0x31, 0x13, 0x75, 0xff, 0x00, 0x41, 0xb7, 0xee,
    0x01, 0x21, 0xfc, 0xff, 0x00, 0x93, 0x75, 0xff, 0x11, 0x6b, 0xf5, 0xff,
    0xe9, 0xf7, 0xff, 0xfb, 0xb7, 0xff, 0xfb, 0xff, 0x01, 0x23, 0x01, 0x3f,
    0x11, 0x01, 0x77, 0xff, 0x01, 0x75, 0x6b, 0x7f, 0x00, 0x53, 0xfe, 0xff,
    0x01, 0x61, 0x7f, 0xff, 0x29, 0x37, 0xff, 0xff, 0x00, 0x73, 0x3f, 0x7b,
    0x92, 0x7d, 0xff, 0xff, 0x01, 0x00, 0x7b, 0xfe, 0x2f, 0x1b, 0x7f, 0xff,
    0x00, 0x41, 0x37, 0xfe, 0x09, 0x37, 0x7e, 0x7f, 0x00, 0xd2, 0x7f, 0xff,
    0x1b, 0x6f, 0xff, 0xff, 0x00, 0x75, 0x7f, 0x77, 0x27, 0x7f, 0x7b, 0x7f,
    0x01, 0x03, 0x01, 0x09, 0x11, 0x01, 0x41, 0x93, 0x01, 0x75, 0x21, 0x55,
    0x00, 0x51, 0x80, 0xf7, 0x01, 0x41, 0x6b, 0x13, 0x01, 0x00, 0xfb, 0xff,
    0x00, 0x51, 0x01, 0x73, 0x00, 0x41, 0xb7, 0xff, 0x01, 0x00, 0x61, 0x81,
    0x27, 0x09, 0x1e, 0xbf, 0x00, 0x40, 0x01, 0x56, 0x08, 0x00, 0x10, 0x7f,
    0x00, 0x80, 0x21, 0x77, 0x03, 0x01, 0x3f, 0xff, 0x68, 0xd0, 0xf3, 0xb3,
    0x00, 0xd3, 0xfb, 0xff, 0x01, 0x03, 0x37, 0xff, 0x33, 0x37, 0x7f, 0xff,
    0x01, 0x77, 0x7f, 0xff, 0x11, 0x7b, 0xff, 0xff, 0x01, 0xf7, 0x7f, 0xff,
    0x3f, 0xff, 0xfd, 0xff, 0x12, 0xf7, 0xff, 0xff, 0xff, 0xfd, 0xff, 0x7f,
    0x01, 0x12, 0x7d, 0xff, 0x3f, 0x7f, 0xff, 0xff, 0x00, 0x62, 0xff, 0x7f,
    0x3f, 0x3f, 0x7f, 0xff, 0x10, 0xff, 0xf7, 0xff, 0x7f, 0xff, 0x7f, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01, 0x23, 0x01, 0x1b,
    0x11, 0x23, 0x77, 0xff, 0x01, 0x75, 0x2b, 0x77, 0x00, 0x41, 0xbe, 0xff,
    0x01, 0xc1, 0x5b, 0x7f, 0x09, 0x33, 0x7d, 0xff, 0x00, 0x51, 0x37, 0xfb,
    0xa9, 0xb1, 0xff, 0xff, 0x01, 0x00, 0x71, 0xb7, 0x21, 0x03, 0x75, 0xff,
    0x00, 0x40, 0x17, 0x6f, 0x00, 0x01, 0x7d, 0xff, 0x00, 0xc1, 0x75, 0xff,
    0x01, 0xab, 0x51, 0xff, 0xe8, 0xd3, 0xff, 0xfb, 0xbb, 0xff, 0xfb, 0xff,
    0x01, 0x23, 0x01, 0x1b, 0x31, 0x01, 0x53, 0x7f, 0x01, 0x75, 0x29, 0x7f,
    0x00, 0x51, 0xb6, 0xff, 0x01, 0xe0, 0x7b, 0xff, 0x0a, 0x3b, 0x7f, 0xff,
    0x00, 0x71, 0x7f, 0xfb, 0x88, 0x75, 0xff, 0x7f, 0x01, 0x00, 0x61, 0xf6,
    0x3f, 0x09, 0x7f, 0xff, 0x00, 0x40, 0x17, 0x7f, 0x08, 0x13, 0x7e, 0x7f,
    0x00, 0x80, 0x77, 0xff, 0x2b, 0x2f, 0x7f, 0x7f, 0x00, 0x71, 0x7f, 0x77,
    0x2b, 0x7f, 0x3b, 0x7f, 0x01, 0x03, 0x01, 0x09, 0x11, 0x01, 0x41, 0x01,
    0x01, 0x75, 0x21, 0x55, 0x00, 0x51, 0x80, 0x53, 0x01, 0x41, 0x49, 0x01,
    0x09, 0x00, 0x01, 0x13, 0x00, 0x51, 0x00, 0x53, 0x80, 0x41, 0x13, 0x7f,
    0x01, 0x00, 0x61, 0x80, 0x21, 0x01, 0x01, 0x13, 0x00, 0x40, 0x00, 0x40,
    0x00, 0x00, 0x00, 0x13, 0x00, 0x80, 0x00, 0x13, 0x01, 0x01, 0x51, 0x7f,
    0x00, 0x50, 0x00, 0x73, 0x01, 0x54, 0x31, 0x77,
];

/// Resolution reduction table.
///
/// Index bits: `b0..b2` are the pixels `2x+1, 2x, 2x-1` of line `2y+1`,
/// `b3..b5` the same columns of line `2y`, `b6..b8` of line `2y-1`;
/// `b9 = L(x-1, y)`, `b10 = L(x, y-1)`, `b11 = L(x-1, y-1)`.
pub static RESOLUTION_TABLE: [u8; 4096] = {
    let mut table = [0u8; 4096];
    let mut i = 0usize;
    while i < 4096 {
        table[i] = (RESOLUTION_BITS[i >> 3] >> (7 - (i & 7))) & 1;
        i += 1;
    }
    table
};

/// The default DP table of T.82 in transmitted order.
pub static DEFAULT_DP_TABLE: [u8; DP_PRIV_BYTES] = [
    0x2a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0x0a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0xaa, 0xaa,
    0x0a, 0xaa, 0xaa, 0xaa, 0x22, 0x2a, 0xaa, 0xaa, 0x22, 0xaa, 0xaa, 0xaa,
    0x0a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa9, 0x22, 0x0a, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa0, 0x00,
    0x2a, 0xaa, 0xaa, 0xaa, 0x0a, 0xaa, 0xa5, 0x55, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0x95, 0x55, 0x2a, 0xaa, 0xa5, 0x55, 0xaa, 0xaa, 0xa5, 0xa9,
    0x2a, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0xaa, 0xaa, 0x0a, 0xaa, 0xaa, 0xa0,
    0x8a, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0xa5, 0x55, 0xaa, 0xaa, 0xaa, 0x92,
    0x5a, 0xaa, 0xaa, 0xa6, 0xaa, 0x0a, 0xaa, 0xa6, 0x8a, 0xaa, 0xaa, 0xaa,
    0x0a, 0x2a, 0xaa, 0xaa, 0x80, 0x2a, 0xaa, 0xaa, 0x00, 0x0a, 0xaa, 0xa9,
    0x8a, 0xaa, 0xaa, 0xaa, 0x5a, 0xaa, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xa9,
    0xaa, 0x5a, 0xaa, 0xa9, 0x82, 0x0a, 0xaa, 0xaa, 0xa0, 0x0a, 0xaa, 0xaa,
    0x88, 0x82, 0xaa, 0xaa, 0x8a, 0x02, 0xaa, 0xaa, 0xa0, 0x0a, 0xaa, 0xaa,
    0x0a, 0x0a, 0xaa, 0xa9, 0x99, 0xa2, 0xaa, 0xaa, 0xaa, 0x02, 0xaa, 0xaa,
    0xaa, 0xaa, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0x6a, 0xaa,
    0x2a, 0xaa, 0x5a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0x6a, 0xaa,
    0x2a, 0xaa, 0x5a, 0xaa, 0xaa, 0x5a, 0xaa, 0xaa, 0x08, 0xaa, 0x55, 0x55,
    0x08, 0x2a, 0x55, 0x55, 0x0a, 0xaa, 0x96, 0xaa, 0x4a, 0xaa, 0xa5, 0x6a,
    0x2a, 0xaa, 0x5a, 0xaa, 0x0a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xa8, 0xa8,
    0xaa, 0x0a, 0xa5, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0x82, 0x0a, 0xaa, 0xaa,
    0x80, 0x2a, 0xaa, 0xa8, 0xa0, 0x0a, 0xaa, 0xa6, 0x8a, 0x2a, 0xa9, 0x55,
    0xa2, 0x2a, 0xa5, 0x9a, 0xa0, 0x0a, 0xa6, 0x9a, 0xa0, 0xaa, 0xaa, 0xaa,
    0x82, 0x0a, 0xaa, 0xa0, 0xa0, 0x0a, 0xaa, 0xa6, 0xa8, 0x8a, 0xaa, 0xaa,
    0x88, 0xa2, 0xaa, 0xa6, 0xa8, 0x8a, 0xaa, 0xa0, 0x00, 0x8a, 0xaa, 0xa6,
    0xaa, 0xa2, 0xaa, 0xa9, 0xa0, 0xa8, 0xa9, 0xa9, 0x2a, 0xaa, 0xa5, 0x5a,
    0x2a, 0xaa, 0x5a, 0xaa, 0xa9, 0x9a, 0xaa, 0x00, 0xa6, 0x9a, 0xa8, 0x80,
    0x00, 0x00, 0xaa, 0xaa, 0x2a, 0xaa, 0xa0, 0x00, 0xa0, 0xaa, 0xaa, 0xaa,
    0xa0, 0x96, 0xaa, 0xaa, 0x8a, 0xaa, 0x9a, 0x5a, 0x8a, 0xaa, 0xa6, 0x6a,
    0xa0, 0x0a, 0xa5, 0x9a, 0x2a, 0xaa, 0xa9, 0xaa, 0x8a, 0xaa, 0xaa, 0x8a,
    0x02, 0xaa, 0x95, 0x6a, 0x20, 0x0a, 0xaa, 0xa0, 0xa0, 0xa6, 0xaa, 0xaa,
    0xa2, 0x2a, 0xa5, 0x5a, 0xaa, 0x8a, 0xaa, 0xa0, 0xaa, 0x8a, 0xaa, 0xa6,
    0xaa, 0xa2, 0xaa, 0xa9, 0xa0, 0x0a, 0xaa, 0xaa, 0x08, 0x6a, 0xaa, 0xa8,
    0xa2, 0xa2, 0xaa, 0xaa, 0xa0, 0xa0, 0xaa, 0xaa, 0xa8, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xa9, 0xa8, 0xa8, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xa0, 0xa2, 0xaa, 0xa9, 0x88, 0xa8, 0xaa, 0xaa,
    0xa0, 0xa8, 0xaa, 0xaa, 0xaa, 0xaa, 0x55, 0x55, 0xaa, 0xaa, 0x55, 0x55,
    0x2a, 0xaa, 0x95, 0x55, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x55, 0x55,
    0x2a, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa, 0x82,
    0x0a, 0xaa, 0x55, 0x55, 0xaa, 0xa2, 0xaa, 0x59, 0x6a, 0xaa, 0xaa, 0xa6,
    0xa0, 0xa2, 0xaa, 0x55, 0x2a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xa8, 0x62,
    0xaa, 0x2a, 0xa4, 0x6a, 0xa0, 0x0a, 0xaa, 0xa9, 0x8a, 0xaa, 0xa5, 0x95,
    0x52, 0x2a, 0xa9, 0x55, 0xa8, 0x82, 0xaa, 0xaa, 0x08, 0xaa, 0xaa, 0xa6,
    0xa2, 0x0a, 0xaa, 0xa5, 0xa0, 0x0a, 0xaa, 0xa6, 0xaa, 0x8a, 0xaa, 0xa6,
    0xaa, 0xa2, 0xaa, 0xa6, 0xa0, 0x8a, 0xa9, 0x65, 0xaa, 0xa6, 0xaa, 0xa9,
    0x9a, 0x92, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0x99, 0xa6, 0x5a, 0xaa, 0xaa,
    0xa5, 0x5a, 0xaa, 0x2a, 0xaa, 0xa0, 0xaa, 0xa9, 0xa0, 0x02, 0xaa, 0xa9,
    0x00, 0x00, 0x55, 0x55, 0x2a, 0xaa, 0x9a, 0xaa, 0x8a, 0xaa, 0xa6, 0x55,
    0xaa, 0x2a, 0xa6, 0x5a, 0x0a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x96, 0x6a,
    0x82, 0x2a, 0xa5, 0x55, 0xaa, 0x0a, 0xa9, 0x9a, 0x8a, 0x0a, 0xa5, 0x55,
    0xa2, 0x0a, 0xaa, 0x59, 0xa0, 0x0a, 0xaa, 0x9a, 0xaa, 0x0a, 0xaa, 0xa5,
    0x82, 0x2a, 0xa5, 0x55, 0xa0, 0xaa, 0xa9, 0x5a, 0x56, 0xaa, 0xaa, 0x95,
    0xaa, 0xa2, 0xaa, 0xa4, 0xa8, 0x0a, 0xaa, 0xaa, 0xa6, 0x8a, 0xaa, 0xa6,
    0xaa, 0xa2, 0xaa, 0xa5, 0xaa, 0xa0, 0xaa, 0xa9, 0xaa, 0x8a, 0xaa, 0xaa,
    0xa6, 0x6a, 0xaa, 0xaa, 0xa0, 0x00, 0xaa, 0xa5, 0xa0, 0x00, 0xaa, 0xa5,
    0xaa, 0xa2, 0xaa, 0xa5, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xa8, 0xaa, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa0, 0xaa, 0xa9, 0xaa, 0xa8, 0xaa, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa8, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0xa5, 0x59, 0xa0, 0x08, 0xaa, 0x5a, 0xaa, 0x0a,
    0xaa, 0xaa, 0xaa, 0xaa, 0x80, 0x00, 0x95, 0x55, 0x80, 0x00, 0x95, 0x55,
    0xa0, 0x0a, 0xa5, 0x5a, 0x82, 0xaa, 0x96, 0xaa, 0xaa, 0x6a, 0xaa, 0x2a,
    0xa8, 0x2a, 0xa9, 0x6a, 0xa0, 0xaa, 0xa5, 0xaa, 0x80, 0x00, 0x95, 0x55,
    0xa0, 0x0a, 0xa5, 0x5a, 0xa8, 0x8a, 0xa9, 0x9a, 0x88, 0x88, 0x99, 0x99,
    0xa9, 0x95, 0xa8, 0x80, 0x00, 0x8a, 0x55, 0x9a, 0xaa, 0xa6, 0xaa, 0xa2,
    0xa2, 0xaa, 0xa6, 0xaa, 0x2a, 0xaa, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xa2, 0x20, 0xa6, 0x65, 0xa9, 0x65, 0xa8, 0x20, 0x00, 0x00, 0x55, 0x55,
    0x00, 0x00, 0x55, 0x55, 0xa0, 0x00, 0xa5, 0x55, 0xa0, 0xa8, 0xa5, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0x6a, 0xaa, 0x2a,
    0x22, 0x1a, 0x66, 0x4a, 0x80, 0x00, 0x95, 0x55, 0x2a, 0xaa, 0x6a, 0xaa,
    0x20, 0x10, 0x65, 0x45, 0xa0, 0xa8, 0xa5, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0x95, 0xaa, 0x80, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xa2, 0xaa, 0xa6,
    0xa0, 0x00, 0xa5, 0x55, 0x08, 0x80, 0x59, 0x95, 0xa2, 0xa0, 0xa6, 0xa5,
    0xa0, 0xa4, 0xa5, 0xa1, 0xa8, 0xa6, 0xa9, 0xa2, 0xaa, 0xa6, 0xaa, 0xa2,
    0xaa, 0xaa, 0xaa, 0xaa, 0xa8, 0xa8, 0xa9, 0xa9, 0xaa, 0xa8, 0xaa, 0xa9,
    0xa0, 0xa2, 0xa5, 0xa6, 0x88, 0xa8, 0x99, 0xa9, 0xa0, 0xa8, 0xa5, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0x6a, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x2a, 0xaa, 0x6a, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0xaa, 0x56, 0xaa, 0x02, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xa5, 0x59, 0xa0, 0x08, 0xa5, 0xaa, 0xa0, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0xa5, 0xa6, 0xa0, 0xa2, 0xa9, 0x9a, 0xa8, 0x8a,
    0xa1, 0x1a, 0xa4, 0x4a, 0x8a, 0x2a, 0x9a, 0x6a, 0xa6, 0xaa, 0xa2, 0xaa,
    0xa9, 0x95, 0xa8, 0x80, 0x08, 0x0a, 0x59, 0x5a, 0xa5, 0x5a, 0xa0, 0x0a,
    0xa0, 0x0a, 0xa5, 0x5a, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xa2, 0x8a, 0xa6, 0x9a, 0xaa, 0x0a, 0xaa, 0x5a, 0xaa, 0xa6, 0xaa, 0xa2,
    0xaa, 0x2a, 0xaa, 0x6a, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xa5, 0x56, 0xa0, 0x02, 0xaa, 0xaa, 0xaa, 0xaa,
    0x2a, 0xaa, 0x6a, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0x00, 0x00, 0x55, 0x55, 0xaa, 0xaa, 0xaa, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa,
    0xa2, 0x2a, 0xa6, 0x6a, 0x8a, 0xaa, 0x9a, 0xaa, 0xa5, 0xa6, 0xa0, 0xa2,
    0xa1, 0x2a, 0xa4, 0x6a, 0xaa, 0x5a, 0xaa, 0x0a, 0x9a, 0xaa, 0x8a, 0xaa,
    0xa2, 0xaa, 0xa6, 0xaa, 0xa8, 0x6a, 0xa9, 0x2a, 0xaa, 0xa8, 0xaa, 0xa9,
    0xa9, 0x55, 0xa8, 0x00, 0xa8, 0x8a, 0xa9, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0x80, 0xaa, 0x95, 0xaa, 0xa2, 0xaa, 0xa6,
    0xa5, 0x5a, 0xa0, 0x0a, 0xa0, 0x5a, 0xa5, 0x0a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa8, 0xaa, 0xa9, 0x2a, 0xaa, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0x56, 0xaa, 0x02,
    0xa2, 0x00, 0xa6, 0x55, 0xa6, 0x95, 0xa2, 0x80, 0xa6, 0xaa, 0xa2, 0xaa,
    0x21, 0x2a, 0x64, 0x6a, 0x8a, 0xaa, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xa2, 0x1a, 0xa6, 0x4a, 0xa5, 0xaa, 0xa0, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xa9, 0xa5, 0xa8, 0xa0, 0xaa, 0x86, 0xaa, 0x92, 0xaa, 0xa6, 0xaa, 0xa2,
    0xa5, 0x95, 0xa0, 0x80, 0xa8, 0x8a, 0xa9, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xa2, 0xaa, 0xa6,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x88, 0xaa, 0x99, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa,
    0xa5, 0x5a, 0xa0, 0x0a, 0x8a, 0xaa, 0x9a, 0xaa, 0xa5, 0xaa, 0xa0, 0xaa,
    0xa2, 0x2a, 0xa6, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0x9a, 0xaa, 0x8a, 0xaa,
    0xaa, 0x00, 0xaa, 0x55, 0xaa, 0x80, 0xaa, 0x95, 0xaa, 0x5a, 0xaa, 0x0a,
    0xa2, 0x2a, 0xa6, 0x6a, 0xaa, 0xaa, 0xaa, 0xaa, 0xa5, 0x5a, 0xa0, 0x0a,
    0xa0, 0x20, 0xa5, 0x65, 0xa8, 0x6a, 0xa9, 0x2a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa0, 0xaa, 0xa5, 0xa8, 0x8a, 0xa9, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xa0, 0xaa, 0xa5,
    0xaa, 0x52, 0xaa, 0x06, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xa8, 0xaa, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xa8, 0xaa, 0xa9,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x00, 0x00, 0x55, 0x55,
    0x00, 0x00, 0x55, 0x55, 0x80, 0x00, 0x95, 0x55, 0x2a, 0xaa, 0x6a, 0xaa,
    0x00, 0x00, 0x55, 0x55, 0xaa, 0xaa, 0xaa, 0xaa, 0x9a, 0xaa, 0x8a, 0xaa,
    0xaa, 0x2a, 0xaa, 0x6a, 0xa0, 0x00, 0xa5, 0x55, 0xaa, 0x08, 0xaa, 0x59,
    0x21, 0x00, 0x64, 0x55, 0xaa, 0x08, 0xaa, 0x59, 0x8a, 0xaa, 0x9a, 0xaa,
    0xa2, 0x2a, 0xa6, 0x6a, 0xa6, 0x8a, 0xa2, 0x9a, 0xaa, 0xa8, 0xaa, 0xa9,
    0xa0, 0x00, 0xa5, 0x55, 0x08, 0x80, 0x59, 0x95, 0xaa, 0xa8, 0xaa, 0xa9,
    0xaa, 0x02, 0xaa, 0x56, 0xa8, 0xa0, 0xa9, 0xa5, 0xaa, 0xa2, 0xaa, 0xa6,
    0xaa, 0xa2, 0xaa, 0xa6, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x20, 0xaa, 0x65,
    0xaa, 0x04, 0xaa, 0x51, 0x8a, 0x88, 0x9a, 0x99, 0xaa, 0x08, 0xaa, 0x59,
    0xa5, 0x5a, 0xa0, 0x0a, 0xa5, 0x8a, 0xa0, 0x9a, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa, 0x9a, 0xaa, 0x8a, 0xaa,
    0xa2, 0x00, 0xa6, 0x55, 0xa6, 0x8a, 0xa2, 0x9a, 0xa0, 0x00, 0xa5, 0x55,
    0x92, 0x2a, 0x86, 0x6a, 0xa8, 0x80, 0xa9, 0x95, 0xa0, 0xaa, 0xa5, 0xaa,
    0xa0, 0xa0, 0xa5, 0xa5, 0xa8, 0xa0, 0xa9, 0xa5, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa0, 0xaa, 0xa5, 0xa8, 0x80, 0xa9, 0x95, 0xaa, 0x0a, 0xaa, 0x5a,
    0x00, 0x00, 0x55, 0x55, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa0, 0xaa, 0xa5,
    0xa5, 0xa2, 0xa0, 0xa6, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xa0, 0xaa, 0xa5, 0xa6, 0x66, 0xa2, 0x22, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xa8, 0xaa, 0xa9, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
    0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
];

/// The default DP table in internal index order.
///
/// Unpacked on first use and cached.
pub fn default_dp_table() -> &'static [u8] {
    static TABLE: OnceLock<Vec<u8>> = OnceLock::new();
    TABLE.get_or_init(|| unpack_dp(&DEFAULT_DP_TABLE))
}

// ============================================================================
// Transmitted table layout
// ============================================================================

/// Bit permutation between internal and transmitted DP indices.
const DP_TRANS: [&[u32]; 4] = [
    &[1, 0, 3, 2, 7, 6, 5, 4],
    &[1, 0, 3, 2, 8, 7, 6, 5, 4],
    &[1, 0, 3, 2, 10, 9, 8, 7, 6, 5, 4],
    &[1, 0, 3, 2, 11, 10, 9, 8, 7, 6, 5, 4],
];

/// Visit every `(transmitted index, internal index)` pair.
fn for_each_dp_index(mut f: impl FnMut(usize, usize)) {
    for (phase, trans) in DP_TRANS.iter().enumerate() {
        let offset = PHASE_OFFSET[phase];
        for i in 0..(1usize << trans.len()) {
            let k = trans
                .iter()
                .enumerate()
                .fold(0usize, |k, (j, &t)| k | (((i >> j) & 1) << t));
            f(i + offset, k + offset);
        }
    }
}

/// Pack an internal DP table into the 1728-byte form written to a BIE.
pub fn dp_to_external(internal: &[u8]) -> Vec<u8> {
    let mut external = vec![0u8; DP_PRIV_BYTES];
    for_each_dp_index(|i, k| {
        external[i >> 2] |= (internal[k] & 3) << ((3 - (i & 3)) << 1);
    });
    external
}

fn unpack_dp(external: &[u8]) -> Vec<u8> {
    let mut internal = vec![0u8; DP_TABLE_SIZE];
    for_each_dp_index(|i, k| {
        internal[k] = (external[i >> 2] >> ((3 - (i & 3)) << 1)) & 3;
    });
    internal
}

/// Unpack a transmitted DP table into internal index order.
pub fn dp_from_external(external: &[u8]) -> Result<Vec<u8>> {
    if external.len() != DP_PRIV_BYTES {
        return Err(JbigError::invalid_parameter(format!(
            "DP table must be {DP_PRIV_BYTES} bytes, got {}",
            external.len()
        )));
    }
    Ok(unpack_dp(external))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Position of the high-resolution pixel `(2x + dx, 2y + dy)` in a
    /// reduction table index.
    #[inline]
    const fn window_bit(dx: i32, dy: i32) -> u32 {
        ((1 - dy) * 3 + (1 - dx)) as u32
    }

    /// High-resolution pixels in the DP index of each phase as
    /// `(index bit, dx, dy)` relative to `(2x, 2y)`.
    const DP_LAYOUT: [&[(u32, i32, i32)]; 4] = [
        &[(4, -1, 0), (5, 1, -1), (6, 0, -1), (7, -1, -1)],
        &[(4, 0, 0), (5, -1, 0), (6, 1, -1), (7, 0, -1), (8, -1, -1)],
        &[
            (4, -1, 1),
            (5, 1, 0),
            (6, 0, 0),
            (7, -1, 0),
            (8, 1, -1),
            (9, 0, -1),
            (10, -1, -1),
        ],
        &[
            (4, 0, 1),
            (5, -1, 1),
            (6, 1, 0),
            (7, 0, 0),
            (8, -1, 0),
            (9, 1, -1),
            (10, 0, -1),
            (11, -1, -1),
        ],
    ];

    /// The pixel predicted in each phase, relative to `(2x, 2y)`.
    const DP_TARGET: [(i32, i32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

    fn derive_dp_table() -> Vec<u8> {
        let mut table = vec![2u8; DP_TABLE_SIZE];

        for (phase, layout) in DP_LAYOUT.iter().enumerate() {
            let (tx, ty) = DP_TARGET[phase];
            let target = window_bit(tx, ty);
            let known = layout
                .iter()
                .fold(0u32, |mask, &(_, dx, dy)| mask | (1 << window_bit(dx, dy)));
            let free: Vec<u32> = (0..9)
                .filter(|&b| b != target && known & (1 << b) == 0)
                .collect();

            for index in 0..(1usize << PHASE_BITS[phase]) {
                let mut window = layout.iter().fold(0usize, |w, &(b, dx, dy)| {
                    w | (((index >> b) & 1) << window_bit(dx, dy))
                });
                // L(x-1,y), L(x,y-1), L(x-1,y-1)
                window |= ((index >> 3) & 1) << 9 | (index & 1) << 10 | ((index >> 1) & 1) << 11;
                let wanted = ((index >> 2) & 1) as u8;

                let mut possible = [false; 2];
                for (value, seen) in possible.iter_mut().enumerate() {
                    let base = window | (value << target);
                    *seen = (0..(1usize << free.len())).any(|m| {
                        let completed = free
                            .iter()
                            .enumerate()
                            .fold(base, |w, (k, &b)| w | (((m >> k) & 1) << b));
                        RESOLUTION_TABLE[completed] == wanted
                    });
                }

                table[PHASE_OFFSET[phase] + index] = match possible {
                    [true, false] => 0,
                    [false, true] => 1,
                    _ => 2,
                };
            }
        }
        table
    }

    #[test]
    fn test_resolution_table_samples() {
        assert_eq!(RESOLUTION_TABLE[0], 0);
        // full 3x3 block
        assert_eq!(RESOLUTION_TABLE[0x1ff], 1);
        // an isolated centre pixel survives
        assert_eq!(RESOLUTION_TABLE[1 << 4], 1);
        // so does a one pixel line on the lower high-resolution row
        assert_eq!(RESOLUTION_TABLE[0b111], 1);
        assert_eq!(RESOLUTION_TABLE[0b111 << 6], 1);
        // dark low-resolution neighbours pull the value down
        assert_eq!(RESOLUTION_TABLE[(1 << 4) | (1 << 1) | (1 << 9) | (1 << 10)], 0);
        assert_eq!(RESOLUTION_TABLE.iter().filter(|&&v| v == 1).count(), 2328);
    }

    #[test]
    fn test_dp_table_entries() {
        let dp = default_dp_table();
        assert_eq!(dp.len(), DP_TABLE_SIZE);

        let expected = [
            (0, 0, 0),
            (0, 1, 2),
            (0, 16, 0),
            (0, 191, 1),
            (1, 0, 2),
            (1, 18, 0),
            (2, 4, 1),
            (2, 20, 1),
            (3, 16, 0),
            (3, 20, 1),
        ];
        for (phase, index, value) in expected {
            assert_eq!(dp[PHASE_OFFSET[phase] + index], value, "phase {phase} index {index}");
        }
    }

    #[test]
    fn test_dp_table_phase_counts() {
        let dp = default_dp_table();
        let expected = [(19, 1, 236), (64, 44, 404), (271, 255, 1522), (522, 522, 3052)];
        for (phase, &(zeros, ones, coded)) in expected.iter().enumerate() {
            let start = PHASE_OFFSET[phase];
            let part = &dp[start..start + (1 << PHASE_BITS[phase])];
            let count = |v: u8| part.iter().filter(|&&e| e == v).count();
            assert_eq!((count(0), count(1), count(2)), (zeros, ones, coded), "phase {phase}");
        }
    }

    #[test]
    fn test_dp_table_follows_resolution_table() {
        assert_eq!(default_dp_table(), derive_dp_table().as_slice());
    }

    #[test]
    fn test_dp_table_cached() {
        assert!(std::ptr::eq(default_dp_table(), default_dp_table()));
    }

    #[test]
    fn test_dp_external_layout() {
        let external = dp_to_external(default_dp_table());
        assert_eq!(external.as_slice(), DEFAULT_DP_TABLE.as_slice());
        let back = dp_from_external(&external).expect("valid size");
        assert_eq!(back.as_slice(), default_dp_table());
    }

    #[test]
    fn test_dp_external_permutation() {
        // internal index 1 of phase 0 is transmitted index 2
        let mut internal = vec![2u8; DP_TABLE_SIZE];
        internal[1] = 0;
        let external = dp_to_external(&internal);
        assert_eq!(external[0], 0b1010_0010);
    }

    #[test]
    fn test_dp_external_wrong_size() {
        let err = dp_from_external(&[0; 10]).unwrap_err();
        assert!(matches!(err, JbigError::InvalidParameter { .. }));
    }
}
