//! BIE header (BIH) and marker codes.
//!
//! ## BIH layout
//!
//! ```text
//! Offset  Size  Field
//! 0       1     DL       lowest layer in this BIE
//! 1       1     D        highest layer in this BIE
//! 2       1     P        number of bit planes
//! 3       1     -        reserved, 0
//! 4       4     XD       width at layer D (big-endian)
//! 8       4     YD       height at layer D (big-endian)
//! 12      4     L0       lines per stripe at layer 0 (big-endian)
//! 16      1     MX       largest horizontal AT offset
//! 17      1     MY       largest vertical AT offset
//! 18      1     order    HITOLO | SEQ | ILEAVE | SMID
//! 19      1     options  LRLTWO | VLENGTH | TPDON | TPBON | DPON | DPPRIV | DPLAST
//! ```

use crate::config::{Order, Options};
use oxijbig_core::bitmap::ceil_half;
use oxijbig_core::error::{JbigError, Result};

/// Size of the BIH in bytes.
pub const BIH_LEN: usize = 20;

/// Escape byte that starts every marker.
pub const MARKER_ESC: u8 = 0xFF;
/// Escaped literal `0xFF` inside coded data.
pub const MARKER_STUFF: u8 = 0x00;
/// Normal end of a stripe.
pub const MARKER_SDNORM: u8 = 0x02;
/// End of a stripe followed by a coder reset.
pub const MARKER_SDRST: u8 = 0x03;
/// The encoder gave up; the rest of the stream is meaningless.
pub const MARKER_ABORT: u8 = 0x04;
/// Revised image height.
pub const MARKER_NEWLEN: u8 = 0x05;
/// Adaptive template move.
pub const MARKER_ATMOVE: u8 = 0x06;
/// Comment segment.
pub const MARKER_COMMENT: u8 = 0x07;

/// Total size of an ATMOVE segment including the escape.
pub const ATMOVE_LEN: usize = 8;
/// Total size of a NEWLEN segment including the escape.
pub const NEWLEN_LEN: usize = 6;
/// Size of the fixed part of a COMMENT segment including the escape.
pub const COMMENT_HEADER_LEN: usize = 6;

/// Largest supported number of differential layers.
pub const MAX_LAYERS: u8 = 31;

/// Largest horizontal AT offset the format can express.
pub const MAX_MX: u8 = 127;

/// A parsed BIE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bih {
    /// Lowest layer coded in this BIE.
    pub dl: u8,
    /// Highest layer coded in this BIE.
    pub d: u8,
    /// Number of bit planes.
    pub planes: u8,
    /// Width at layer `d`.
    pub xd: u32,
    /// Height at layer `d`.
    pub yd: u32,
    /// Lines per stripe at layer 0.
    pub l0: u32,
    /// Largest horizontal AT offset.
    pub mx: u8,
    /// Largest vertical AT offset.
    pub my: u8,
    /// Output order.
    pub order: Order,
    /// Coding options.
    pub options: Options,
}

impl Bih {
    /// Serialize to the 20-byte wire form.
    pub fn to_bytes(&self) -> [u8; BIH_LEN] {
        let mut out = [0u8; BIH_LEN];
        out[0] = self.dl;
        out[1] = self.d;
        out[2] = self.planes;
        out[4..8].copy_from_slice(&self.xd.to_be_bytes());
        out[8..12].copy_from_slice(&self.yd.to_be_bytes());
        out[12..16].copy_from_slice(&self.l0.to_be_bytes());
        out[16] = self.mx;
        out[17] = self.my;
        out[18] = self.order.bits();
        out[19] = self.options.header_byte();
        out
    }

    /// Parse and validate a BIH.
    ///
    /// Only checks that depend on the header alone are made here; whether a
    /// BIE may continue an earlier one is decided by the decoder.
    pub fn parse(bytes: &[u8; BIH_LEN]) -> Result<Self> {
        let be32 = |at: usize| {
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let bih = Self {
            dl: bytes[0],
            d: bytes[1],
            planes: bytes[2],
            xd: be32(4),
            yd: be32(8),
            l0: be32(12),
            mx: bytes[16],
            my: bytes[17],
            order: Order::from_bits(bytes[18]),
            options: Options::from_bits(u16::from(bytes[19])),
        };

        if bytes[3] != 0 {
            return Err(JbigError::invalid_data("reserved BIH byte is not zero"));
        }
        if bih.order.bits() & 0xf0 != 0 {
            return Err(JbigError::invalid_data(format!(
                "reserved order bits set: {:#04x}",
                bih.order.bits()
            )));
        }
        if bih.options.bits() & 0x80 != 0 {
            return Err(JbigError::invalid_data("reserved option bit set"));
        }
        if bih.xd == 0 || bih.yd == 0 {
            return Err(JbigError::invalid_data(format!(
                "image size {}x{} is empty",
                bih.xd, bih.yd
            )));
        }
        if bih.l0 == 0 {
            return Err(JbigError::invalid_data("L0 is zero"));
        }
        if bih.planes == 0 {
            return Err(JbigError::invalid_data("no bit planes"));
        }
        if bih.mx > MAX_MX {
            return Err(JbigError::invalid_data(format!("MX {} exceeds 127", bih.mx)));
        }
        if bih.dl > bih.d {
            return Err(JbigError::invalid_data(format!(
                "DL {} above D {}",
                bih.dl, bih.d
            )));
        }
        if bih.d > MAX_LAYERS || u64::from(bih.l0) << bih.d > u64::from(u32::MAX) {
            return Err(JbigError::invalid_data(format!(
                "stripe height L0 << D overflows ({} << {})",
                bih.l0, bih.d
            )));
        }
        if bih.order.is_illegal() {
            return Err(JbigError::invalid_data(format!(
                "illegal order {:#04x}",
                bih.order.bits()
            )));
        }
        if bih.my != 0 {
            return Err(JbigError::unimplemented("vertical AT offsets (MY != 0)"));
        }
        if bih.order.contains(Order::HITOLO) && bih.dl != bih.d {
            return Err(JbigError::unimplemented(
                "HITOLO with more than one layer per BIE",
            ));
        }
        Ok(bih)
    }

    /// Number of stripes per layer.
    pub fn stripes(&self) -> u32 {
        stripe_count(self.yd, self.d, self.l0)
    }

    /// Width and height of `layer`.
    pub fn layer_size(&self, layer: u8) -> (u32, u32) {
        let shift = u32::from(self.d - layer);
        (ceil_half(self.xd, shift), ceil_half(self.yd, shift))
    }

    /// Returns true if a private DP table follows this header.
    pub fn has_private_table(&self) -> bool {
        self.options.has_private_table()
    }
}

/// Number of stripes for an image of height `yd` at layer `d`.
pub fn stripe_count(yd: u32, d: u8, l0: u32) -> u32 {
    ceil_half(yd, u32::from(d)).div_ceil(l0)
}
