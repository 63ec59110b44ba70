//! Resolution reduction.
//!
//! Halves a layer in both directions with the table-driven reduction of
//! [`RESOLUTION_TABLE`]. Each low-resolution pixel depends on the 3x3
//! high-resolution neighbourhood centred on the top-left pixel of its 2x2
//! block and on the three low-resolution pixels already produced to its
//! left and above.
//!
//! The neighbours above follow the same history rules as the stripe coder:
//! at the first line of a stripe they are zero if the stripe starts the
//! image or if every stripe is terminated with SDRST.

use crate::tables::RESOLUTION_TABLE;
use log::trace;
use oxijbig_core::bitmap::{Bitmap, ceil_half};
use oxijbig_core::error::Result;

/// Reduce `hi`, which is layer `layer_hi` of a pyramid with `l0` lines per
/// lowest-layer stripe, to the next lower layer.
pub fn reduce(hi: &Bitmap, l0: u32, layer_hi: u8, sdrst: bool) -> Result<Bitmap> {
    let width = ceil_half(hi.width(), 1);
    let height = ceil_half(hi.height(), 1);
    let mut lo = Bitmap::new(width, height)?;
    let ll = ((l0 << layer_hi) >> 1).max(1);

    trace!(
        "reducing layer {} from {}x{} to {}x{}",
        layer_hi,
        hi.width(),
        hi.height(),
        width,
        height
    );

    for q in 0..height {
        let above = q % ll > 0 || (q > 0 && !sdrst);
        let r0 = 2 * q;
        let r1 = if r0 + 1 < hi.height() { r0 + 1 } else { r0 };

        let h = |x: i64, y: u32| -> usize {
            if x < 0 {
                0
            } else {
                usize::from(hi.get(x as u32, y))
            }
        };
        let mut left = 0usize;
        for x in 0..width {
            let c = 2 * i64::from(x);
            let mut index = h(c + 1, r1)
                | h(c, r1) << 1
                | h(c - 1, r1) << 2
                | h(c + 1, r0) << 3
                | h(c, r0) << 4
                | h(c - 1, r0) << 5
                | left << 9;
            if above {
                index |= h(c + 1, r0 - 1) << 6
                    | h(c, r0 - 1) << 7
                    | h(c - 1, r0 - 1) << 8
                    | usize::from(lo.get(x, q - 1)) << 10;
                if x > 0 {
                    index |= usize::from(lo.get(x - 1, q - 1)) << 11;
                }
            }
            left = usize::from(RESOLUTION_TABLE[index]);
            if left != 0 {
                lo.set(x, q, true);
            }
        }
    }
    Ok(lo)
}
