//! Context templates and prediction lookups.
//!
//! Everything here reads pixels through a [`LayerView`], which applies the
//! history rules of the stripe being coded: lines above the image, and in a
//! reset stripe every line before the stripe, read as zero. The encoder and
//! the decoder call the same functions, so both sides always see the same
//! neighbourhoods.

use crate::tables::PHASE_OFFSET;
use oxijbig_core::bitmap::Bitmap;

/// Context of the TPB flag with the three-line template.
pub const TPB3CX: usize = 0x0e5;
/// Context of the TPB flag with the two-line template.
pub const TPB2CX: usize = 0x195;
/// Context of the TPD flag.
pub const TPDCX: usize = 0xc3f;

/// Read access to one resolution layer under the history rules of a stripe.
#[derive(Debug, Clone, Copy)]
pub struct LayerView<'a> {
    image: &'a Bitmap,
    first_row: i64,
}

impl<'a> LayerView<'a> {
    /// View `image`, treating every line before `first_row` as zero.
    #[inline]
    pub fn new(image: &'a Bitmap, first_row: u32) -> Self {
        Self {
            image,
            first_row: i64::from(first_row),
        }
    }

    /// Pixel at `(x, y)` as 0 or 1; anything outside the visible area is 0.
    #[inline]
    pub fn px(&self, x: i64, y: i64) -> usize {
        if x < 0 || y < self.first_row || y < 0 {
            return 0;
        }
        usize::from(self.image.get(x as u32, y as u32))
    }
}

/// Context of pixel `(x, y)` in the lowest resolution layer.
///
/// `tx` is the current adaptive template offset; 0 keeps the default slot.
pub fn lowest_layer_context(view: &LayerView<'_>, x: u32, y: u32, two_line: bool, tx: u8) -> usize {
    let (x, y) = (i64::from(x), i64::from(y));
    let up = |dx: i64| view.px(x + dx, y - 1);
    let cur = |dx: i64| view.px(x + dx, y);
    let at = |slot: u32, cx: usize| {
        if tx == 0 {
            cx
        } else {
            let t = i64::from(tx);
            let pixel = if x >= t { cur(-t) } else { 0 };
            (cx & !(1usize << slot)) | (pixel << slot)
        }
    };

    if two_line {
        let cx = up(2) << 4
            | up(1) << 5
            | up(0) << 6
            | up(-1) << 7
            | up(-2) << 8
            | up(-3) << 9
            | cur(-1)
            | cur(-2) << 1
            | cur(-3) << 2
            | cur(-4) << 3;
        at(4, cx)
    } else {
        let up2 = |dx: i64| view.px(x + dx, y - 2);
        let cx = up2(1) << 7
            | up2(0) << 8
            | up2(-1) << 9
            | up(2) << 2
            | up(1) << 3
            | up(0) << 4
            | up(-1) << 5
            | up(-2) << 6
            | cur(-1)
            | cur(-2) << 1;
        at(2, cx)
    }
}

/// Low-resolution line used as "the line below" for high-resolution line
/// `i` of a stripe with `ll` low-resolution lines.
///
/// On the last low-resolution line of a stripe or of the image the current
/// line stands in for the one below.
#[inline]
pub fn lowres_below(i: u32, ll: u32, lyc: u32, ly: u32) -> u32 {
    if (i >> 1) >= ll.saturating_sub(1) || lyc + 1 >= ly {
        lyc
    } else {
        lyc + 1
    }
}

/// Context of pixel `(x, y)` in a differential layer.
///
/// `hi` views the layer being coded, `lo` the layer below it, `below` is the
/// low-resolution line chosen by [`lowres_below`]. The four low-resolution
/// pixels form a 2x2 block whose left column is `lx - 1` for even `x` and
/// `lx` for odd `x`.
pub fn differential_context(
    hi: &LayerView<'_>,
    lo: &LayerView<'_>,
    x: u32,
    y: u32,
    tx: u8,
    below: u32,
) -> usize {
    let (lx, ly) = (i64::from(x >> 1), i64::from(y >> 1));
    let (x, y) = (i64::from(x), i64::from(y));
    let below = i64::from(below);

    let slot = if tx == 0 {
        hi.px(x - 1, y - 1)
    } else {
        let t = i64::from(tx);
        if x >= t { hi.px(x - t, y) } else { 0 }
    };
    let right = lx + (x & 1);

    hi.px(x - 1, y)
        | hi.px(x - 2, y) << 1
        | hi.px(x + 1, y - 1) << 2
        | hi.px(x, y - 1) << 3
        | slot << 4
        | hi.px(x, y - 2) << 5
        | lo.px(right, ly) << 6
        | lo.px(right - 1, ly) << 7
        | lo.px(right, below) << 8
        | lo.px(right - 1, below) << 9
        | ((x & 1) as usize) << 10
        | ((y & 1) as usize) << 11
}

/// Index into the internal DP table for pixel `(x, y)`.
pub fn dp_index(hi: &LayerView<'_>, lo: &LayerView<'_>, x: u32, y: u32) -> usize {
    let (lx, ly) = (i64::from(x >> 1), i64::from(y >> 1));
    let (x0, y0) = (lx * 2, ly * 2);
    let h = |dx: i64, dy: i64| hi.px(x0 + dx, y0 + dy);

    let low = lo.px(lx, ly - 1)
        | lo.px(lx - 1, ly - 1) << 1
        | lo.px(lx, ly) << 2
        | lo.px(lx - 1, ly) << 3;

    let phase = ((y & 1) << 1 | (x & 1)) as usize;
    let high = match phase {
        0 => h(-1, 0) << 4 | h(1, -1) << 5 | h(0, -1) << 6 | h(-1, -1) << 7,
        1 => h(0, 0) << 4 | h(-1, 0) << 5 | h(1, -1) << 6 | h(0, -1) << 7 | h(-1, -1) << 8,
        2 => {
            h(-1, 1) << 4
                | h(1, 0) << 5
                | h(0, 0) << 6
                | h(-1, 0) << 7
                | h(1, -1) << 8
                | h(0, -1) << 9
                | h(-1, -1) << 10
        }
        _ => {
            h(0, 1) << 4
                | h(-1, 1) << 5
                | h(1, 0) << 6
                | h(0, 0) << 7
                | h(-1, 0) << 8
                | h(1, -1) << 9
                | h(0, -1) << 10
                | h(-1, -1) << 11
        }
    };
    PHASE_OFFSET[phase] + (low | high)
}

/// Value of the 3x3 low-resolution neighbourhood of `(lx, ly)` if it is
/// uniform, using `below` as the line under `ly`.
pub fn uniform_neighbourhood(lo: &LayerView<'_>, lx: u32, ly: u32, below: u32) -> Option<u8> {
    let (lx, ly) = (i64::from(lx), i64::from(ly));
    let value = lo.px(lx, ly);
    let rows = [ly - 1, ly, i64::from(below)];
    let uniform = rows
        .iter()
        .all(|&r| (lx - 1..=lx + 1).all(|c| lo.px(c, r) == value));
    uniform.then_some(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(rows: &[&str]) -> Bitmap {
        let width = rows[0].len() as u32;
        Bitmap::from_fn(width, rows.len() as u32, |x, y| {
            rows[y as usize].as_bytes()[x as usize] == b'#'
        })
        .expect("alloc")
    }

    #[test]
    fn test_three_line_context() {
        let image = bitmap(&["#.#.#.", ".####.", "##.#.."]);
        let view = LayerView::new(&image, 0);
        // pixel (2, 2): line 0 cols 1..3 = . # . ; line 1 cols 0..4 = . # # # # ; line 2 cols 0..1 = # #
        let cx = lowest_layer_context(&view, 2, 2, false, 0);
        let expected = 0b010 << 7 | 0b01111 << 2 | 0b11;
        assert_eq!(cx, expected);
    }

    #[test]
    fn test_history_masks_rows() {
        let image = bitmap(&["######", "......", "......"]);
        let full = LayerView::new(&image, 0);
        let reset = LayerView::new(&image, 1);
        assert_ne!(lowest_layer_context(&full, 2, 1, false, 0), 0);
        assert_eq!(lowest_layer_context(&reset, 2, 1, false, 0), 0);
    }

    #[test]
    fn test_adaptive_template_slot() {
        let image = bitmap(&["......", "#....."]);
        let view = LayerView::new(&image, 0);
        assert_eq!(lowest_layer_context(&view, 4, 1, false, 4), 0x04);
        // the two-line template also sees x-4 in its own slot
        assert_eq!(lowest_layer_context(&view, 4, 1, true, 4), 0x18);
        // offset reaching left of the image reads zero
        assert_eq!(lowest_layer_context(&view, 3, 1, false, 4), 0);
    }

    #[test]
    fn test_two_line_context() {
        let image = bitmap(&["#######", "####..."]);
        let view = LayerView::new(&image, 0);
        assert_eq!(lowest_layer_context(&view, 4, 1, true, 0), 0x3ff);
    }

    #[test]
    fn test_differential_context_phase_bits() {
        let hi = Bitmap::new(8, 8).expect("alloc");
        let lo = Bitmap::new(4, 4).expect("alloc");
        let (hv, lv) = (LayerView::new(&hi, 0), LayerView::new(&lo, 0));
        assert_eq!(differential_context(&hv, &lv, 3, 2, 0, 2), 1 << 10);
        assert_eq!(differential_context(&hv, &lv, 2, 3, 0, 2), 1 << 11);
    }

    #[test]
    fn test_differential_context_layout() {
        let hi = bitmap(&["#..#.##.", ".##..#.#", "##.#..#.", "..###.#."]);
        let lo = bitmap(&["#.#.", ".##."]);
        let (hv, lv) = (LayerView::new(&hi, 0), LayerView::new(&lo, 0));
        // even column: low-resolution block spans lx - 1 ..= lx
        assert_eq!(differential_context(&hv, &lv, 4, 2, 0, 1), 0x3c5);
        assert_eq!(differential_context(&hv, &lv, 6, 2, 0, 1), 0x2b4);
        // odd column: block spans lx ..= lx + 1
        assert_eq!(differential_context(&hv, &lv, 5, 2, 0, 1), 0x6aa);
        assert_eq!(differential_context(&hv, &lv, 3, 3, 0, 1), 0xfc9);
        assert_eq!(differential_context(&hv, &lv, 4, 3, 0, 1), 0xbd3);
    }

    #[test]
    fn test_differential_adaptive_slot() {
        let hi = bitmap(&["#..#.##.", ".##..#.#", "##.#..#.", "..###.#."]);
        let lo = bitmap(&["#.#.", ".##."]);
        let (hv, lv) = (LayerView::new(&hi, 0), LayerView::new(&lo, 0));
        // offset 3 replaces the (x - 1, y - 1) pixel with (x - 3, y)
        assert_eq!(differential_context(&hv, &lv, 4, 2, 3, 1), 0x3d5);
        assert_eq!(differential_context(&hv, &lv, 4, 3, 3, 1), 0xbc3);
    }

    #[test]
    fn test_dp_index_offsets() {
        let hi = Bitmap::new(8, 8).expect("alloc");
        let lo = Bitmap::from_fn(4, 4, |_, _| true).expect("alloc");
        let (hv, lv) = (LayerView::new(&hi, 0), LayerView::new(&lo, 0));
        assert_eq!(dp_index(&hv, &lv, 2, 2), 0b1111);
        assert_eq!(dp_index(&hv, &lv, 3, 2), 256 + 0b1111);
        assert_eq!(dp_index(&hv, &lv, 2, 3), 768 + 0b1111);
        assert_eq!(dp_index(&hv, &lv, 3, 3), 2816 + 0b1111);
    }

    #[test]
    fn test_uniform_neighbourhood() {
        let lo = bitmap(&["###.", "###.", "###."]);
        let view = LayerView::new(&lo, 0);
        assert_eq!(uniform_neighbourhood(&view, 1, 1, 2), Some(1));
        assert_eq!(uniform_neighbourhood(&view, 2, 1, 2), None);
        // line above the image reads as zero
        assert_eq!(uniform_neighbourhood(&view, 1, 0, 1), None);
    }

    #[test]
    fn test_lowres_below() {
        // stripe of 4 low-resolution lines, image of 10
        assert_eq!(lowres_below(0, 4, 4, 10), 5);
        assert_eq!(lowres_below(6, 4, 7, 10), 7);
        assert_eq!(lowres_below(2, 4, 9, 10), 9);
    }
}
