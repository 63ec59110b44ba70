//! Stripe coding.
//!
//! A stripe is a band of `L0 << layer` lines of one layer of one plane. Its
//! coded form (an SDE) is the arithmetic-coded pixel data, followed by an
//! SDNORM or SDRST marker, optionally with ATMOVE segments announcing a
//! change of the adaptive template.
//!
//! The encoder codes a whole stripe in one go. The decoder keeps an explicit
//! cursor (line, column, typical-prediction state) so that it can stop
//! whenever the buffered data runs out and continue later; template windows
//! are rebuilt from the pixels decoded so far.

use crate::arith::{ArithDecoder, ArithEncoder, ArithStatus};
use crate::config::Options;
use crate::header::{ATMOVE_LEN, MARKER_ATMOVE, MARKER_ESC, MARKER_SDNORM, MARKER_SDRST, MARKER_STUFF};
use crate::pyramid::SdeKey;
use crate::template::{
    LayerView, TPB2CX, TPB3CX, TPDCX, differential_context, dp_index, lowest_layer_context,
    lowres_below, uniform_neighbourhood,
};
use log::{debug, trace};
use oxijbig_core::bitmap::{Bitmap, bytes_per_line};
use oxijbig_core::error::{JbigError, Result};

/// Most ATMOVE segments allowed in one stripe.
pub const MAX_AT_MOVES: usize = 4;

/// Samples needed before the adaptive template is reconsidered.
const AT_MIN_SAMPLES: u64 = 2048;

/// Position and extent of one stripe within its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeGeometry {
    /// Stripe index.
    pub stripe: u32,
    /// Resolution layer.
    pub layer: u8,
    /// First line of the stripe.
    pub y0: u32,
    /// Nominal lines per stripe at this layer.
    pub hl: u32,
    /// Width of the layer.
    pub width: u32,
    /// Height of the layer.
    pub height: u32,
    /// Earlier lines are not visible (first stripe, or after SDRST).
    pub reset: bool,
}

impl StripeGeometry {
    /// Geometry of `stripe` at `layer` of an image whose layer is
    /// `width x height` pixels.
    pub fn new(stripe: u32, layer: u8, l0: u32, width: u32, height: u32, reset: bool) -> Self {
        let hl = l0 << layer;
        Self {
            stripe,
            layer,
            y0: stripe.saturating_mul(hl),
            hl,
            width,
            height,
            reset,
        }
    }

    /// Number of lines actually present in this stripe.
    #[inline]
    pub fn lines(&self) -> u32 {
        self.hl.min(self.height.saturating_sub(self.y0))
    }

    /// Index one past the last line of this stripe.
    #[inline]
    pub fn end(&self) -> u32 {
        self.y0 + self.lines()
    }

    #[inline]
    fn first_visible(&self) -> u32 {
        if self.reset { self.y0 } else { 0 }
    }

    /// Low-resolution lines per stripe.
    #[inline]
    fn ll(&self) -> u32 {
        self.hl >> 1
    }

    /// Typical prediction state carried into the first line of the stripe.
    fn initial_ltp(&self, image: &Bitmap) -> bool {
        if self.layer != 0 || self.reset || self.y0 == 0 {
            return false;
        }
        let prev = image.row(self.y0 - 1);
        if self.y0 > 1 {
            prev == image.row(self.y0 - 2)
        } else {
            prev.iter().all(|&b| b == 0)
        }
    }
}

/// Coding parameters shared by every stripe of a BIE.
#[derive(Debug, Clone, Copy)]
pub struct CodingParams<'a> {
    /// Coding options.
    pub options: Options,
    /// Largest AT offset.
    pub mx: u8,
    /// Internal DP table.
    pub dp: &'a [u8],
}

impl CodingParams<'_> {
    #[inline]
    fn two_line(&self) -> bool {
        self.options.contains(Options::LRLTWO)
    }

    #[inline]
    fn tpb_context(&self) -> usize {
        if self.two_line() { TPB2CX } else { TPB3CX }
    }

    /// Smallest AT offset that does not collide with the template.
    #[inline]
    fn at_start(&self, layer: u8) -> u8 {
        if layer == 0 && self.two_line() { 5 } else { 3 }
    }
}

// ============================================================================
// Adaptive template statistics
// ============================================================================

/// Per-stripe counters deciding whether to move the adaptive template.
#[derive(Debug)]
struct AtStats {
    /// `counts[0]` counts agreement with the default slot, `counts[t]` with
    /// the pixel `t` columns to the left.
    counts: Vec<u64>,
    all: u64,
    decided: bool,
}

impl AtStats {
    fn new(mx: u8) -> Self {
        Self {
            counts: vec![0; usize::from(mx) + 1],
            all: 0,
            decided: mx == 0,
        }
    }

    #[inline]
    fn active(&self) -> bool {
        !self.decided
    }

    /// Count one coded pixel.
    fn record(&mut self, pix: usize, default_slot: usize, row: &Bitmap, x: u32, y: u32, start: u8) {
        self.counts[0] += u64::from(default_slot == pix);
        for t in start..self.counts.len() as u8 {
            let candidate = usize::from(row.get(x - u32::from(t), y));
            self.counts[usize::from(t)] += u64::from(candidate == pix);
        }
        self.all += 1;
    }

    /// Called at each line start. Once enough samples are in, decides at
    /// most once per stripe whether the offset should change to a better
    /// candidate.
    ///
    /// The margins are computed modulo 2^64, so a difference that would be
    /// negative counts as very large.
    fn decide(&mut self, start: u8, tx: u8) -> Option<u8> {
        if self.decided || self.all <= AT_MIN_SAMPLES {
            return None;
        }
        self.decided = true;

        let c = &self.counts;
        let all = self.all;
        let mut cmax = 0u64;
        let mut cmin = u64::MAX;
        let mut tmax = 0usize;
        for t in usize::from(start)..c.len() {
            if c[t] > cmax {
                cmax = c[t];
                tmax = t;
            }
            cmin = cmin.min(c[t]);
        }
        let lmin = c[0].min(cmin);
        let lmax = c[0].max(cmax);
        let current = c[usize::from(tx)];

        let gain = cmax.wrapping_sub(current);
        let margin = cmax.wrapping_sub(all - current);
        let better = all - cmax < all >> 3
            && gain > all - cmax
            && gain > all >> 4
            && margin > all - cmax
            && margin > all >> 4
            && cmax - cmin > all >> 2
            && (tx != 0 || lmax - lmin > all >> 3);
        better.then_some(tmax as u8)
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Adaptive template offset carried between the stripes of one layer of
/// one plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtOffset {
    /// Current offset; 0 selects the default template pixel.
    pub tx: u8,
    /// A delayed move still to be announced ahead of the next stripe.
    pending: Option<u8>,
}

/// Everything needed to code one stripe.
pub struct StripeEncoder<'a> {
    /// Stripe position.
    pub geometry: StripeGeometry,
    /// Shared parameters.
    pub params: CodingParams<'a>,
    /// The layer being coded.
    pub image: &'a Bitmap,
    /// The layer below, for differential layers.
    pub lower: Option<&'a Bitmap>,
    /// This is the last stripe of its layer.
    pub last_stripe: bool,
}

impl StripeEncoder<'_> {
    /// Code the stripe into a complete SDE.
    ///
    /// `at` carries the adaptive template offset from stripe to stripe of
    /// the same layer and plane.
    pub fn encode(&self, coder: &mut ArithEncoder, at: &mut AtOffset) -> Result<Vec<u8>> {
        let geo = &self.geometry;
        let options = self.params.options;
        coder.reset(!geo.reset);
        if geo.stripe == 0 {
            *at = AtOffset::default();
        }
        let announced = at.pending.take();

        let estimate = bytes_per_line(geo.width) * geo.lines() as usize / 4 + 16;
        let mut coded = Vec::new();
        coded
            .try_reserve(estimate)
            .map_err(|_| JbigError::out_of_memory(estimate))?;

        let mut stats = AtStats::new(self.params.mx);
        let start = self.params.at_start(geo.layer);
        let delay_at = options.contains(Options::DELAY_AT);
        let mut moved: Option<(u32, u8)> = None;
        let tx = &mut at.tx;

        if geo.layer == 0 {
            self.encode_lowest(coder, &mut coded, &mut stats, tx, &mut moved, start, delay_at)?;
        } else {
            self.encode_differential(coder, &mut coded, &mut stats, tx, &mut moved, delay_at)?;
        }

        coder.flush(&mut coded);
        while coded.last() == Some(&0) {
            coded.pop();
        }
        if coded.last() == Some(&MARKER_ESC) {
            coded.push(MARKER_STUFF);
        }

        let sdrst = options.contains(Options::SDRST);
        coded.push(MARKER_ESC);
        coded.push(if sdrst { MARKER_SDRST } else { MARKER_SDNORM });
        if sdrst {
            at.tx = 0;
        }

        let mut prefix = Vec::with_capacity(2 * ATMOVE_LEN);
        if let Some(tx) = announced {
            prefix.extend_from_slice(&at_move_segment(0, tx));
        }
        match moved {
            Some((line, tx)) if !delay_at => {
                prefix.extend_from_slice(&at_move_segment(line, tx));
            }
            Some((_, tx)) if !self.last_stripe => {
                debug!(
                    "layer {} stripe {}: AT offset {} from next stripe",
                    geo.layer, geo.stripe, tx
                );
                at.tx = tx;
                at.pending = Some(tx);
            }
            _ => {}
        }

        let sde = if prefix.is_empty() {
            coded
        } else {
            let len = prefix.len() + coded.len();
            let mut sde = Vec::new();
            sde.try_reserve_exact(len)
                .map_err(|_| JbigError::out_of_memory(len))?;
            sde.extend_from_slice(&prefix);
            sde.extend_from_slice(&coded);
            sde
        };

        trace!(
            "layer {} stripe {}: {} lines, {} bytes",
            geo.layer,
            geo.stripe,
            geo.lines(),
            sde.len()
        );
        Ok(sde)
    }

    /// Check the AT statistics at a line start and apply an immediate move.
    fn at_line_start(
        &self,
        stats: &mut AtStats,
        start: u8,
        i: u32,
        tx: &mut u8,
        moved: &mut Option<(u32, u8)>,
        delay_at: bool,
    ) {
        if let Some(new_tx) = stats.decide(start, *tx) {
            *moved = Some((i, new_tx));
            if !delay_at {
                debug!(
                    "layer {} stripe {}: AT offset {} -> {} at line {}",
                    self.geometry.layer, self.geometry.stripe, *tx, new_tx, i
                );
                *tx = new_tx;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_lowest(
        &self,
        coder: &mut ArithEncoder,
        out: &mut Vec<u8>,
        stats: &mut AtStats,
        tx: &mut u8,
        moved: &mut Option<(u32, u8)>,
        start: u8,
        delay_at: bool,
    ) -> Result<()> {
        let geo = &self.geometry;
        let image = self.image;
        let view = LayerView::new(image, geo.first_visible());
        let two_line = self.params.two_line();
        let tpbon = self.params.options.contains(Options::TPBON);
        let mx = u32::from(self.params.mx);
        let mut ltp_old = geo.initial_ltp(image);

        for i in 0..geo.lines() {
            let y = geo.y0 + i;
            self.at_line_start(stats, start, i, tx, moved, delay_at);

            if tpbon {
                let ltp = if i > 0 || !geo.reset {
                    image.row(y) == image.row(y - 1)
                } else {
                    image.row(y).iter().all(|&b| b == 0)
                };
                coder.encode(self.params.tpb_context(), u8::from(ltp == ltp_old), out);
                ltp_old = ltp;
                if ltp {
                    continue;
                }
            }

            for x in 0..geo.width {
                let pix = u8::from(image.get(x, y));
                let cx = lowest_layer_context(&view, x, y, two_line, *tx);
                coder.encode(cx, pix, out);

                if stats.active() && x >= mx && x + 2 < geo.width {
                    let default_slot = view.px(i64::from(x) + 2, i64::from(y) - 1);
                    stats.record(usize::from(pix), default_slot, image, x, y, start);
                }
            }
        }
        Ok(())
    }

    fn encode_differential(
        &self,
        coder: &mut ArithEncoder,
        out: &mut Vec<u8>,
        stats: &mut AtStats,
        tx: &mut u8,
        moved: &mut Option<(u32, u8)>,
        delay_at: bool,
    ) -> Result<()> {
        let geo = &self.geometry;
        let image = self.image;
        let lower = self.lower.ok_or_else(|| {
            JbigError::invalid_parameter("differential layer coded without its lower layer")
        })?;
        let hv = LayerView::new(image, geo.first_visible());
        let lv = LayerView::new(lower, geo.first_visible() >> 1);
        let options = self.params.options;
        let tpdon = options.contains(Options::TPDON);
        let dpon = options.contains(Options::DPON);
        let mx = u32::from(self.params.mx);
        let start = self.params.at_start(geo.layer);
        let mut ltp = false;

        for i in 0..geo.lines() {
            let y = geo.y0 + i;
            self.at_line_start(stats, start, i, tx, moved, delay_at);

            let lyc = y >> 1;
            let below = lowres_below(i, geo.ll(), lyc, lower.height());

            if tpdon && i & 1 == 0 {
                let y2 = if i + 1 < geo.hl && y + 1 < geo.height { y + 1 } else { y };
                ltp = !(0..lower.width()).any(|q| {
                    uniform_neighbourhood(&lv, q, lyc, below).is_some_and(|v| {
                        let v = v != 0;
                        image.get(2 * q, y) != v
                            || image.get(2 * q + 1, y) != v
                            || image.get(2 * q, y2) != v
                            || image.get(2 * q + 1, y2) != v
                    })
                });
                coder.encode(TPDCX, u8::from(!ltp), out);
            } else if !tpdon {
                ltp = false;
            }

            for x in 0..geo.width {
                let pix = u8::from(image.get(x, y));
                if ltp && uniform_neighbourhood(&lv, x >> 1, lyc, below).is_some() {
                    continue;
                }
                if dpon && self.params.dp[dp_index(&hv, &lv, x, y)] < 2 {
                    continue;
                }
                let cx = differential_context(&hv, &lv, x, y, *tx, below);
                coder.encode(cx, pix, out);

                if stats.active() && x >= mx {
                    let default_slot = hv.px(i64::from(x) - 1, i64::from(y) - 1);
                    stats.record(usize::from(pix), default_slot, image, x, y, start);
                }
            }
        }
        Ok(())
    }
}

/// An ATMOVE segment moving the AT pixel to offset `tx` at `line`.
pub fn at_move_segment(line: u32, tx: u8) -> [u8; 8] {
    let l = line.to_be_bytes();
    [MARKER_ESC, MARKER_ATMOVE, l[0], l[1], l[2], l[3], tx, 0]
}

// ============================================================================
// Decoder
// ============================================================================

/// A pending adaptive template change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AtMove {
    line: u32,
    tx: u8,
}

/// Resumable decoder state for one stripe.
#[derive(Debug)]
pub struct StripeDecoder {
    geometry: StripeGeometry,
    plane: u8,
    /// Line within the stripe.
    i: u32,
    /// Next column of line `i`.
    x: u32,
    /// The prediction flag of line `i` has been read.
    started: bool,
    ltp: bool,
    ltp_old: bool,
    /// Buffered coded data; `pos` bytes of it are consumed.
    data: Vec<u8>,
    pos: usize,
    moves: Vec<AtMove>,
}

impl StripeDecoder {
    /// Start decoding a stripe into `image`, whose earlier lines are
    /// already decoded.
    pub fn new(geometry: StripeGeometry, plane: u8, image: &Bitmap) -> Self {
        Self {
            geometry,
            plane,
            i: 0,
            x: 0,
            started: false,
            ltp: false,
            ltp_old: geometry.initial_ltp(image),
            data: Vec::new(),
            pos: 0,
            moves: Vec::new(),
        }
    }

    /// The SDE being decoded.
    pub fn key(&self) -> SdeKey {
        SdeKey {
            stripe: self.geometry.stripe,
            layer: self.geometry.layer,
            plane: self.plane,
        }
    }

    /// Stripe position.
    pub fn geometry(&self) -> &StripeGeometry {
        &self.geometry
    }

    /// Returns true once every line has been decoded.
    pub fn is_complete(&self) -> bool {
        self.i >= self.geometry.lines()
    }

    /// Append coded bytes.
    pub fn push_data(&mut self, bytes: &[u8]) -> Result<()> {
        if self.pos > 0 {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
        self.data
            .try_reserve(bytes.len())
            .map_err(|_| JbigError::out_of_memory(self.data.len() + bytes.len()))?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Register an ATMOVE segment for this stripe.
    pub fn add_at_move(&mut self, line: u32, tx: u8) -> Result<()> {
        if self.moves.len() >= MAX_AT_MOVES {
            return Err(JbigError::invalid_data(format!(
                "more than {MAX_AT_MOVES} ATMOVE segments in one stripe"
            )));
        }
        if line >= self.geometry.hl {
            return Err(JbigError::invalid_data(format!(
                "ATMOVE line {line} outside stripe of {} lines",
                self.geometry.hl
            )));
        }
        if line < self.i || (line == self.i && self.started) {
            return Err(JbigError::invalid_data(format!(
                "ATMOVE for line {line} arrived after it was decoded"
            )));
        }
        self.moves.push(AtMove { line, tx });
        Ok(())
    }

    /// Decode as far as the buffered data allows.
    ///
    /// Returns `true` once the stripe is complete. `lower` must be given for
    /// differential layers.
    pub fn run(
        &mut self,
        coder: &mut ArithDecoder,
        image: &mut Bitmap,
        lower: Option<&Bitmap>,
        params: &CodingParams<'_>,
        tx: &mut u8,
    ) -> Result<bool> {
        let geo = self.geometry;
        if geo.layer > 0 && lower.is_none() {
            return Err(JbigError::invalid_parameter(
                "differential layer decoded without its lower layer",
            ));
        }
        let options = params.options;
        let two_line = params.two_line();

        while self.i < geo.lines() {
            let i = self.i;
            let y = geo.y0 + i;

            if !self.started {
                for m in self.moves.iter().filter(|m| m.line == i) {
                    debug!(
                        "layer {} stripe {}: AT offset {} at line {}",
                        geo.layer, geo.stripe, m.tx, i
                    );
                    *tx = m.tx;
                }
                if geo.layer == 0 {
                    if options.contains(Options::TPBON) {
                        let Some(flag) = self.next_bit(coder, params.tpb_context())? else {
                            return Ok(false);
                        };
                        let ltp = if flag == 1 { self.ltp_old } else { !self.ltp_old };
                        self.ltp_old = ltp;
                        if ltp {
                            if i > 0 || !geo.reset {
                                image.copy_row(y - 1, y);
                            } else {
                                image.clear_row(y);
                            }
                            self.i += 1;
                            continue;
                        }
                    }
                } else if options.contains(Options::TPDON) {
                    if i & 1 == 0 {
                        let Some(flag) = self.next_bit(coder, TPDCX)? else {
                            return Ok(false);
                        };
                        self.ltp = flag == 0;
                    }
                } else {
                    self.ltp = false;
                }
                self.started = true;
            }

            let complete = match lower {
                Some(lower) if geo.layer > 0 => {
                    self.decode_differential_line(coder, image, lower, params, *tx)?
                }
                _ => self.decode_lowest_line(coder, image, two_line, *tx)?,
            };
            if !complete {
                return Ok(false);
            }

            self.i += 1;
            self.x = 0;
            self.started = false;
        }
        Ok(true)
    }

    /// Decode one symbol, `None` if more data is needed.
    fn next_bit(&mut self, coder: &mut ArithDecoder, cx: usize) -> Result<Option<u8>> {
        match coder.decode(cx, &self.data, &mut self.pos) {
            ArithStatus::Bit(b) => Ok(Some(b)),
            ArithStatus::NeedMoreInput => Ok(None),
            ArithStatus::Marker => Err(JbigError::invalid_data(
                "marker inside stripe data",
            )),
        }
    }

    fn decode_lowest_line(
        &mut self,
        coder: &mut ArithDecoder,
        image: &mut Bitmap,
        two_line: bool,
        tx: u8,
    ) -> Result<bool> {
        let geo = self.geometry;
        let y = geo.y0 + self.i;
        while self.x < geo.width {
            let x = self.x;
            let cx = lowest_layer_context(
                &LayerView::new(image, geo.first_visible()),
                x,
                y,
                two_line,
                tx,
            );
            let Some(pix) = self.next_bit(coder, cx)? else {
                return Ok(false);
            };
            image.set(x, y, pix != 0);
            self.x += 1;
        }
        Ok(true)
    }

    fn decode_differential_line(
        &mut self,
        coder: &mut ArithDecoder,
        image: &mut Bitmap,
        lower: &Bitmap,
        params: &CodingParams<'_>,
        tx: u8,
    ) -> Result<bool> {
        let geo = self.geometry;
        let y = geo.y0 + self.i;
        let lv = LayerView::new(lower, geo.first_visible() >> 1);
        let lyc = y >> 1;
        let below = lowres_below(self.i, geo.ll(), lyc, lower.height());
        let dpon = params.options.contains(Options::DPON);

        while self.x < geo.width {
            let x = self.x;
            if self.ltp {
                if let Some(v) = uniform_neighbourhood(&lv, x >> 1, lyc, below) {
                    image.set(x, y, v != 0);
                    self.x += 1;
                    continue;
                }
            }
            let hv = LayerView::new(image, geo.first_visible());
            if dpon {
                let predicted = params.dp[dp_index(&hv, &lv, x, y)];
                if predicted < 2 {
                    image.set(x, y, predicted != 0);
                    self.x += 1;
                    continue;
                }
            }
            let cx = differential_context(&hv, &lv, x, y, tx, below);
            let Some(pix) = self.next_bit(coder, cx)? else {
                return Ok(false);
            };
            image.set(x, y, pix != 0);
            self.x += 1;
        }
        Ok(true)
    }
}
