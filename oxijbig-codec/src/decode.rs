//! Resumable JBIG decoder.
//!
//! [`JbigDecoder`] accepts a BIE in fragments of any size. Parsing is a
//! small state machine:
//!
//! ```text
//! Header --(DPON|DPPRIV)--> DpTable --> Body <--> MarkerCode
//!                                        ^            |
//!                                        |            v
//!                                     Comment <-- Segment
//! ```
//!
//! Stripe data is handed to a [`StripeDecoder`] as it arrives; the stripe
//! decoder stops whenever it runs out of bytes and picks up at the same
//! pixel on the next call. After an image is complete, further BIEs that
//! add higher resolution layers may follow.

use crate::arith::ArithDecoder;
use crate::config::Options;
use crate::header::{
    ATMOVE_LEN, BIH_LEN, Bih, COMMENT_HEADER_LEN, MARKER_ABORT, MARKER_ATMOVE, MARKER_COMMENT,
    MARKER_ESC, MARKER_NEWLEN, MARKER_SDNORM, MARKER_SDRST, MARKER_STUFF, NEWLEN_LEN,
};
use crate::pyramid::{LoopCursor, SdeKey};
use crate::stripe::{CodingParams, StripeDecoder, StripeGeometry};
use crate::tables::{DP_PRIV_BYTES, default_dp_table, dp_from_external};
use log::{debug, trace};
use oxijbig_core::bitmap::{Bitmap, bytes_per_line, ceil_half};
use oxijbig_core::error::{JbigError, Result};
use oxijbig_core::traits::{DecodeStatus, StreamDecoder};
use std::borrow::Cow;

/// Where the parser is within the BIE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Collecting the 20-byte header.
    Header,
    /// Collecting a private DP table.
    DpTable,
    /// Between or inside SDEs.
    Body,
    /// An escape byte was seen; the marker code is next.
    MarkerCode,
    /// Collecting a fixed-size marker segment of `need` bytes.
    Segment { code: u8, need: usize },
    /// Skipping comment payload.
    Comment { remaining: u32 },
}

/// State of the BIE being decoded.
#[derive(Debug)]
struct BieState {
    bih: Bih,
    cursor: LoopCursor,
    dp: Cow<'static, [u8]>,
    /// Coder state per (plane, layer).
    coders: Vec<Option<ArithDecoder>>,
    /// AT offset per (plane, layer).
    tx: Vec<u8>,
    /// The last SDE of (plane, layer) ended with SDRST.
    reset: Vec<bool>,
    stripe: Option<StripeDecoder>,
}

impl BieState {
    fn slot(bih: &Bih, key: SdeKey) -> usize {
        usize::from(key.plane) * (usize::from(bih.d) + 1) + usize::from(key.layer)
    }
}

/// Decoded layers of every plane, kept across BIEs.
#[derive(Debug)]
struct Pyramid {
    /// Highest layer and its size.
    d: u8,
    xd: u32,
    yd: u32,
    l0: u32,
    /// `layers[plane][layer]`.
    layers: Vec<Vec<Bitmap>>,
}

impl Pyramid {
    fn layer_size(&self, layer: u8) -> (u32, u32) {
        let shift = u32::from(self.d - layer);
        (ceil_half(self.xd, shift), ceil_half(self.yd, shift))
    }
}

/// A fully decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// One bitmap per bit plane, most significant plane first.
    pub planes: Vec<Bitmap>,
}

/// Streaming JBIG decoder.
///
/// # Example
///
/// ```rust
/// use oxijbig_codec::{Bitmap, DecodeStatus, JbigDecoder, StreamDecoder, encode};
///
/// let plane = Bitmap::from_fn(32, 32, |x, y| x == y).unwrap();
/// let bie = encode(32, 32, &[plane.clone()]).unwrap();
///
/// let mut decoder = JbigDecoder::new();
/// let mut status = DecodeStatus::NeedMoreInput;
/// for chunk in bie.chunks(7) {
///     let (_, s) = decoder.feed(chunk).unwrap();
///     status = s;
/// }
/// assert_eq!(status, DecodeStatus::Done);
/// assert_eq!(decoder.image(0), Some(&plane));
/// ```
#[derive(Debug)]
pub struct JbigDecoder {
    state: ParseState,
    /// Accumulator for the header, DP table and marker segments.
    acc: Vec<u8>,
    bie: Option<BieState>,
    image: Option<Pyramid>,
    /// Highest layer whose decoding has started.
    top_layer: Option<u8>,
    /// Last private DP table, for DPLAST.
    last_dp: Option<Vec<u8>>,
    max_size: Option<(u32, u32)>,
    max_layer: Option<u8>,
}

impl Default for JbigDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JbigDecoder {
    /// Create a decoder waiting for a BIE header.
    pub fn new() -> Self {
        Self {
            state: ParseState::Header,
            acc: Vec::new(),
            bie: None,
            image: None,
            top_layer: None,
            last_dp: None,
            max_size: None,
            max_layer: None,
        }
    }

    /// Stop before the first layer larger than `width x height`.
    ///
    /// Layer 0 is always decoded.
    pub fn set_max_size(&mut self, width: u32, height: u32) {
        self.max_size = Some((width, height));
    }

    /// Stop before the first layer above `layer`.
    pub fn set_max_layer(&mut self, layer: u8) {
        self.max_layer = Some(layer);
    }

    /// Width of the highest layer decoded so far, 0 before any data.
    pub fn width(&self) -> u32 {
        self.top_size().0
    }

    /// Height of the highest layer decoded so far, 0 before any data.
    pub fn height(&self) -> u32 {
        self.top_size().1
    }

    /// Number of bit planes, 0 before the first header.
    pub fn planes(&self) -> u8 {
        self.image.as_ref().map_or(0, |p| p.layers.len() as u8)
    }

    /// Size in bytes of one plane at [`width`](Self::width) x
    /// [`height`](Self::height).
    pub fn byte_size(&self) -> usize {
        let (width, height) = self.top_size();
        bytes_per_line(width) * height as usize
    }

    /// Highest layer decoded so far.
    pub fn layer(&self) -> Option<u8> {
        self.top_layer
    }

    /// The highest layer of `plane` decoded so far.
    ///
    /// Until that layer is complete the bitmap holds only the lines decoded
    /// so far.
    pub fn image(&self, plane: u8) -> Option<&Bitmap> {
        self.layer_image(plane, self.top_layer?)
    }

    /// Any decoded layer of `plane`.
    pub fn layer_image(&self, plane: u8, layer: u8) -> Option<&Bitmap> {
        self.image
            .as_ref()?
            .layers
            .get(usize::from(plane))?
            .get(usize::from(layer))
    }

    /// Returns true once every SDE of the current BIE has been decoded.
    pub fn is_done(&self) -> bool {
        self.bie.as_ref().is_some_and(|b| b.cursor.is_finished())
    }

    /// Move the decoded image out of the decoder.
    ///
    /// Fails unless the current BIE is complete.
    pub fn into_image(self) -> Result<DecodedImage> {
        if !self.is_done() {
            return Err(JbigError::unexpected_end("image is not complete"));
        }
        let (width, height) = self.top_size();
        let top = usize::from(self.top_layer.unwrap_or(0));
        let planes: Vec<Bitmap> = self
            .image
            .map(|p| {
                p.layers
                    .into_iter()
                    .filter_map(|layers| layers.into_iter().nth(top))
                    .collect()
            })
            .unwrap_or_default();
        Ok(DecodedImage {
            width,
            height,
            planes,
        })
    }

    fn top_size(&self) -> (u32, u32) {
        match (&self.image, self.top_layer) {
            (Some(pyramid), Some(layer)) => pyramid.layer_size(layer),
            _ => (0, 0),
        }
    }

    fn layer_allowed(&self, layer: u8) -> bool {
        if layer == 0 {
            return true;
        }
        if self.max_layer.is_some_and(|max| layer > max) {
            return false;
        }
        match (self.max_size, &self.image) {
            (Some((max_w, max_h)), Some(pyramid)) => {
                let (w, h) = pyramid.layer_size(layer);
                w <= max_w && h <= max_h
            }
            _ => true,
        }
    }

    /// Fill the accumulator up to `need` bytes; true once it is full.
    fn accumulate(&mut self, need: usize, input: &[u8], pos: &mut usize) -> Result<bool> {
        let take = (need - self.acc.len()).min(input.len() - *pos);
        if self.acc.capacity() < need {
            self.acc
                .try_reserve_exact(need - self.acc.len())
                .map_err(|_| JbigError::out_of_memory(need))?;
        }
        self.acc.extend_from_slice(&input[*pos..*pos + take]);
        *pos += take;
        Ok(self.acc.len() == need)
    }

    // ========================================================================
    // BIE header
    // ========================================================================

    /// Validate a header against the image decoded so far and set up the
    /// BIE. Returns the next parse state.
    fn begin_bie(&mut self, bytes: &[u8; BIH_LEN]) -> Result<ParseState> {
        let bih = Bih::parse(bytes)?;

        match &self.image {
            None if bih.dl != 0 => {
                return Err(JbigError::continuity(format!(
                    "first BIE starts at layer {} instead of 0",
                    bih.dl
                )));
            }
            None => {}
            Some(prev) => {
                if bih.dl != prev.d + 1 {
                    return Err(JbigError::continuity(format!(
                        "BIE starts at layer {}, expected {}",
                        bih.dl,
                        prev.d + 1
                    )));
                }
                if usize::from(bih.planes) != prev.layers.len() {
                    return Err(JbigError::continuity(format!(
                        "{} planes, previous BIE had {}",
                        bih.planes,
                        prev.layers.len()
                    )));
                }
                if bih.l0 != prev.l0 {
                    return Err(JbigError::continuity(format!(
                        "L0 {} differs from previous {}",
                        bih.l0, prev.l0
                    )));
                }
                if bih.layer_size(prev.d) != (prev.xd, prev.yd) {
                    return Err(JbigError::continuity(
                        "image size does not match the previous layers",
                    ));
                }
            }
        }

        debug!(
            "BIH: {}x{} layers {}..={} planes {} L0 {} MX {} order {:?} options {:?}",
            bih.xd, bih.yd, bih.dl, bih.d, bih.planes, bih.l0, bih.mx, bih.order, bih.options
        );

        let mut next = ParseState::Body;
        let dp = if !bih.options.contains(Options::DPON) {
            Cow::Borrowed(&[][..])
        } else if !bih.options.contains(Options::DPPRIV) {
            Cow::Borrowed(default_dp_table())
        } else if bih.options.contains(Options::DPLAST) {
            let table = self.last_dp.as_ref().ok_or_else(|| {
                JbigError::invalid_data("DPLAST without a previously transmitted DP table")
            })?;
            Cow::Owned(table.clone())
        } else {
            next = ParseState::DpTable;
            Cow::Borrowed(&[][..])
        };

        let pyramid = self.image.get_or_insert_with(|| Pyramid {
            d: 0,
            xd: 0,
            yd: 0,
            l0: bih.l0,
            layers: Vec::new(),
        });
        pyramid.d = bih.d;
        pyramid.xd = bih.xd;
        pyramid.yd = bih.yd;
        pyramid.layers.resize_with(usize::from(bih.planes), Vec::new);
        for layers in &mut pyramid.layers {
            for layer in bih.dl..=bih.d {
                let (width, _) = bih.layer_size(layer);
                layers.push(Bitmap::new(width, 0)?);
            }
        }

        let slots = usize::from(bih.planes) * (usize::from(bih.d) + 1);
        let mut coders = Vec::new();
        coders
            .try_reserve_exact(slots)
            .map_err(|_| JbigError::out_of_memory(slots))?;
        coders.resize_with(slots, || None);

        self.bie = Some(BieState {
            cursor: LoopCursor::new(bih.order, bih.stripes(), bih.dl, bih.d, bih.planes)?,
            bih,
            dp,
            coders,
            tx: vec![0; slots],
            reset: vec![false; slots],
            stripe: None,
        });
        Ok(next)
    }

    // ========================================================================
    // Stripe data
    // ========================================================================

    fn bie_mut(&mut self) -> Result<&mut BieState> {
        self.bie
            .as_mut()
            .ok_or_else(|| JbigError::invalid_data("stripe data before a BIE header"))
    }

    /// Start the SDE at the cursor position.
    fn start_sde(&mut self) -> Result<()> {
        let (Some(bie), Some(pyramid)) = (self.bie.as_mut(), self.image.as_mut()) else {
            return Err(JbigError::invalid_data("stripe data before a BIE header"));
        };
        if bie.cursor.is_finished() {
            return Err(JbigError::invalid_data("stripe data after the last stripe"));
        }
        let key = bie.cursor.current();
        let slot = BieState::slot(&bie.bih, key);
        let reset = key.stripe == 0 || bie.reset[slot];
        bie.coders[slot]
            .get_or_insert_with(ArithDecoder::new)
            .reset(!reset);
        if key.stripe == 0 {
            bie.tx[slot] = 0;
        }

        let (width, height) = bie.bih.layer_size(key.layer);
        let geometry = StripeGeometry::new(key.stripe, key.layer, bie.bih.l0, width, height, reset);
        let image = &mut pyramid.layers[usize::from(key.plane)][usize::from(key.layer)];
        image.grow_to(geometry.end())?;
        bie.stripe = Some(StripeDecoder::new(geometry, key.plane, image));

        self.top_layer = Some(self.top_layer.map_or(key.layer, |l| l.max(key.layer)));
        trace!(
            "start stripe {} layer {} plane {}",
            key.stripe, key.layer, key.plane
        );
        Ok(())
    }

    /// Append coded bytes to the active SDE and decode what they allow.
    fn stripe_data(&mut self, bytes: &[u8]) -> Result<bool> {
        let stripe = self
            .bie_mut()?
            .stripe
            .as_mut()
            .ok_or_else(|| JbigError::invalid_data("stripe data outside an SDE"))?;
        stripe.push_data(bytes)?;
        self.run_stripe()
    }

    fn run_stripe(&mut self) -> Result<bool> {
        let (Some(bie), Some(pyramid)) = (self.bie.as_mut(), self.image.as_mut()) else {
            return Err(JbigError::invalid_data("stripe data before a BIE header"));
        };
        let Some(stripe) = bie.stripe.as_mut() else {
            return Err(JbigError::invalid_data("stripe data outside an SDE"));
        };
        let key = stripe.key();
        let slot = BieState::slot(&bie.bih, key);
        let (lower, rest) = pyramid.layers[usize::from(key.plane)].split_at_mut(usize::from(key.layer));
        let Some(image) = rest.first_mut() else {
            return Err(JbigError::invalid_data("stripe of an unknown layer"));
        };
        let Some(coder) = bie.coders[slot].as_mut() else {
            return Err(JbigError::invalid_data("stripe decoder not started"));
        };
        let params = CodingParams {
            options: bie.bih.options,
            mx: bie.bih.mx,
            dp: &bie.dp,
        };
        stripe.run(coder, image, lower.last(), &params, &mut bie.tx[slot])
    }

    /// Terminate the active SDE with SDNORM or SDRST.
    fn finish_sde(&mut self, code: u8) -> Result<()> {
        if !self.stripe_data(&[MARKER_ESC, code])? {
            return Err(JbigError::invalid_data("stripe ended before its last line"));
        }
        let bie = self.bie_mut()?;
        let Some(stripe) = bie.stripe.take() else {
            return Err(JbigError::invalid_data("stripe terminator outside an SDE"));
        };
        let key = stripe.key();
        let slot = BieState::slot(&bie.bih, key);
        bie.reset[slot] = code == MARKER_SDRST;
        if code == MARKER_SDRST {
            bie.tx[slot] = 0;
        }
        bie.cursor.advance();
        trace!(
            "finished stripe {} layer {} plane {}",
            key.stripe, key.layer, key.plane
        );
        if bie.cursor.is_finished() {
            debug!("BIE complete: layers {}..={}", bie.bih.dl, bie.bih.d);
        }
        Ok(())
    }

    /// Make sure an SDE is active, starting the next one if needed.
    fn ensure_sde(&mut self) -> Result<()> {
        if self.bie_mut()?.stripe.is_none() {
            self.start_sde()?;
        }
        Ok(())
    }

    // ========================================================================
    // Marker segments
    // ========================================================================

    fn marker_code(&mut self, code: u8) -> Result<Option<DecodeStatus>> {
        self.state = ParseState::Body;
        match code {
            MARKER_STUFF => {
                self.ensure_sde()?;
                self.stripe_data(&[MARKER_ESC, MARKER_STUFF])?;
            }
            MARKER_SDNORM | MARKER_SDRST => {
                let bie = self.bie_mut()?;
                if bie.stripe.is_none() && bie.cursor.is_finished() {
                    // trailing terminator after the last stripe
                    return Ok(None);
                }
                self.ensure_sde()?;
                self.finish_sde(code)?;
                if self.is_done() {
                    return Ok(Some(DecodeStatus::Done));
                }
            }
            MARKER_ABORT => return Err(JbigError::AbortMarkerFound),
            MARKER_ATMOVE | MARKER_NEWLEN | MARKER_COMMENT => {
                let need = match code {
                    MARKER_ATMOVE => ATMOVE_LEN,
                    MARKER_NEWLEN => NEWLEN_LEN,
                    _ => COMMENT_HEADER_LEN,
                };
                self.acc.clear();
                self.acc.extend_from_slice(&[MARKER_ESC, code]);
                self.state = ParseState::Segment { code, need };
            }
            other => return Err(JbigError::unknown_marker(other)),
        }
        Ok(None)
    }

    fn segment(&mut self, code: u8) -> Result<Option<DecodeStatus>> {
        let be32 = |b: &[u8]| u32::from_be_bytes([b[2], b[3], b[4], b[5]]);
        let value = be32(&self.acc);
        self.state = ParseState::Body;

        match code {
            MARKER_COMMENT => {
                trace!("comment of {value} bytes");
                if value > 0 {
                    self.state = ParseState::Comment { remaining: value };
                }
            }
            MARKER_ATMOVE => {
                let tx = self.acc[6] as i8;
                let ty = self.acc[7];
                self.at_move(value, tx, ty)?;
            }
            _ => return self.new_length(value),
        }
        Ok(None)
    }

    fn at_move(&mut self, line: u32, tx: i8, ty: u8) -> Result<()> {
        let bie = self.bie_mut()?;
        let mx = i16::from(bie.bih.mx);
        if i16::from(tx) < -mx || i16::from(tx) > mx {
            return Err(JbigError::invalid_data(format!(
                "ATMOVE offset {tx} outside +-{mx}"
            )));
        }
        if ty != 0 {
            return Err(JbigError::unimplemented("vertical ATMOVE offsets"));
        }
        if tx < 0 {
            return Err(JbigError::invalid_data(format!(
                "ATMOVE offset {tx} is not causal"
            )));
        }
        if bie.stripe.is_none() && bie.cursor.is_finished() {
            return Err(JbigError::invalid_data("ATMOVE after the last stripe"));
        }
        self.ensure_sde()?;
        let bie = self.bie_mut()?;
        if let Some(stripe) = bie.stripe.as_mut() {
            debug!(
                "ATMOVE: layer {} stripe {} line {line} tx {tx}",
                stripe.geometry().layer,
                stripe.geometry().stripe
            );
            stripe.add_at_move(line, tx as u8)?;
        }
        Ok(())
    }

    fn new_length(&mut self, yd: u32) -> Result<Option<DecodeStatus>> {
        let (Some(bie), Some(pyramid)) = (self.bie.as_mut(), self.image.as_mut()) else {
            return Err(JbigError::invalid_data("NEWLEN before a BIE header"));
        };
        if !bie.bih.options.contains(Options::VLENGTH) {
            return Err(JbigError::invalid_data("NEWLEN without VLENGTH"));
        }
        if yd == 0 || yd > bie.bih.yd {
            return Err(JbigError::invalid_data(format!(
                "NEWLEN height {yd}, header announced {}",
                bie.bih.yd
            )));
        }
        if bie.stripe.is_some() {
            return Err(JbigError::invalid_data("NEWLEN inside stripe data"));
        }

        debug!("NEWLEN: height {} -> {yd}", bie.bih.yd);
        bie.bih.yd = yd;
        pyramid.yd = yd;
        bie.cursor.set_stripes(bie.bih.stripes());
        for layer in 0..=pyramid.d {
            let (_, height) = pyramid.layer_size(layer);
            for layers in &mut pyramid.layers {
                layers[usize::from(layer)].truncate(height);
            }
        }

        Ok(bie.cursor.is_finished().then_some(DecodeStatus::Done))
    }

    // ========================================================================
    // Body
    // ========================================================================

    /// Handle input in the body state. Returns a status when `feed` should
    /// return.
    fn body(&mut self, input: &[u8], pos: &mut usize) -> Result<Option<DecodeStatus>> {
        let bie = self.bie_mut()?;
        if bie.cursor.is_finished() {
            if *pos >= input.len() {
                return Ok(Some(DecodeStatus::Done));
            }
            if input[*pos] == MARKER_ESC {
                *pos += 1;
                self.state = ParseState::MarkerCode;
            } else {
                // the next BIE of an incremental stream
                self.state = ParseState::Header;
            }
            return Ok(None);
        }
        if *pos >= input.len() {
            return Ok(Some(DecodeStatus::NeedMoreInput));
        }

        if bie.stripe.is_none() {
            let layer = bie.cursor.current().layer;
            if !self.layer_allowed(layer) {
                debug!("stopping before layer {layer}");
                return Ok(Some(DecodeStatus::DoneAtLimit));
            }
            if input[*pos] != MARKER_ESC {
                self.start_sde()?;
            }
        }

        let end = input[*pos..]
            .iter()
            .position(|&b| b == MARKER_ESC)
            .map_or(input.len(), |n| *pos + n);
        if end > *pos {
            self.stripe_data(&input[*pos..end])?;
            *pos = end;
        }
        if *pos < input.len() {
            *pos += 1;
            self.state = ParseState::MarkerCode;
        }
        Ok(None)
    }
}

impl StreamDecoder for JbigDecoder {
    fn feed(&mut self, input: &[u8]) -> Result<(usize, DecodeStatus)> {
        let mut pos = 0;
        loop {
            let status = match self.state {
                ParseState::Header => {
                    if self.accumulate(BIH_LEN, input, &mut pos)? {
                        let mut bytes = [0u8; BIH_LEN];
                        bytes.copy_from_slice(&self.acc);
                        self.acc.clear();
                        self.state = self.begin_bie(&bytes)?;
                        None
                    } else {
                        Some(DecodeStatus::NeedMoreInput)
                    }
                }
                ParseState::DpTable => {
                    if self.accumulate(DP_PRIV_BYTES, input, &mut pos)? {
                        let table = dp_from_external(&self.acc)?;
                        self.acc.clear();
                        self.last_dp = Some(table.clone());
                        self.bie_mut()?.dp = Cow::Owned(table);
                        self.state = ParseState::Body;
                        None
                    } else {
                        Some(DecodeStatus::NeedMoreInput)
                    }
                }
                ParseState::Body => self.body(input, &mut pos)?,
                ParseState::MarkerCode => match input.get(pos) {
                    Some(&code) => {
                        pos += 1;
                        self.marker_code(code)?
                    }
                    None => Some(DecodeStatus::NeedMoreInput),
                },
                ParseState::Segment { code, need } => {
                    if self.accumulate(need, input, &mut pos)? {
                        let status = self.segment(code)?;
                        self.acc.clear();
                        status
                    } else {
                        Some(DecodeStatus::NeedMoreInput)
                    }
                }
                ParseState::Comment { remaining } => {
                    let take = (remaining as usize).min(input.len() - pos);
                    pos += take;
                    let remaining = remaining - take as u32;
                    if remaining > 0 {
                        self.state = ParseState::Comment { remaining };
                        Some(DecodeStatus::NeedMoreInput)
                    } else {
                        self.state = ParseState::Body;
                        None
                    }
                }
            };
            if let Some(status) = status {
                return Ok((pos, status));
            }
        }
    }

    fn reset(&mut self) {
        let (max_size, max_layer) = (self.max_size, self.max_layer);
        *self = Self::new();
        self.max_size = max_size;
        self.max_layer = max_layer;
    }

    fn is_finished(&self) -> bool {
        self.is_done()
    }
}
