//! JBIG encoder.
//!
//! The encoder owns the bit planes of one image and writes a complete BIE
//! to a caller-supplied [`Write`] sink: header, optional DP table, optional
//! comment and NEWLEN, then every SDE in the order selected by the order
//! flags.
//!
//! Only two layers of each plane are resident at any time. Lower layers are
//! produced by resolution reduction on demand, and SDEs that are needed for
//! a reduction before their turn in the output order are buffered until
//! they can be written.

use crate::arith::ArithEncoder;
use crate::config::{EncoderConfig, Options, Order};
use crate::header::{
    Bih, MARKER_COMMENT, MARKER_ESC, MARKER_NEWLEN, MAX_LAYERS, MAX_MX, stripe_count,
};
use crate::pyramid::{LoopCursor, PlanePyramid, SdeKey, SdeStore};
use crate::resolution;
use crate::stripe::{AtOffset, CodingParams, StripeEncoder, StripeGeometry};
use crate::tables::{default_dp_table, dp_from_external, dp_to_external};
use log::{debug, trace};
use oxijbig_core::bitmap::{Bitmap, ceil_half};
use oxijbig_core::error::{JbigError, Result};
use std::io::Write;

/// Lines per stripe chosen when none is configured.
///
/// Aims at about 35 stripes at the lowest layer while keeping stripes at
/// the highest layer within 128 lines.
pub fn default_l0(height: u32, d: u8) -> u32 {
    let mut l0 = ceil_half(height, u32::from(d)) / 35;
    while l0 > 0 && u64::from(l0) << d > 128 {
        l0 -= 1;
    }
    l0.max(2)
}

/// JBIG encoder writing one BIE to `W`.
///
/// # Example
///
/// ```rust
/// use oxijbig_codec::{Bitmap, JbigEncoder};
///
/// let plane = Bitmap::from_fn(64, 48, |x, y| (x / 8 + y / 8) % 2 == 0).unwrap();
/// let mut encoder = JbigEncoder::new(64, 48, vec![plane], Vec::new()).unwrap();
/// encoder.set_layers(2);
/// encoder.run().unwrap();
/// let bie = encoder.into_inner();
/// assert_eq!(&bie[..3], &[0, 2, 1]);
/// ```
#[derive(Debug)]
pub struct JbigEncoder<W: Write> {
    sink: W,
    width: u32,
    height: u32,
    planes: Vec<Bitmap>,
    d: u8,
    dl: u8,
    dh: u8,
    config: EncoderConfig,
    comment: Option<Vec<u8>>,
    dp_table: Option<Vec<u8>>,
    announced_height: Option<u32>,
}

impl<W: Write> JbigEncoder<W> {
    /// Create an encoder for a `width x height` image with one bitmap per
    /// bit plane, most significant plane first.
    pub fn new(width: u32, height: u32, planes: Vec<Bitmap>, sink: W) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(JbigError::invalid_parameter(format!(
                "image size {width}x{height} is empty"
            )));
        }
        if planes.is_empty() || planes.len() > usize::from(u8::MAX) {
            return Err(JbigError::invalid_parameter(format!(
                "{} bit planes, expected 1 to 255",
                planes.len()
            )));
        }
        if let Some((i, plane)) = planes
            .iter()
            .enumerate()
            .find(|(_, p)| p.width() != width || p.height() != height)
        {
            return Err(JbigError::invalid_parameter(format!(
                "plane {i} is {}x{}, expected {width}x{height}",
                plane.width(),
                plane.height()
            )));
        }

        Ok(Self {
            sink,
            width,
            height,
            planes,
            d: 0,
            dl: 0,
            dh: 0,
            config: EncoderConfig::DEFAULT,
            comment: None,
            dp_table: None,
            announced_height: None,
        })
    }

    /// Use `d` differential layers and write all of them.
    pub fn set_layers(&mut self, d: u8) {
        self.d = d;
        self.dl = 0;
        self.dh = d;
    }

    /// Choose the smallest number of layers whose lowest layer fits in
    /// `max_width x max_height`, and write all of them.
    ///
    /// Returns the chosen number of differential layers.
    pub fn set_auto_layers_for_max_size(&mut self, max_width: u32, max_height: u32) -> u8 {
        let mut d = 0u8;
        while d < MAX_LAYERS
            && (ceil_half(self.width, u32::from(d)) > max_width
                || ceil_half(self.height, u32::from(d)) > max_height)
        {
            d += 1;
        }
        self.set_layers(d);
        d
    }

    /// Write only layers `dl..=dh` of the pyramid.
    ///
    /// Used to split an image across several BIEs; decoding them in order
    /// continues the same image.
    pub fn set_layer_range(&mut self, dl: u8, dh: u8) {
        self.dl = dl;
        self.dh = dh;
    }

    /// Set order, options, stripe height and AT limits in one call.
    ///
    /// `l0 == 0` selects [`default_l0`].
    pub fn set_options(&mut self, order: Order, options: Options, l0: u32, mx: u8, my: u8) {
        self.config = EncoderConfig {
            order,
            options,
            l0,
            mx,
            my,
        };
    }

    /// Replace the whole coding configuration.
    pub fn set_config(&mut self, config: EncoderConfig) {
        self.config = config;
    }

    /// Current coding configuration.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Emit a COMMENT segment ahead of the first SDE.
    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = Some(comment.into());
    }

    /// Use a private DP table, given in the 1728-byte transmitted form.
    ///
    /// The table is written to the BIE when DPON is set.
    pub fn set_dp_table(&mut self, table: &[u8]) -> Result<()> {
        self.dp_table = Some(dp_from_external(table)?);
        Ok(())
    }

    /// Announce a larger height in the header and correct it with NEWLEN.
    ///
    /// Sets VLENGTH. `u32::MAX` announces an unknown height.
    pub fn set_announced_height(&mut self, height: u32) {
        self.announced_height = Some(height);
    }

    /// Encode the image into the sink.
    ///
    /// The bit planes are consumed; a second call fails.
    pub fn run(&mut self) -> Result<()> {
        let planes = std::mem::take(&mut self.planes);
        if planes.is_empty() {
            return Err(JbigError::invalid_parameter("the encoder has already run"));
        }
        let bih = self.prepare_header(planes.len() as u8)?;
        self.write_header(&bih)?;

        let dp = self.dp_table.as_deref().unwrap_or(default_dp_table());
        let geometry = (self.width, self.height, self.d);
        let mut run = EncoderRun::new(geometry, &bih, self.config.options, dp, planes)?;

        let mut cursor = LoopCursor::new(bih.order, run.stripes, bih.dl, bih.d, bih.planes)?;
        let mut comment = self.comment.as_deref();
        let mut newlen_pending = self.announced_height.is_some();

        while !cursor.is_finished() {
            let key = cursor.current();
            if let Some(text) = comment.take() {
                let len = u32::try_from(text.len()).map_err(|_| {
                    JbigError::invalid_parameter(format!("comment of {} bytes", text.len()))
                })?;
                self.sink.write_all(&[MARKER_ESC, MARKER_COMMENT])?;
                self.sink.write_all(&len.to_be_bytes())?;
                self.sink.write_all(text)?;
            }
            if newlen_pending && key.stripe + 1 == run.stripes {
                let yd = ceil_half(self.height, u32::from(self.d - self.dh));
                debug!("NEWLEN: height {yd}");
                self.sink.write_all(&[MARKER_ESC, MARKER_NEWLEN])?;
                self.sink.write_all(&yd.to_be_bytes())?;
                newlen_pending = false;
            }
            run.output_sde(key, &mut self.sink)?;
            cursor.advance();
        }

        self.sink.flush()?;
        debug!("BIE complete");
        Ok(())
    }

    /// Consume the encoder and return the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Validate the configuration and build the header to write.
    fn prepare_header(&self, planes: u8) -> Result<Bih> {
        let d = self.d;
        if d > MAX_LAYERS {
            return Err(JbigError::invalid_parameter(format!(
                "{d} differential layers, at most {MAX_LAYERS} supported"
            )));
        }
        if self.dl > self.dh || self.dh > d {
            return Err(JbigError::invalid_parameter(format!(
                "layer range {}..={} outside 0..={d}",
                self.dl, self.dh
            )));
        }

        let config = &self.config;
        let order = config.order.normalized();
        let mut options = config.options;

        let two_line = options.contains(Options::LRLTWO);
        let mut mx = config.mx.min(MAX_MX);
        if mx < if two_line { 5 } else { 3 } {
            mx = 0;
        }
        if self.dp_table.is_some() && options.contains(Options::DPON) {
            options |= Options::DPPRIV;
        }

        let l0 = if config.l0 == 0 {
            default_l0(self.height, d)
        } else {
            config.l0
        };
        if u64::from(l0) << d > u64::from(u32::MAX) {
            return Err(JbigError::invalid_parameter(format!(
                "stripe height {l0} << {d} overflows"
            )));
        }

        let mut yd = self.height;
        if let Some(announced) = self.announced_height {
            if announced < self.height {
                return Err(JbigError::invalid_parameter(format!(
                    "announced height {announced} below actual height {}",
                    self.height
                )));
            }
            options |= Options::VLENGTH;
            yd = announced;
        }

        let shift = u32::from(d - self.dh);
        Ok(Bih {
            dl: self.dl,
            d: self.dh,
            planes,
            xd: ceil_half(self.width, shift),
            yd: if yd == u32::MAX { yd } else { ceil_half(yd, shift) },
            l0,
            mx,
            my: config.my,
            order,
            options,
        })
    }

    fn write_header(&mut self, bih: &Bih) -> Result<()> {
        debug!(
            "BIH: {}x{} layers {}..={} planes {} L0 {} MX {} order {:?} options {:?}",
            bih.xd, bih.yd, bih.dl, bih.d, bih.planes, bih.l0, bih.mx, bih.order, bih.options
        );
        self.sink.write_all(&bih.to_bytes())?;
        if bih.has_private_table() {
            let internal = self.dp_table.as_deref().unwrap_or(default_dp_table());
            self.sink.write_all(&dp_to_external(internal))?;
        }
        Ok(())
    }
}

// ============================================================================
// Encoder run state
// ============================================================================

/// Everything that lives only while [`JbigEncoder::run`] is writing.
struct EncoderRun<'a> {
    width: u32,
    height: u32,
    d: u8,
    l0: u32,
    stripes: u32,
    params: CodingParams<'a>,
    store: SdeStore,
    pyramids: Vec<PlanePyramid>,
    /// Coder state per (plane, layer).
    coders: Vec<Option<ArithEncoder>>,
    /// AT offset per (plane, layer).
    at: Vec<AtOffset>,
}

impl<'a> EncoderRun<'a> {
    fn new(
        (width, height, d): (u32, u32, u8),
        bih: &Bih,
        options: Options,
        dp: &'a [u8],
        planes: Vec<Bitmap>,
    ) -> Result<Self> {
        let stripes = stripe_count(height, d, bih.l0);
        let layers = usize::from(d) + 1;
        let slots = planes.len() * layers;

        let mut pyramids = Vec::new();
        pyramids
            .try_reserve_exact(planes.len())
            .map_err(|_| JbigError::out_of_memory(planes.len()))?;
        for mut plane in planes {
            plane.clear_padding();
            pyramids.push(PlanePyramid::new(plane)?);
        }

        let mut coders = Vec::new();
        coders
            .try_reserve_exact(slots)
            .map_err(|_| JbigError::out_of_memory(slots))?;
        coders.resize_with(slots, || None);

        Ok(Self {
            width,
            height,
            d,
            l0: bih.l0,
            stripes,
            params: CodingParams {
                // encoder-only bits are not in the header
                options: options | bih.options,
                mx: bih.mx,
                dp,
            },
            store: SdeStore::new(stripes, layers, usize::from(bih.planes))?,
            pyramids,
            coders,
            at: vec![AtOffset::default(); slots],
        })
    }

    #[inline]
    fn slot(&self, key: SdeKey) -> usize {
        usize::from(key.plane) * (usize::from(self.d) + 1) + usize::from(key.layer)
    }

    /// Write the SDE for `key`, generating whatever it depends on first.
    fn output_sde<W: Write>(&mut self, key: SdeKey, sink: &mut W) -> Result<()> {
        if let Some(data) = self.store.take(key) {
            sink.write_all(&data)?;
            return Ok(());
        }

        let plane = key.plane;
        let last = self.stripes - 1;
        let mut lfcl = (0..=self.d)
            .rev()
            .find(|&layer| {
                !self.store.is_generated(SdeKey {
                    stripe: last,
                    layer,
                    plane,
                })
            })
            .map_or(0, |layer| layer + 1);

        if lfcl > self.d && self.d > 0 && key.stripe == 0 {
            self.reduce(plane, self.d)?;
        }
        while lfcl > key.layer + 1 {
            let layer = lfcl - 1;
            for stripe in 0..self.stripes {
                self.encode_sde(SdeKey {
                    stripe,
                    layer,
                    plane,
                })?;
            }
            lfcl -= 1;
            self.pyramids[usize::from(plane)].flip();
            if lfcl > 1 {
                self.reduce(plane, lfcl - 1)?;
            }
        }

        self.encode_sde(key)?;
        let data = self.store.take(key).ok_or_else(|| {
            JbigError::invalid_parameter(format!(
                "SDE for stripe {} layer {} plane {} was not generated",
                key.stripe, key.layer, key.plane
            ))
        })?;
        sink.write_all(&data)?;

        let below = SdeKey {
            stripe: 0,
            layer: key.layer.saturating_sub(1),
            plane,
        };
        if key.stripe == last && key.layer > 0 && !self.store.is_generated(below) {
            self.pyramids[usize::from(plane)].flip();
            if key.layer > 1 {
                self.reduce(plane, key.layer - 1)?;
            }
        }
        Ok(())
    }

    /// Reduce the current layer `layer_hi` of `plane` into the lower buffer.
    fn reduce(&mut self, plane: u8, layer_hi: u8) -> Result<()> {
        let sdrst = self.params.options.contains(Options::SDRST);
        let pyramid = &mut self.pyramids[usize::from(plane)];
        let lower = resolution::reduce(pyramid.current(), self.l0, layer_hi, sdrst)?;
        debug!(
            "plane {plane}: reduced layer {layer_hi} to {}x{}",
            lower.width(),
            lower.height()
        );
        pyramid.set_lower(lower);
        Ok(())
    }

    /// Code one SDE and buffer it.
    fn encode_sde(&mut self, key: SdeKey) -> Result<()> {
        let shift = u32::from(self.d - key.layer);
        let (width, height) = (ceil_half(self.width, shift), ceil_half(self.height, shift));
        let reset = key.stripe == 0 || self.params.options.contains(Options::SDRST);
        let slot = self.slot(key);

        let pyramid = &self.pyramids[usize::from(key.plane)];
        let image = pyramid.current();
        if image.width() != width || image.height() != height {
            return Err(JbigError::invalid_parameter(format!(
                "layer {} of plane {} is {}x{}, expected {width}x{height}",
                key.layer,
                key.plane,
                image.width(),
                image.height()
            )));
        }

        let encoder = StripeEncoder {
            geometry: StripeGeometry::new(key.stripe, key.layer, self.l0, width, height, reset),
            params: self.params,
            image,
            lower: (key.layer > 0).then(|| pyramid.lower()),
            last_stripe: key.stripe + 1 == self.stripes,
        };
        let coder = self.coders[slot].get_or_insert_with(ArithEncoder::new);
        let data = encoder.encode(coder, &mut self.at[slot])?;
        trace!(
            "generated stripe {} layer {} plane {}",
            key.stripe, key.layer, key.plane
        );
        self.store.store(key, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::BIH_LEN;
    use crate::tables::DP_PRIV_BYTES;

    fn checkerboard(width: u32, height: u32) -> Bitmap {
        Bitmap::from_fn(width, height, |x, y| (x / 4 + y / 4) % 2 == 0).expect("alloc")
    }

    fn encode_with(setup: impl FnOnce(&mut JbigEncoder<Vec<u8>>)) -> Vec<u8> {
        let mut encoder =
            JbigEncoder::new(40, 30, vec![checkerboard(40, 30)], Vec::new()).expect("encoder");
        setup(&mut encoder);
        encoder.run().expect("encode");
        encoder.into_inner()
    }

    #[test]
    fn test_default_l0() {
        assert_eq!(default_l0(20, 0), 2);
        assert_eq!(default_l0(3500, 0), 100);
        assert_eq!(default_l0(3500, 1), 50);
        assert_eq!(default_l0(7000, 0), 128);
        assert_eq!(default_l0(7000, 3), 16);
    }

    #[test]
    fn test_header_fields() {
        let bie = encode_with(|e| e.set_layers(2));
        let bih = Bih::parse(bie[..BIH_LEN].try_into().expect("header")).expect("valid");
        assert_eq!((bih.dl, bih.d, bih.planes), (0, 2, 1));
        assert_eq!((bih.xd, bih.yd), (40, 30));
        assert_eq!(bih.l0, 2);
        assert_eq!(bih.mx, 8);
        assert_eq!(bih.order, Order::ILEAVE | Order::SMID);
    }

    #[test]
    fn test_layer_range_header() {
        let bie = encode_with(|e| {
            e.set_layers(3);
            e.set_layer_range(1, 2);
        });
        let bih = Bih::parse(bie[..BIH_LEN].try_into().expect("header")).expect("valid");
        assert_eq!((bih.dl, bih.d), (1, 2));
        assert_eq!((bih.xd, bih.yd), (20, 15));
    }

    #[test]
    fn test_small_mx_disables_at() {
        let bie = encode_with(|e| e.set_options(Order::NONE, Options::TPBON, 0, 2, 0));
        assert_eq!(bie[16], 0);
        let bie = encode_with(|e| e.set_options(Order::NONE, Options::LRLTWO, 0, 4, 0));
        assert_eq!(bie[16], 0);
        let bie = encode_with(|e| e.set_options(Order::NONE, Options::NONE, 0, 200, 0));
        assert_eq!(bie[16], 127);
    }

    #[test]
    fn test_illegal_order_normalized() {
        let bie = encode_with(|e| e.set_options(Order::SMID, Options::NONE, 0, 0, 0));
        assert_eq!(bie[18], 0x03);
    }

    #[test]
    fn test_comment_precedes_first_sde() {
        let bie = encode_with(|e| e.set_comment(&b"hello"[..]));
        assert_eq!(&bie[BIH_LEN..BIH_LEN + 6], &[0xff, 0x07, 0, 0, 0, 5]);
        assert_eq!(&bie[BIH_LEN + 6..BIH_LEN + 11], b"hello");
    }

    #[test]
    fn test_private_dp_table_written() {
        let external = dp_to_external(default_dp_table());
        let bie = encode_with(|e| {
            e.set_layers(1);
            e.set_dp_table(&external).expect("table");
        });
        assert_eq!(bie[19] & 0x07, 0x06);
        assert_eq!(&bie[BIH_LEN..BIH_LEN + DP_PRIV_BYTES], &external[..]);
    }

    #[test]
    fn test_announced_height() {
        let bie = encode_with(|e| e.set_announced_height(u32::MAX));
        assert_eq!(&bie[8..12], &[0xff; 4]);
        assert_ne!(bie[19] & Options::VLENGTH.header_byte(), 0);
        let newlen = [0xff, 0x05, 0, 0, 0, 30];
        assert!(bie.windows(6).any(|w| w == newlen));
    }

    #[test]
    fn test_unknown_height_kept_below_top_layer() {
        let bie = encode_with(|e| {
            e.set_layers(3);
            e.set_layer_range(0, 1);
            e.set_announced_height(u32::MAX);
        });
        let bih = Bih::parse(bie[..BIH_LEN].try_into().expect("header")).expect("valid");
        assert_eq!((bih.dl, bih.d), (0, 1));
        assert_eq!((bih.xd, bih.yd), (10, u32::MAX));
        let newlen = [0xff, 0x05, 0, 0, 0, 8];
        assert!(bie.windows(6).any(|w| w == newlen));
    }

    #[test]
    fn test_invalid_setup() {
        assert!(JbigEncoder::new(0, 4, vec![], Vec::new()).is_err());
        assert!(JbigEncoder::new(8, 8, vec![], Vec::new()).is_err());
        assert!(JbigEncoder::new(8, 8, vec![checkerboard(8, 9)], Vec::new()).is_err());

        let mut encoder =
            JbigEncoder::new(8, 8, vec![checkerboard(8, 8)], Vec::new()).expect("encoder");
        encoder.set_layer_range(1, 0);
        assert!(matches!(
            encoder.run(),
            Err(JbigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_run_twice_fails() {
        let mut encoder =
            JbigEncoder::new(8, 8, vec![checkerboard(8, 8)], Vec::new()).expect("encoder");
        encoder.run().expect("first run");
        assert!(encoder.run().is_err());
    }

    #[test]
    fn test_auto_layers() {
        let mut encoder =
            JbigEncoder::new(640, 480, vec![Bitmap::new(640, 480).expect("alloc")], Vec::new())
                .expect("encoder");
        assert_eq!(encoder.set_auto_layers_for_max_size(100, 100), 3);
        assert_eq!(encoder.set_auto_layers_for_max_size(640, 480), 0);
    }
}
