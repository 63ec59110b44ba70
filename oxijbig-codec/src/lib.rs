//! # OxiJBIG Codec
//!
//! Pure Rust implementation of JBIG1 (ITU-T T.82), the lossless
//! compression standard for bi-level images.
//!
//! An image is coded as a resolution pyramid: the lowest layer on its own,
//! and every higher layer relative to the one below it, so a decoder can
//! stop early and show a reduced preview. All data travels in a single
//! bi-level image entity (BIE).
//!
//! ## Features
//!
//! - **QM arithmetic coder** with 4096 adaptive contexts
//! - **Stripes** of `L0 << layer` lines in any of the six legal orders
//! - **Typical prediction** (TPB, TPD) and **deterministic prediction**
//!   (DP), with default or private DP tables
//! - **Adaptive template** moved on the fly with ATMOVE
//! - **Resumable decoding**: feed the BIE in fragments of any size
//! - **Progressive decoding** with size or layer limits, and BIEs that add
//!   layers to an already decoded image
//! - VLENGTH/NEWLEN, COMMENT, SDRST
//!
//! ## Example
//!
//! ```rust
//! use oxijbig_codec::{Bitmap, decode, encode};
//!
//! let plane = Bitmap::from_fn(100, 80, |x, y| (x / 10 + y / 10) % 2 == 0).unwrap();
//! let bie = encode(100, 80, &[plane.clone()]).unwrap();
//!
//! let image = decode(&bie).unwrap();
//! assert_eq!((image.width, image.height), (100, 80));
//! assert_eq!(image.planes[0], plane);
//! ```
//!
//! ## Data flow
//!
//! ```text
//!   planes ──► JbigEncoder ──────────────────────────────► BIE bytes
//!                │  reduce ─► layer d-1 ─► ... ─► layer 0
//!                │  StripeEncoder (TPB/TPD/DP/AT) ─► ArithEncoder
//!                └─ LoopCursor / SdeStore: output order
//!
//!   BIE bytes ─► JbigDecoder (Header ─► DpTable ─► Body ─► markers)
//!                └─ StripeDecoder ─► ArithDecoder ─► layers 0..=d
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod arith;
pub mod config;
pub mod decode;
pub mod encode;
pub mod header;
pub mod pyramid;
pub mod resolution;
pub mod stripe;
pub mod tables;
pub mod template;

// Re-exports
pub use arith::{ArithDecoder, ArithEncoder, ArithStatus};
pub use config::{EncoderConfig, Options, Order};
pub use decode::{DecodedImage, JbigDecoder};
pub use encode::JbigEncoder;
pub use header::Bih;
pub use oxijbig_core::{Bitmap, DecodeStatus, JbigError, Result, StreamDecoder};

/// Encode a single-layer image with the default configuration.
///
/// `planes` holds one bitmap per bit plane, most significant plane first.
///
/// # Example
///
/// ```rust
/// use oxijbig_codec::{Bitmap, encode};
///
/// let plane = Bitmap::new(64, 64).unwrap();
/// let bie = encode(64, 64, &[plane]).unwrap();
/// assert!(bie.len() < 64);
/// ```
pub fn encode(width: u32, height: u32, planes: &[Bitmap]) -> Result<Vec<u8>> {
    encode_with_config(width, height, planes, 0, EncoderConfig::DEFAULT)
}

/// Encode with `layers` differential layers and an explicit configuration.
///
/// # Example
///
/// ```rust
/// use oxijbig_codec::{Bitmap, EncoderConfig, encode_with_config};
///
/// let plane = Bitmap::from_fn(64, 64, |x, _| x % 3 == 0).unwrap();
/// let bie = encode_with_config(64, 64, &[plane], 3, EncoderConfig::DEFAULT).unwrap();
/// // DL and D
/// assert_eq!(&bie[..2], &[0, 3]);
/// ```
pub fn encode_with_config(
    width: u32,
    height: u32,
    planes: &[Bitmap],
    layers: u8,
    config: EncoderConfig,
) -> Result<Vec<u8>> {
    let mut encoder = JbigEncoder::new(width, height, planes.to_vec(), Vec::new())?;
    encoder.set_layers(layers);
    encoder.set_config(config);
    encoder.run()?;
    Ok(encoder.into_inner())
}

/// Decode a complete BIE, or a sequence of BIEs that build up one image.
///
/// Returns the highest resolution layer.
pub fn decode(data: &[u8]) -> Result<DecodedImage> {
    let mut decoder = JbigDecoder::new();
    decoder.feed_all(data)?;
    decoder.into_image()
}
