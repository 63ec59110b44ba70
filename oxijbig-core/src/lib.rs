//! # OxiJBIG Core
//!
//! Core components for the OxiJBIG bi-level image codec.
//!
//! This crate provides the building blocks shared by the codec:
//!
//! - [`bitmap`]: Packed 1 bit per pixel planes and resolution geometry
//! - [`traits`]: Streaming decoder trait and status values
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container                                           │
//! │     BIE header, DP table, marker segments               │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Stripes, templates, TP/DP, resolution pyramid       │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Entropy coding                                      │
//! │     QM arithmetic coder                                 │
//! ├─────────────────────────────────────────────────────────┤
//! │ L0: Core (this crate)                                   │
//! │     Bitmap, DecodeStatus, JbigError                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxijbig_core::bitmap::{Bitmap, ceil_half};
//!
//! let bitmap = Bitmap::from_fn(23, 20, |x, y| (x + y) % 3 == 0).unwrap();
//! assert_eq!(bitmap.stride(), 3);
//! assert!(bitmap.get(0, 0));
//!
//! // Size of the image two resolution layers down
//! assert_eq!(ceil_half(bitmap.width(), 2), 6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod bitmap;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use bitmap::{Bitmap, bytes_per_line, ceil_half};
pub use error::{JbigError, Result};
pub use traits::{DecodeStatus, StreamDecoder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitmap::Bitmap;
    pub use crate::error::{JbigError, Result};
    pub use crate::traits::{DecodeStatus, StreamDecoder};
}
