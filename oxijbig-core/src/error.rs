//! Error types for OxiJBIG operations.
//!
//! Streaming signals such as "need more input" or "stopped at the configured
//! size limit" are not errors; they are reported through
//! [`DecodeStatus`](crate::traits::DecodeStatus). Everything in this module
//! is a hard failure of the current stream.

use std::io;
use thiserror::Error;

/// The main error type for OxiJBIG operations.
#[derive(Debug, Error)]
pub enum JbigError {
    /// I/O error from the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input ended in the middle of a structure that cannot be resumed.
    #[error("Unexpected end of data: {context}")]
    UnexpectedEndOfData {
        /// What was being read when the data ran out.
        context: String,
    },

    /// A buffer could not be allocated.
    #[error("Out of memory: failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },

    /// The encoder aborted the stream with an ABORT marker.
    #[error("ABORT marker found in stream")]
    AbortMarkerFound,

    /// A marker code that is not defined for a BIE.
    #[error("Unknown marker segment: 0xFF 0x{code:02X}")]
    UnknownMarkerSegment {
        /// The marker code following the escape byte.
        code: u8,
    },

    /// A follow-up BIE does not continue the previously decoded image.
    #[error("BIE does not continue the previous image: {message}")]
    IncrementalContinuityMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A header field or marker segment holds an out-of-range value.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of the invalid value.
        message: String,
    },

    /// The stream uses a legal feature this implementation does not support.
    #[error("Unimplemented feature: {feature}")]
    UnimplementedFeature {
        /// Name of the unsupported feature.
        feature: String,
    },

    /// An encoder or decoder parameter was rejected.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the rejected parameter.
        message: String,
    },
}

/// Result type alias for OxiJBIG operations.
pub type Result<T> = std::result::Result<T, JbigError>;

impl JbigError {
    /// Create an unexpected end of data error.
    pub fn unexpected_end(context: impl Into<String>) -> Self {
        Self::UnexpectedEndOfData {
            context: context.into(),
        }
    }

    /// Create an out of memory error.
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create an unknown marker error.
    pub fn unknown_marker(code: u8) -> Self {
        Self::UnknownMarkerSegment { code }
    }

    /// Create a continuity mismatch error.
    pub fn continuity(message: impl Into<String>) -> Self {
        Self::IncrementalContinuityMismatch {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an unimplemented feature error.
    pub fn unimplemented(feature: impl Into<String>) -> Self {
        Self::UnimplementedFeature {
            feature: feature.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by the content of the input
    /// stream rather than by the caller or the environment.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEndOfData { .. }
                | Self::AbortMarkerFound
                | Self::UnknownMarkerSegment { .. }
                | Self::IncrementalContinuityMismatch { .. }
                | Self::InvalidData { .. }
        )
    }
}
