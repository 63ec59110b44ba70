//! Core traits for streaming bi-level image decoding.
//!
//! Decoders are fed compressed bytes in arbitrary fragments. Each call
//! reports how many bytes were consumed and a [`DecodeStatus`] telling the
//! caller what to do next.

use crate::error::{JbigError, Result};

/// Status of a streaming decode operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// All input was consumed and more is needed to continue.
    NeedMoreInput,
    /// The image is complete. Unconsumed input, if any, belongs to a
    /// following stream.
    Done,
    /// Decoding stopped at the configured resolution limit. Remaining input
    /// was left unconsumed and can be fed again after raising the limit.
    DoneAtLimit,
}

impl DecodeStatus {
    /// Returns true for both completion states.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done | Self::DoneAtLimit)
    }
}

/// A streaming decoder fed with compressed fragments.
pub trait StreamDecoder {
    /// Feed a fragment of compressed data.
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, status).
    fn feed(&mut self, input: &[u8]) -> Result<(usize, DecodeStatus)>;

    /// Reset the decoder to its initial state.
    fn reset(&mut self);

    /// Check if the decoder has finished the current image.
    fn is_finished(&self) -> bool;

    /// Feed a complete buffer (convenience method).
    ///
    /// Keeps feeding while the decoder makes progress, so several
    /// concatenated streams are all processed. Running out of data before
    /// the image is complete is reported as
    /// [`JbigError::UnexpectedEndOfData`].
    fn feed_all(&mut self, input: &[u8]) -> Result<DecodeStatus> {
        let mut pos = 0;
        loop {
            let (consumed, status) = self.feed(&input[pos..])?;
            pos += consumed;

            match status {
                DecodeStatus::NeedMoreInput => {
                    return Err(JbigError::unexpected_end(format!(
                        "stream ended after {pos} bytes"
                    )));
                }
                DecodeStatus::DoneAtLimit => return Ok(status),
                DecodeStatus::Done if pos >= input.len() || consumed == 0 => return Ok(status),
                DecodeStatus::Done => continue,
            }
        }
    }
}
