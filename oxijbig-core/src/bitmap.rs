//! Packed bi-level bitmaps.
//!
//! A [`Bitmap`] stores one bit plane with one bit per pixel, eight pixels
//! per byte, most significant bit first. Every line occupies
//! [`bytes_per_line`] bytes, so lines start on byte boundaries; the unused
//! low bits of the last byte of each line are kept at zero.
//!
//! All allocations go through [`try_alloc_zeroed`], which reports
//! exhaustion as [`JbigError::OutOfMemory`] instead of aborting.

use crate::error::{JbigError, Result};

/// Number of bytes occupied by one line of `width` pixels.
#[inline]
pub fn bytes_per_line(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Divide `value` by `2^n`, rounding up.
///
/// This is the size of a dimension after `n` resolution halvings.
#[inline]
pub fn ceil_half(value: u32, n: u32) -> u32 {
    if n == 0 {
        return value;
    }
    if n >= 32 {
        return u32::from(value != 0);
    }
    let mask = (1u32 << n) - 1;
    (value >> n) + u32::from(value & mask != 0)
}

/// Allocate a zero-filled buffer, reporting allocation failure as an error.
pub fn try_alloc_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| JbigError::out_of_memory(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// A single packed bit plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create an all-zero bitmap.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let stride = bytes_per_line(width);
        let len = stride
            .checked_mul(height as usize)
            .ok_or_else(|| JbigError::out_of_memory(usize::MAX))?;
        Ok(Self {
            width,
            height,
            stride,
            data: try_alloc_zeroed(len)?,
        })
    }

    /// Wrap an existing packed buffer.
    ///
    /// The buffer must hold exactly `bytes_per_line(width) * height` bytes.
    /// Padding bits at the end of each line are cleared.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let stride = bytes_per_line(width);
        let expected = stride.checked_mul(height as usize);
        if expected != Some(data.len()) {
            return Err(JbigError::invalid_parameter(format!(
                "bitmap of {}x{} needs {} bytes, got {}",
                width,
                height,
                stride.saturating_mul(height as usize),
                data.len()
            )));
        }
        let mut bitmap = Self {
            width,
            height,
            stride,
            data,
        };
        bitmap.clear_padding();
        Ok(bitmap)
    }

    /// Build a bitmap from a pixel function, `true` meaning a set (black) pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut bitmap = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    bitmap.set(x, y, true);
                }
            }
        }
        Ok(bitmap)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in lines.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per line.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total size of the pixel buffer in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// The packed pixel data.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the bitmap and return the packed pixel data.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// One packed line.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    /// One packed line, mutable.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Read a pixel. Coordinates outside the bitmap read as zero.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y as usize * self.stride + (x as usize >> 3)];
        (byte >> (7 - (x & 7))) & 1 != 0
    }

    /// Write a pixel.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the bitmap.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        assert!(x < self.width && y < self.height, "pixel out of range");
        let index = y as usize * self.stride + (x as usize >> 3);
        let mask = 0x80u8 >> (x & 7);
        if value {
            self.data[index] |= mask;
        } else {
            self.data[index] &= !mask;
        }
    }

    /// Copy line `src` over line `dst`.
    pub fn copy_row(&mut self, src: u32, dst: u32) {
        let stride = self.stride;
        let from = src as usize * stride;
        self.data
            .copy_within(from..from + stride, dst as usize * stride);
    }

    /// Zero one line.
    pub fn clear_row(&mut self, y: u32) {
        self.row_mut(y).fill(0);
    }

    /// Extend the bitmap with zeroed lines up to `height`.
    ///
    /// Does nothing if the bitmap is already at least that tall.
    pub fn grow_to(&mut self, height: u32) -> Result<()> {
        if height <= self.height {
            return Ok(());
        }
        let len = self
            .stride
            .checked_mul(height as usize)
            .ok_or_else(|| JbigError::out_of_memory(usize::MAX))?;
        let extra = len - self.data.len();
        self.data
            .try_reserve_exact(extra)
            .map_err(|_| JbigError::out_of_memory(extra))?;
        self.data.resize(len, 0);
        self.height = height;
        Ok(())
    }

    /// Drop all lines from `height` on.
    pub fn truncate(&mut self, height: u32) {
        if height < self.height {
            self.data.truncate(self.stride * height as usize);
            self.height = height;
        }
    }

    /// Clear the unused bits at the end of every line.
    pub fn clear_padding(&mut self) {
        let pad = (self.stride * 8) as u32 - self.width;
        if pad == 0 || self.stride == 0 {
            return;
        }
        let mask = 0xFFu8 << pad;
        let last = self.stride - 1;
        for line in self.data.chunks_exact_mut(self.stride) {
            line[last] &= mask;
        }
    }

    /// Returns true if every pixel is zero.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}
