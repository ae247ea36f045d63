//! Fixed-length pixel storage.

use crate::color::{BLACK, Color};
use heapless::Vec;

/// Upper bound on strip length supported by a single buffer.
pub const MAX_PIXELS: usize = 256;

/// Strip length used when nothing else is configured.
pub const DEFAULT_PIXEL_COUNT: usize = 12;

/// Color returned by [`PixelBuffer::get`] for indices outside the strip.
pub const OUT_OF_RANGE: Color = BLACK;

/// Ordered sequence of pixel colors whose length is fixed at construction.
///
/// Storage is inline (no heap), so mutating a buffer inside an animation
/// loop never allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<Color, MAX_PIXELS>,
}

impl PixelBuffer {
    /// Creates a cleared buffer of `len` pixels.
    ///
    /// Returns `None` when `len` is zero or exceeds [`MAX_PIXELS`].
    pub fn new(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let mut pixels = Vec::new();
        pixels.resize(len, BLACK).ok()?;
        Some(Self { pixels })
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false; a buffer holds at least one pixel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Sets one pixel. Indices outside the strip are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, color: Color) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    /// Returns one pixel, or [`OUT_OF_RANGE`] outside the strip.
    #[inline]
    pub fn get(&self, index: usize) -> Color {
        self.pixels.get(index).copied().unwrap_or(OUT_OF_RANGE)
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Color) {
        self.pixels.iter_mut().for_each(|pixel| *pixel = color);
    }

    /// Sets every pixel to black.
    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    /// Current pixel colors in strip order.
    #[inline]
    pub fn as_slice(&self) -> &[Color] {
        &self.pixels
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        let mut pixels = Vec::new();
        pixels.extend(core::iter::repeat_n(BLACK, DEFAULT_PIXEL_COUNT));
        Self { pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BLUE, RED};

    #[test]
    fn new_rejects_zero_and_oversized_lengths() {
        assert!(PixelBuffer::new(0).is_none());
        assert!(PixelBuffer::new(MAX_PIXELS + 1).is_none());
        assert_eq!(PixelBuffer::new(MAX_PIXELS).map(|b| b.len()), Some(MAX_PIXELS));
    }

    #[test]
    fn default_has_twelve_black_pixels() {
        let buffer = PixelBuffer::default();
        assert_eq!(buffer.len(), DEFAULT_PIXEL_COUNT);
        assert!(buffer.as_slice().iter().all(|p| p.is_black()));
    }

    #[test]
    fn set_out_of_range_is_a_no_op() {
        let mut buffer = PixelBuffer::new(4).unwrap();
        buffer.set(4, RED);
        buffer.set(usize::MAX, RED);
        assert!(buffer.as_slice().iter().all(|p| p.is_black()));
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn get_out_of_range_returns_sentinel() {
        let mut buffer = PixelBuffer::new(3).unwrap();
        buffer.fill(BLUE);
        assert_eq!(buffer.get(2), BLUE);
        assert_eq!(buffer.get(3), OUT_OF_RANGE);
    }

    #[test]
    fn clear_blacks_out_every_pixel() {
        let mut buffer = PixelBuffer::new(5).unwrap();
        buffer.fill(RED);
        buffer.clear();
        assert_eq!(buffer.as_slice(), &[BLACK; 5]);
    }
}
