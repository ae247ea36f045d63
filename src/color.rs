//! RGB color value and the 256-position hue wheel.
//!
//! [`Color`] is the 8-bit-per-channel value stored in a
//! [`PixelBuffer`](crate::PixelBuffer). Constructors taking wider integers
//! clamp each channel to `0..=255` instead of rejecting the input, so callers
//! forwarding raw request values always get a displayable color.

use palette::{FromColor, Hsv, Srgb};

/// An immutable RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Creates a color from already in-range channels.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color, clamping each channel to `0..=255`.
    #[inline]
    pub fn new(r: i32, g: i32, b: i32) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
        }
    }

    /// Creates a color from HSV components.
    ///
    /// `hue` is in degrees and wraps; `saturation` and `value` are clamped
    /// to `0.0..=1.0`.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hsv = Hsv::new(hue, saturation.clamp(0.0, 1.0), value.clamp(0.0, 1.0));
        let rgb = Srgb::<f32>::from_color(hsv);
        let rgb: Srgb<u8> = rgb.into_format();
        Self::rgb(rgb.red, rgb.green, rgb.blue)
    }

    /// Returns this color scaled by `percent` (clamped to `0..=100`).
    ///
    /// Each channel becomes `channel * percent / 100`, truncated.
    #[inline]
    pub fn scaled(self, percent: u8) -> Self {
        let percent = u16::from(percent.min(100));
        let scale = |c: u8| ((u16::from(c) * percent) / 100) as u8;
        Self::rgb(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Sum of all three channels.
    #[inline]
    pub fn intensity(self) -> u16 {
        u16::from(self.r) + u16::from(self.g) + u16::from(self.b)
    }

    /// True when every channel is zero.
    #[inline]
    pub fn is_black(self) -> bool {
        self == BLACK
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RGB({:3},{:3},{:3})", self.r, self.g, self.b)
    }
}

pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const WHITE: Color = Color::rgb(255, 255, 255);
pub const RED: Color = Color::rgb(255, 0, 0);
pub const GREEN: Color = Color::rgb(0, 255, 0);
pub const BLUE: Color = Color::rgb(0, 0, 255);

/// Clamps a brightness percentage to `0..=100`.
#[inline]
pub fn clamp_brightness(percent: i32) -> u8 {
    percent.clamp(0, 100) as u8
}

#[inline]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Maps a wheel position to a fully saturated hue.
///
/// The wheel runs green → red → blue → green in three 85-wide bands. Positions
/// of 256 and above wrap modulo 256.
pub fn wheel(pos: u32) -> Color {
    let pos = (pos % 256) as u8;
    match pos {
        0..85 => Color::rgb(pos * 3, 255 - pos * 3, 0),
        85..170 => {
            let p = pos - 85;
            Color::rgb(255 - p * 3, 0, p * 3)
        }
        _ => {
            let p = pos - 170;
            Color::rgb(0, p * 3, 255 - p * 3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_channel_step(a: Color, b: Color) -> u8 {
        a.r.abs_diff(b.r).max(a.g.abs_diff(b.g)).max(a.b.abs_diff(b.b))
    }

    #[test]
    fn new_clamps_out_of_range_channels() {
        assert_eq!(Color::new(-20, 300, 128), Color::rgb(0, 255, 128));
    }

    #[test]
    fn wheel_band_starts() {
        assert_eq!(wheel(0), Color::rgb(0, 255, 0));
        assert_eq!(wheel(85), Color::rgb(255, 0, 0));
        assert_eq!(wheel(170), Color::rgb(0, 0, 255));
        assert_eq!(wheel(255), Color::rgb(0, 255, 0));
    }

    #[test]
    fn wheel_is_continuous_across_the_full_cycle() {
        for pos in 0..256 {
            let step = max_channel_step(wheel(pos), wheel(pos + 1));
            assert!(step <= 3, "jump of {} between {} and {}", step, pos, pos + 1);
        }
    }

    #[test]
    fn wheel_wraps_modulo_256() {
        assert_eq!(wheel(256), wheel(0));
        assert_eq!(wheel(256 * 3 + 100), wheel(100));
    }

    #[test]
    fn scaled_halves_channels() {
        assert_eq!(Color::rgb(200, 100, 50).scaled(50), Color::rgb(100, 50, 25));
        assert_eq!(Color::rgb(200, 100, 50).scaled(100), Color::rgb(200, 100, 50));
        assert_eq!(Color::rgb(200, 100, 50).scaled(0), BLACK);
    }

    #[test]
    fn scaled_treats_over_100_as_full() {
        assert_eq!(WHITE.scaled(250), WHITE);
    }

    #[test]
    fn clamp_brightness_bounds() {
        assert_eq!(clamp_brightness(-5), 0);
        assert_eq!(clamp_brightness(42), 42);
        assert_eq!(clamp_brightness(180), 100);
    }

    #[test]
    fn from_hsv_primaries() {
        assert_eq!(Color::from_hsv(0.0, 1.0, 1.0), RED);
        assert_eq!(Color::from_hsv(120.0, 1.0, 1.0), GREEN);
        assert_eq!(Color::from_hsv(240.0, 1.0, 1.0), BLUE);
        assert_eq!(Color::from_hsv(0.0, 1.0, 0.0), BLACK);
    }
}
