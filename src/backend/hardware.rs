//! WS2812 strip driven through a Linux SPI device.
//!
//! The data line is generated by the SPI MOSI pin clocked at four times the
//! LED signal frequency: every data bit becomes four SPI bits (`1000` for a
//! zero, `1110` for a one). A frame is encoded in GRB order followed by a
//! run of zero bytes that latches the strip, and is pushed with a single
//! write so the whole frame is committed or none of it is.

use super::{BackendKind, HardwareUnavailable, RenderError, StripBackend};
use crate::buffer::PixelBuffer;
use crate::color::Color;
use crate::config::LedConfig;
use core::time::Duration;
#[cfg(target_os = "linux")]
use log::warn;

/// SPI bits emitted per WS2812 data bit.
pub const SPI_BITS_PER_DATA_BIT: u32 = 4;

/// Encoded bytes per pixel: 24 data bits, two per SPI byte.
pub const BYTES_PER_PIXEL: usize = 12;

/// Zero bytes appended to latch a frame (350 µs at 3.2 MHz).
pub const RESET_BYTES: usize = 140;

// Two data bits per SPI byte, MSB first.
const BIT_PAIR_PATTERNS: [u8; 4] = [0x88, 0x8E, 0xE8, 0xEE];

/// Device node for an SPI channel.
pub fn device_path(channel: u8) -> String {
    format!("/dev/spidev{}.0", channel)
}

/// Encodes `pixels` into the SPI byte stream for one frame.
///
/// `out` is cleared first; its capacity is reused so repeated calls with the
/// same strip length do not allocate.
pub fn encode_frame(pixels: &[Color], invert: bool, out: &mut Vec<u8>) {
    out.clear();
    let mask = if invert { 0xFF } else { 0x00 };

    for pixel in pixels {
        for channel in [pixel.g, pixel.r, pixel.b] {
            for shift in [6, 4, 2, 0] {
                let pair = (channel >> shift) & 0b11;
                out.push(BIT_PAIR_PATTERNS[pair as usize] ^ mask);
            }
        }
    }
    out.extend(core::iter::repeat_n(mask, RESET_BYTES));
}

/// Time the SPI clock needs to shift `bytes` out at `spi_hz`.
pub fn transfer_time(bytes: usize, spi_hz: u32) -> Duration {
    if spi_hz == 0 {
        return Duration::MAX;
    }
    let nanos = (bytes as u128 * 8 * 1_000_000_000) / u128::from(spi_hz);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Fails a push that took longer than `limit`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn check_elapsed(elapsed: Duration, limit: Duration) -> Result<(), RenderError> {
    if elapsed > limit {
        return Err(RenderError::Timeout { elapsed, limit });
    }
    Ok(())
}

/// Physical strip on `/dev/spidevN.0`.
///
/// spidev offers no per-transfer deadline, so the render timeout is checked
/// once the write returns: a push that blocks for too long is reported as
/// [`RenderError::Timeout`] after the fact rather than aborted. [`open`]
/// warns when a full frame cannot be clocked out within the limit at all.
///
/// [`open`]: HardwareBackend::open
pub struct HardwareBackend {
    buffer: PixelBuffer,
    frame: Vec<u8>,
    invert: bool,
    render_timeout: Duration,
    #[cfg(target_os = "linux")]
    spi: spidev::Spidev,
}

impl HardwareBackend {
    /// Opens and configures the SPI device for `config`.
    ///
    /// `config` is expected to have passed [`LedConfig::validate`].
    #[cfg(target_os = "linux")]
    pub fn open(config: &LedConfig) -> Result<Self, HardwareUnavailable> {
        use spidev::{SpiModeFlags, Spidev, SpidevOptions};

        let buffer = PixelBuffer::new(config.pixel_count)
            .ok_or_else(|| HardwareUnavailable::new("pixel count outside buffer capacity"))?;

        let path = device_path(config.channel);
        let mut spi = Spidev::open(&path)
            .map_err(|e| HardwareUnavailable::new(format!("cannot open {}: {}", path, e)))?;

        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.frequency_hz * SPI_BITS_PER_DATA_BIT)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)
            .map_err(|e| HardwareUnavailable::new(format!("cannot configure {}: {}", path, e)))?;

        let frame_len = config.pixel_count * BYTES_PER_PIXEL + RESET_BYTES;
        let minimum = transfer_time(frame_len, config.frequency_hz * SPI_BITS_PER_DATA_BIT);
        if minimum > config.render_timeout {
            warn!(
                "{} byte frame needs {:?} on {}, render timeout is {:?}",
                frame_len, minimum, path, config.render_timeout
            );
        }

        Ok(Self {
            buffer,
            frame: Vec::with_capacity(frame_len),
            invert: config.invert,
            render_timeout: config.render_timeout,
            spi,
        })
    }

    /// SPI strips are only supported on Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn open(_config: &LedConfig) -> Result<Self, HardwareUnavailable> {
        Err(HardwareUnavailable::new("SPI strips require Linux spidev"))
    }

    #[cfg(target_os = "linux")]
    fn push_frame(&mut self) -> Result<(), RenderError> {
        use std::io::Write;

        let started = std::time::Instant::now();
        let written = self
            .spi
            .write(&self.frame)
            .map_err(|e| RenderError::Io(e.to_string()))?;
        if written != self.frame.len() {
            return Err(RenderError::ShortWrite {
                written,
                expected: self.frame.len(),
            });
        }

        // measured after the blocking write, see the type docs
        check_elapsed(started.elapsed(), self.render_timeout)
    }

    #[cfg(not(target_os = "linux"))]
    fn push_frame(&mut self) -> Result<(), RenderError> {
        Err(RenderError::Disconnected)
    }
}

impl StripBackend for HardwareBackend {
    fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    fn render(&mut self) -> Result<(), RenderError> {
        encode_frame(self.buffer.as_slice(), self.invert, &mut self.frame);
        self.push_frame()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }
}
