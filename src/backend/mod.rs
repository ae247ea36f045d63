//! Rendering targets for a pixel buffer.
//!
//! A [`StripBackend`] owns the [`PixelBuffer`] it displays. Callers mutate
//! pixels through the backend and then call [`StripBackend::render`] to
//! commit the whole buffer as one frame.
//!
//! Two implementations exist: [`HardwareBackend`] pushes frames to a WS2812
//! strip over SPI, and [`SimulatedBackend`] keeps frames in memory and can
//! print them. [`open_backend`] picks one at startup, falling back to the
//! simulation whenever hardware cannot be opened.

pub mod hardware;
pub mod simulated;

pub use hardware::HardwareBackend;
pub use simulated::SimulatedBackend;

use crate::buffer::PixelBuffer;
use crate::color::Color;
use crate::config::{BackendPreference, ConfigError, LedConfig};
use core::time::Duration;
use log::{info, warn};

/// Kind of surface a backend renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum BackendKind {
    Hardware,
    Simulated,
}

/// Trait for strip rendering targets.
///
/// Implementations own the pixel buffer. The provided pixel methods only
/// touch that buffer; nothing reaches the strip until `render` succeeds.
pub trait StripBackend: Send {
    /// The buffer being displayed.
    fn buffer(&self) -> &PixelBuffer;

    /// Mutable access to the buffer being displayed.
    fn buffer_mut(&mut self) -> &mut PixelBuffer;

    /// Commits the whole buffer as one frame.
    ///
    /// Either every pixel of the frame is pushed or the call fails and the
    /// frame counts as not committed.
    fn render(&mut self) -> Result<(), RenderError>;

    /// What this backend renders to.
    fn kind(&self) -> BackendKind;

    /// Number of pixels on the strip.
    fn pixel_count(&self) -> usize {
        self.buffer().len()
    }

    /// Sets one pixel. Out-of-range indices are ignored.
    fn set_pixel(&mut self, index: usize, color: Color) {
        self.buffer_mut().set(index, color);
    }

    /// Reads one pixel from the buffer.
    fn pixel(&self, index: usize) -> Color {
        self.buffer().get(index)
    }

    /// Blacks out the buffer without rendering.
    fn clear(&mut self) {
        self.buffer_mut().clear();
    }
}

/// A frame could not be pushed to the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The device rejected the write.
    Io(String),

    /// Fewer bytes than the encoded frame reached the device.
    ShortWrite { written: usize, expected: usize },

    /// The push took longer than the configured limit.
    Timeout { elapsed: Duration, limit: Duration },

    /// The strip is no longer connected.
    Disconnected,
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RenderError::Io(reason) => write!(f, "device write failed: {}", reason),
            RenderError::ShortWrite { written, expected } => {
                write!(f, "short write: {} of {} bytes", written, expected)
            }
            RenderError::Timeout { elapsed, limit } => {
                write!(f, "render took {:?} (limit {:?})", elapsed, limit)
            }
            RenderError::Disconnected => write!(f, "strip disconnected"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Hardware backend could not be initialised. Triggers fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareUnavailable {
    pub reason: String,
}

impl HardwareUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl core::fmt::Display for HardwareUnavailable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LED hardware unavailable: {}", self.reason)
    }
}

impl std::error::Error for HardwareUnavailable {}

/// Result of the startup platform probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Capability {
    /// The platform looks like it has a strip attached.
    Hardware,
    /// No strip hardware expected.
    SimulationOnly,
}

const PLATFORM_SIGNATURE: &str = "raspberry pi";

impl Capability {
    /// Probes the running system for LED hardware support.
    pub fn probe() -> Self {
        let sources = ["/proc/device-tree/model", "/proc/cpuinfo"];
        let detected = sources.iter().any(|path| {
            std::fs::read(path)
                .map(|bytes| Self::matches_signature(&String::from_utf8_lossy(&bytes)))
                .unwrap_or(false)
        });

        if detected {
            Capability::Hardware
        } else {
            Capability::SimulationOnly
        }
    }

    /// True when a platform description names a supported board.
    pub fn matches_signature(description: &str) -> bool {
        description.to_ascii_lowercase().contains(PLATFORM_SIGNATURE)
    }

    /// Capability implied by a backend preference, probing only for `Auto`.
    pub fn for_preference(preference: BackendPreference) -> Self {
        match preference {
            BackendPreference::Auto => Self::probe(),
            BackendPreference::Hardware => Capability::Hardware,
            BackendPreference::Simulated | BackendPreference::Console => {
                Capability::SimulationOnly
            }
        }
    }
}

/// Opens the backend described by `config`.
///
/// Configuration errors are fatal. When `capability` allows hardware but the
/// device cannot be opened, a simulated backend is returned instead.
pub fn open_backend(
    config: &LedConfig,
    capability: Capability,
) -> Result<Box<dyn StripBackend>, ConfigError> {
    open_with(config, capability, HardwareBackend::open)
}

/// [`open_backend`] with the hardware opener supplied by the caller.
fn open_with<B, F>(
    config: &LedConfig,
    capability: Capability,
    open_hardware: F,
) -> Result<Box<dyn StripBackend>, ConfigError>
where
    B: StripBackend + 'static,
    F: FnOnce(&LedConfig) -> Result<B, HardwareUnavailable>,
{
    config.validate()?;

    if capability == Capability::Hardware {
        match open_hardware(config) {
            Ok(backend) => {
                info!(
                    "LED strip: {} pixels on SPI channel {} (GPIO{})",
                    config.pixel_count, config.channel, config.pin
                );
                return Ok(Box::new(backend));
            }
            Err(err) => warn!("{}; using simulated strip", err),
        }
    }

    let backend = if config.backend == BackendPreference::Console {
        SimulatedBackend::console(config.pixel_count)
    } else {
        SimulatedBackend::new(config.pixel_count)
    };
    info!("LED strip: simulated, {} pixels", config.pixel_count);
    Ok(Box::new(backend.ok_or(ConfigError::InvalidPixelCount {
        count: config.pixel_count,
        max: crate::MAX_PIXELS,
    })?))
}
