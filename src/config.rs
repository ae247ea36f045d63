//! Strip configuration and startup validation.
//!
//! Defaults describe a 12-pixel WS2812 strip on SPI bus 0 (data on GPIO10),
//! driven at 800 kHz. Any field can be overridden from the environment with
//! [`LedConfig::from_env`].

use crate::buffer::{DEFAULT_PIXEL_COUNT, MAX_PIXELS};
use core::time::Duration;

/// SPI bus used when none is configured.
pub const DEFAULT_CHANNEL: u8 = 0;

/// WS2812 signal frequency.
pub const DEFAULT_FREQUENCY_HZ: u32 = 800_000;

/// WS2811 strips run at half the WS2812 rate; nothing slower is supported.
pub const MIN_FREQUENCY_HZ: u32 = 400_000;

/// Nominal brightness applied before the first command arrives.
pub const DEFAULT_BRIGHTNESS: u8 = 50;

/// Longest a single hardware frame push may take before it counts as failed.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_millis(100);

/// Returns the MOSI pin of an SPI channel, if the channel exists.
pub fn mosi_pin(channel: u8) -> Option<u8> {
    match channel {
        0 => Some(10),
        1 => Some(20),
        _ => None,
    }
}

/// Which backend the service should try to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackendPreference {
    /// Probe the platform; use hardware when it looks available.
    #[default]
    Auto,
    /// Always try hardware first (still falls back on failure).
    Hardware,
    /// Silent simulated strip.
    Simulated,
    /// Simulated strip printed to stdout.
    Console,
}

impl core::str::FromStr for BackendPreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "hardware" => Ok(Self::Hardware),
            "simulated" => Ok(Self::Simulated),
            "console" => Ok(Self::Console),
            _ => Err(ConfigError::InvalidValue {
                key: "LED_BACKEND",
                value: s.into(),
            }),
        }
    }
}

/// Frame pacing and repeat counts for each animated pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimings {
    pub wipe: Duration,
    pub chase: Duration,
    pub rainbow_cycle: Duration,
    pub chase_rainbow: Duration,
    pub pixel_test: Duration,
    /// Full three-phase passes of a theater chase.
    pub chase_repeats: u32,
    /// Complete trips around the hue wheel for a rainbow cycle.
    pub rainbow_cycles: u32,
}

impl Default for FrameTimings {
    fn default() -> Self {
        Self {
            wipe: Duration::from_millis(50),
            chase: Duration::from_millis(50),
            rainbow_cycle: Duration::from_millis(10),
            chase_rainbow: Duration::from_millis(50),
            pixel_test: Duration::from_millis(300),
            chase_repeats: 10,
            rainbow_cycles: 5,
        }
    }
}

/// Everything needed to open a strip and run the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedConfig {
    pub pixel_count: usize,
    pub channel: u8,
    pub pin: u8,
    pub frequency_hz: u32,
    /// Invert the data line (NPN level shifter).
    pub invert: bool,
    pub brightness: u8,
    pub backend: BackendPreference,
    pub render_timeout: Duration,
    pub timings: FrameTimings,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            pixel_count: DEFAULT_PIXEL_COUNT,
            channel: DEFAULT_CHANNEL,
            pin: 10,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            invert: false,
            brightness: DEFAULT_BRIGHTNESS,
            backend: BackendPreference::Auto,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            timings: FrameTimings::default(),
        }
    }
}

impl LedConfig {
    /// Defaults overlaid with `LED_*` environment variables.
    ///
    /// Recognised keys: `LED_COUNT`, `LED_CHANNEL`, `LED_STRIP_PIN`,
    /// `LED_FREQ_HZ`, `LED_INVERT`, `LED_BRIGHTNESS`, `LED_BACKEND`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("LED_COUNT") {
            config.pixel_count = parse("LED_COUNT", &v)?;
        }
        if let Some(v) = lookup("LED_CHANNEL") {
            config.channel = parse("LED_CHANNEL", &v)?;
            // Follow the channel unless a pin is given explicitly.
            if let Some(pin) = mosi_pin(config.channel) {
                config.pin = pin;
            }
        }
        if let Some(v) = lookup("LED_STRIP_PIN") {
            config.pin = parse("LED_STRIP_PIN", &v)?;
        }
        if let Some(v) = lookup("LED_FREQ_HZ") {
            config.frequency_hz = parse("LED_FREQ_HZ", &v)?;
        }
        if let Some(v) = lookup("LED_INVERT") {
            config.invert = parse_bool("LED_INVERT", &v)?;
        }
        if let Some(v) = lookup("LED_BRIGHTNESS") {
            config.brightness = parse::<u8>("LED_BRIGHTNESS", &v)?.min(100);
        }
        if let Some(v) = lookup("LED_BACKEND") {
            config.backend = v.parse()?;
        }

        Ok(config)
    }

    /// Checks the strip geometry and wiring.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixel_count == 0 || self.pixel_count > MAX_PIXELS {
            return Err(ConfigError::InvalidPixelCount {
                count: self.pixel_count,
                max: MAX_PIXELS,
            });
        }

        let expected = mosi_pin(self.channel).ok_or(ConfigError::InvalidChannel(self.channel))?;
        if self.pin != expected {
            return Err(ConfigError::InvalidPin {
                pin: self.pin,
                channel: self.channel,
                expected,
            });
        }

        if !(MIN_FREQUENCY_HZ..=DEFAULT_FREQUENCY_HZ).contains(&self.frequency_hz) {
            return Err(ConfigError::InvalidFrequency(self.frequency_hz));
        }

        Ok(())
    }
}

fn parse<T: core::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.into(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.into(),
        }),
    }
}

/// Invalid strip configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Pixel count is zero or above the buffer capacity.
    InvalidPixelCount { count: usize, max: usize },

    /// No SPI bus with this number.
    InvalidChannel(u8),

    /// Pin is not the data pin of the configured channel.
    InvalidPin { pin: u8, channel: u8, expected: u8 },

    /// Signal frequency outside the supported range.
    InvalidFrequency(u32),

    /// An environment value could not be parsed.
    InvalidValue { key: &'static str, value: String },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::InvalidPixelCount { count, max } => {
                write!(f, "pixel count {} outside 1..={}", count, max)
            }
            ConfigError::InvalidChannel(channel) => {
                write!(f, "no SPI channel {}", channel)
            }
            ConfigError::InvalidPin {
                pin,
                channel,
                expected,
            } => {
                write!(
                    f,
                    "GPIO{} cannot drive channel {} (data pin is GPIO{})",
                    pin, channel, expected
                )
            }
            ConfigError::InvalidFrequency(hz) => {
                write!(
                    f,
                    "signal frequency {} Hz outside {}..={} Hz",
                    hz, MIN_FREQUENCY_HZ, DEFAULT_FREQUENCY_HZ
                )
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value {:?} for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
