#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`Color`**: 8-bit RGB value with clamping constructors and the 256-step hue `wheel`
//! - **`PixelBuffer`**: Fixed-length pixel storage owned by a backend
//! - **`StripBackend`**: Trait for rendering targets (`HardwareBackend`, `SimulatedBackend`)
//! - **`AnimationSpec`**: Pattern, color, frame delay and repeat count for one animation run
//! - **`AnimationEngine`**: Steps an animation frame by frame with cooperative cancellation
//! - **`StopSignal`**: Trait polled by the engine between frames
//! - **`LedService`**: Facade that owns a strip through a worker thread and keeps `StripState`
//! - **`LedConfig`**: Strip geometry, wiring, pacing and backend preference
//!
//! Brightness is applied when pixels are painted. `StripState` always reports the
//! nominal color a caller asked for.

pub mod animation;
pub mod backend;
pub mod buffer;
pub mod color;
pub mod config;
pub mod service;

pub use animation::{
    AnimationEngine, AnimationSpec, EngineError, EngineState, Pattern, RunOutcome, StepOutcome,
    StopFlag, StopSignal, UnknownPattern,
};
pub use backend::{
    BackendKind, Capability, HardwareBackend, HardwareUnavailable, RenderError, SimulatedBackend,
    StripBackend, open_backend,
};
pub use buffer::{MAX_PIXELS, PixelBuffer};
pub use color::{Color, wheel};
pub use config::{BackendPreference, ConfigError, FrameTimings, LedConfig};
pub use service::{
    CommandColor, EngineStatus, HardwareInfo, LedService, ServiceError, StripCommand, StripState,
};
