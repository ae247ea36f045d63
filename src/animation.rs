//! Time-stepped color animations.
//!
//! An animation is a finite sequence of frames. Each frame paints the pixel
//! buffer, renders it through the backend, then waits `frame_delay`.
//! [`AnimationSpec::paint`] computes a single frame from its index alone, so
//! any frame can be reproduced and a run can restart from frame zero at any
//! time.
//!
//! [`AnimationEngine`] drives a spec against a [`StripBackend`]. It can be
//! stepped one frame at a time ([`AnimationEngine::step`]) or run to the end
//! with [`AnimationEngine::run`], which polls a [`StopSignal`] between frames
//! and never in the middle of one.

use crate::backend::{RenderError, StripBackend};
use crate::buffer::PixelBuffer;
use crate::color::{Color, WHITE, wheel};
use crate::config::FrameTimings;
use core::time::Duration;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the strip shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Pattern {
    /// Every pixel holds the command color.
    #[default]
    Solid,
    /// Fill the strip one pixel per frame.
    Wipe,
    /// Every third pixel lit, marching along the strip.
    Chase,
    /// Hue gradient spanning the strip, rotating every frame.
    RainbowCycle,
    /// Marching chase with wheel colors.
    ChaseRainbow,
    /// Strip dark.
    Off,
    /// Each pixel lit white in turn, then dark.
    PixelTest,
}

impl Pattern {
    pub const ALL: [Pattern; 7] = [
        Pattern::Solid,
        Pattern::Wipe,
        Pattern::Chase,
        Pattern::RainbowCycle,
        Pattern::ChaseRainbow,
        Pattern::Off,
        Pattern::PixelTest,
    ];

    /// Name used on the command surface.
    pub fn name(self) -> &'static str {
        match self {
            Pattern::Solid => "solid",
            Pattern::Wipe => "wipe",
            Pattern::Chase => "chase",
            Pattern::RainbowCycle => "rainbowCycle",
            Pattern::ChaseRainbow => "chaseRainbow",
            Pattern::Off => "off",
            Pattern::PixelTest => "pixelTest",
        }
    }

    /// True for patterns that run on the animation engine.
    pub fn is_animated(self) -> bool {
        !matches!(self, Pattern::Solid | Pattern::Off)
    }
}

impl core::fmt::Display for Pattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pattern name not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPattern(pub String);

impl core::fmt::Display for UnknownPattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown pattern {:?}", self.0)
    }
}

impl std::error::Error for UnknownPattern {}

impl core::str::FromStr for Pattern {
    type Err = UnknownPattern;

    /// Matches names case-insensitively, ignoring `_` and `-`
    /// (`rainbowCycle`, `rainbow_cycle` and `RAINBOW-CYCLE` are equal).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = |name: &str| -> String {
            name.chars()
                .filter(|c| *c != '_' && *c != '-')
                .map(|c| c.to_ascii_lowercase())
                .collect()
        };
        let wanted = normalized(s.trim());
        Pattern::ALL
            .into_iter()
            .find(|p| normalized(p.name()) == wanted)
            .ok_or_else(|| UnknownPattern(s.into()))
    }
}

/// Parameters for one animation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSpec {
    pub pattern: Pattern,
    /// Primary color for single-color patterns; white when absent.
    pub color: Option<Color>,
    pub frame_delay: Duration,
    /// Chase passes, rainbow cycles or chase-rainbow rounds.
    pub repeats: u32,
    /// Percentage applied to every painted pixel.
    pub brightness: u8,
}

impl AnimationSpec {
    fn new(pattern: Pattern, color: Option<Color>, frame_delay: Duration, repeats: u32) -> Self {
        Self {
            pattern,
            color,
            frame_delay,
            repeats,
            brightness: 100,
        }
    }

    /// Fill the strip with `color`, one pixel per frame.
    pub fn color_wipe(color: Color, frame_delay: Duration) -> Self {
        Self::new(Pattern::Wipe, Some(color), frame_delay, 1)
    }

    /// Theater chase in `color`, ten passes by default.
    pub fn theater_chase(color: Color, frame_delay: Duration) -> Self {
        Self::new(Pattern::Chase, Some(color), frame_delay, 10)
    }

    /// Rotating rainbow gradient, five wheel cycles by default.
    pub fn rainbow_cycle(frame_delay: Duration) -> Self {
        Self::new(Pattern::RainbowCycle, None, frame_delay, 5)
    }

    /// Theater chase through one full hue cycle.
    pub fn theater_chase_rainbow(frame_delay: Duration) -> Self {
        Self::new(Pattern::ChaseRainbow, None, frame_delay, 1)
    }

    /// Light each pixel in turn.
    pub fn pixel_test(frame_delay: Duration) -> Self {
        Self::new(Pattern::PixelTest, Some(WHITE), frame_delay, 1)
    }

    /// Replaces the repeat count (at least one).
    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    /// Replaces the brightness percentage (clamped to 100).
    pub fn with_brightness(mut self, percent: u8) -> Self {
        self.brightness = percent.min(100);
        self
    }

    /// Spec for an animated pattern using the configured pacing.
    ///
    /// Returns `None` for `Solid` and `Off`, which are rendered directly.
    pub fn for_pattern(
        pattern: Pattern,
        color: Color,
        brightness: u8,
        timings: &FrameTimings,
    ) -> Option<Self> {
        let spec = match pattern {
            Pattern::Solid | Pattern::Off => return None,
            Pattern::Wipe => Self::color_wipe(color, timings.wipe),
            Pattern::Chase => {
                Self::theater_chase(color, timings.chase).with_repeats(timings.chase_repeats)
            }
            Pattern::RainbowCycle => {
                Self::rainbow_cycle(timings.rainbow_cycle).with_repeats(timings.rainbow_cycles)
            }
            Pattern::ChaseRainbow => Self::theater_chase_rainbow(timings.chase_rainbow),
            Pattern::PixelTest => Self::pixel_test(timings.pixel_test),
        };
        Some(spec.with_brightness(brightness))
    }

    /// Number of frames in a run over `pixel_count` pixels.
    ///
    /// Saturates at `u32::MAX` for very large repeat counts.
    pub fn frame_count(&self, pixel_count: usize) -> u32 {
        let n = u32::try_from(pixel_count).unwrap_or(u32::MAX);
        match self.pattern {
            Pattern::Solid | Pattern::Off => 0,
            Pattern::Wipe => n,
            Pattern::Chase => self.repeats.saturating_mul(3),
            Pattern::RainbowCycle => self.repeats.saturating_mul(256),
            Pattern::ChaseRainbow => self.repeats.saturating_mul(256 * 3),
            Pattern::PixelTest => n.saturating_add(1),
        }
    }

    /// Paints frame `frame` into `buffer`.
    pub fn paint(&self, frame: u32, buffer: &mut PixelBuffer) {
        let n = buffer.len();
        let color = self.color.unwrap_or(WHITE).scaled(self.brightness);

        match self.pattern {
            Pattern::Solid | Pattern::Off => {}
            Pattern::Wipe => buffer.set(frame as usize, color),
            Pattern::Chase => {
                let phase = (frame % 3) as usize;
                buffer.clear();
                for i in (phase..n).step_by(3) {
                    buffer.set(i, color);
                }
            }
            Pattern::RainbowCycle => {
                for i in 0..n {
                    // wrapping keeps the position mod 256
                    let pos = ((i * 256 / n) as u32).wrapping_add(frame);
                    buffer.set(i, wheel(pos).scaled(self.brightness));
                }
            }
            Pattern::ChaseRainbow => {
                let hue = (frame / 3) % 256;
                let phase = (frame % 3) as usize;
                buffer.clear();
                for p in (phase..n).step_by(3) {
                    buffer.set(p, wheel((p as u32 + hue) % 255).scaled(self.brightness));
                }
            }
            Pattern::PixelTest => {
                buffer.clear();
                buffer.set(frame as usize, color);
            }
        }
    }
}

/// Lifecycle of an [`AnimationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// Nothing started yet.
    Idle,
    /// Frames remain.
    Running,
    /// Every frame rendered.
    Complete,
    /// Stopped between frames on request.
    Cancelled,
    /// A frame failed to render.
    Failed,
}

/// Result of one [`AnimationEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Frame `index` was rendered; wait `delay` before the next step.
    Frame { index: u32, delay: Duration },
    /// No frames remain.
    Complete { frames: u32 },
}

/// How a blocking [`AnimationEngine::run`] ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { frames: u32 },
    Cancelled { frames: u32 },
}

/// Errors from driving an animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Operation called from an invalid state.
    InvalidState {
        expected: &'static str,
        actual: EngineState,
    },
    /// A frame could not be pushed. The run is aborted, not retried.
    RenderFailure {
        pattern: Pattern,
        /// Index of the last frame that did render, if any.
        last_frame: Option<u32>,
        reason: RenderError,
    },
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EngineError::InvalidState { expected, actual } => {
                write!(
                    f,
                    "invalid state: expected {}, but engine is in {:?}",
                    expected, actual
                )
            }
            EngineError::RenderFailure {
                pattern,
                last_frame: Some(frame),
                reason,
            } => {
                write!(f, "{} aborted after frame {}: {}", pattern, frame, reason)
            }
            EngineError::RenderFailure {
                pattern,
                last_frame: None,
                reason,
            } => {
                write!(f, "{} aborted before its first frame: {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Source of cancellation for [`AnimationEngine::run`].
pub trait StopSignal {
    /// True once the running animation should stop.
    fn stop_requested(&self) -> bool;

    /// Paces the gap between frames.
    ///
    /// Waits up to `delay` and returns true if a stop was requested before or
    /// during the wait. Implementations may return early on a stop.
    fn wait(&mut self, delay: Duration) -> bool;
}

/// Shareable stop flag that paces frames with `thread::sleep`.
///
/// A stop is noticed at the end of the current frame delay at the latest.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder's animation to stop at the next frame boundary.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl StopSignal for StopFlag {
    fn stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn wait(&mut self, delay: Duration) -> bool {
        if !self.stop_requested() {
            std::thread::sleep(delay);
        }
        self.stop_requested()
    }
}

/// Drives one animation at a time against a backend.
#[derive(Debug, Clone)]
pub struct AnimationEngine {
    spec: Option<AnimationSpec>,
    state: EngineState,
    total_frames: u32,
    next_frame: u32,
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self {
            spec: None,
            state: EngineState::Idle,
            total_frames: 0,
            next_frame: 0,
        }
    }

    /// Starts `spec` from its first frame, replacing any current run.
    pub fn start(&mut self, spec: AnimationSpec, pixel_count: usize) {
        self.total_frames = spec.frame_count(pixel_count);
        self.next_frame = 0;
        self.spec = Some(spec);
        self.state = EngineState::Running;
    }

    /// Restarts the current spec from frame zero.
    ///
    /// Can be called from any state except `Idle`.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        if self.spec.is_none() {
            return Err(EngineError::InvalidState {
                expected: "Running, Complete, Cancelled, or Failed",
                actual: self.state,
            });
        }
        self.next_frame = 0;
        self.state = EngineState::Running;
        Ok(())
    }

    /// Paints and renders the next frame.
    ///
    /// Must be called from `Running` state. A render failure moves the engine
    /// to `Failed`; the frame is not retried.
    pub fn step(&mut self, backend: &mut dyn StripBackend) -> Result<StepOutcome, EngineError> {
        let spec = match (self.state, self.spec.as_ref()) {
            (EngineState::Running, Some(spec)) => *spec,
            _ => {
                return Err(EngineError::InvalidState {
                    expected: "Running",
                    actual: self.state,
                });
            }
        };

        if self.next_frame >= self.total_frames {
            self.state = EngineState::Complete;
            return Ok(StepOutcome::Complete {
                frames: self.total_frames,
            });
        }

        let index = self.next_frame;
        spec.paint(index, backend.buffer_mut());
        if let Err(reason) = backend.render() {
            self.state = EngineState::Failed;
            return Err(EngineError::RenderFailure {
                pattern: spec.pattern,
                last_frame: index.checked_sub(1),
                reason,
            });
        }

        self.next_frame += 1;
        Ok(StepOutcome::Frame {
            index,
            delay: spec.frame_delay,
        })
    }

    /// Stops the current run between frames.
    ///
    /// Returns false when nothing was running.
    pub fn cancel(&mut self) -> bool {
        if self.state != EngineState::Running {
            return false;
        }
        self.state = EngineState::Cancelled;
        true
    }

    /// Runs the started animation until it completes, fails or `stop` fires.
    pub fn run(
        &mut self,
        backend: &mut dyn StripBackend,
        stop: &mut dyn StopSignal,
    ) -> Result<RunOutcome, EngineError> {
        if let Some(spec) = self.spec.as_ref() {
            debug!(
                "{} started: {} frames every {:?}",
                spec.pattern, self.total_frames, spec.frame_delay
            );
        }

        loop {
            if stop.stop_requested() {
                self.cancel();
                return Ok(RunOutcome::Cancelled {
                    frames: self.frames_rendered(),
                });
            }

            match self.step(backend)? {
                StepOutcome::Frame { delay, .. } => {
                    if stop.wait(delay) {
                        self.cancel();
                        return Ok(RunOutcome::Cancelled {
                            frames: self.frames_rendered(),
                        });
                    }
                }
                StepOutcome::Complete { frames } => {
                    return Ok(RunOutcome::Completed { frames });
                }
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Spec of the current or last run.
    pub fn spec(&self) -> Option<&AnimationSpec> {
        self.spec.as_ref()
    }

    /// Frames rendered so far in the current run.
    pub fn frames_rendered(&self) -> u32 {
        self.next_frame
    }

    /// Frames the current run will render in total.
    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new()
    }
}
