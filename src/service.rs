//! Command facade for one LED strip.
//!
//! [`LedService`] keeps the externally visible [`StripState`] and hands every
//! command to a dedicated worker thread that owns the backend. The hand-off is
//! a single slot: a new command replaces one that is still pending and
//! interrupts a running animation at its next frame boundary, so frames of two
//! animations never interleave on the strip.
//!
//! ```no_run
//! use led_strip_engine::{Color, LedConfig, LedService, Pattern};
//!
//! let service = LedService::new(LedConfig::default())?;
//! service.apply_state(true, Color::rgb(255, 80, 0), 60, Pattern::Solid)?;
//! service.apply_state(true, Color::rgb(0, 0, 255), 60, Pattern::Chase)?;
//! println!("{:?}", service.status());
//! service.turn_off()?;
//! # Ok::<(), led_strip_engine::ServiceError>(())
//! ```

use crate::animation::{
    AnimationEngine, AnimationSpec, EngineError, Pattern, RunOutcome, StopSignal, UnknownPattern,
};
use crate::backend::{BackendKind, Capability, StripBackend, open_backend};
use crate::color::{BLACK, Color, clamp_brightness};
use crate::config::{ConfigError, FrameTimings, LedConfig};
use core::time::Duration;
use log::{debug, error, info, warn};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

/// Last command applied to the strip.
///
/// Holds nominal values: `color` is never scaled by `brightness`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StripState {
    pub is_on: bool,
    pub color: Color,
    /// Percentage, 0 to 100.
    pub brightness: u8,
    pub pattern: Pattern,
    /// When the last command was applied; `None` before the first one.
    pub last_updated: Option<SystemTime>,
}

impl StripState {
    fn initial(brightness: u8) -> Self {
        Self {
            is_on: false,
            color: BLACK,
            brightness,
            pattern: Pattern::Solid,
            last_updated: None,
        }
    }
}

/// Color channels as received from an external caller, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandColor {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

/// Unvalidated set-state command.
///
/// Channels and brightness are clamped when applied; the pattern name must be
/// one of the [`Pattern`] names.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct StripCommand {
    pub is_on: bool,
    pub color: CommandColor,
    pub brightness: i32,
    pub pattern: String,
}

impl Default for StripCommand {
    fn default() -> Self {
        Self {
            is_on: false,
            color: CommandColor::default(),
            brightness: crate::config::DEFAULT_BRIGHTNESS as i32,
            pattern: Pattern::Solid.name().into(),
        }
    }
}

/// What the animation worker is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// No animation has run since the last static frame.
    Idle,
    Running(Pattern),
    Completed { pattern: Pattern, frames: u32 },
    Cancelled { pattern: Pattern, frames: u32 },
    /// The last frame push failed.
    Failed(EngineError),
    /// The worker has exited; commands fail with
    /// [`ServiceError::WorkerUnavailable`].
    Stopped,
}

/// Description of the strip behind a service.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct HardwareInfo {
    pub backend: BackendKind,
    pub pixel_count: usize,
    pub channel: u8,
    pub pin: u8,
    pub frequency_hz: u32,
    pub invert: bool,
}

/// Errors returned by [`LedService`] commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Strip configuration rejected at startup.
    Configuration(ConfigError),
    /// A frame could not be rendered.
    Render(EngineError),
    /// Command could not be interpreted.
    InvalidCommand(String),
    /// A newer command replaced this one before the worker picked it up.
    Superseded,
    /// The worker thread is not running.
    WorkerUnavailable,
}

impl core::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ServiceError::Configuration(e) => write!(f, "configuration error: {}", e),
            ServiceError::Render(e) => write!(f, "render failure: {}", e),
            ServiceError::InvalidCommand(reason) => write!(f, "invalid command: {}", reason),
            ServiceError::Superseded => write!(f, "command superseded by a newer one"),
            ServiceError::WorkerUnavailable => write!(f, "LED worker is not running"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Configuration(e) => Some(e),
            ServiceError::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(e: ConfigError) -> Self {
        ServiceError::Configuration(e)
    }
}

impl From<EngineError> for ServiceError {
    fn from(e: EngineError) -> Self {
        ServiceError::Render(e)
    }
}

impl From<UnknownPattern> for ServiceError {
    fn from(e: UnknownPattern) -> Self {
        ServiceError::InvalidCommand(e.to_string())
    }
}

type Reply = mpsc::Sender<Result<(), ServiceError>>;

enum Work {
    /// Fill the strip with one color and render once.
    Paint { color: Color, pattern: Pattern },
    Animate(AnimationSpec),
}

struct Job {
    work: Work,
    reply: Reply,
}

impl Job {
    fn respond(&self, result: Result<(), ServiceError>) {
        // The caller may have stopped waiting.
        let _ = self.reply.send(result);
    }
}

struct Slot {
    pending: Option<Job>,
    /// Bumped on every submitted job.
    generation: u64,
    shutdown: bool,
    status: EngineStatus,
}

impl Slot {
    fn interrupts(&self, generation: u64) -> bool {
        self.shutdown || self.generation != generation
    }
}

struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Places `job` in the slot, rejecting whatever was still waiting there.
    fn submit(&self, job: Job) -> Result<(), ServiceError> {
        let mut slot = self.lock();
        if slot.shutdown {
            return Err(ServiceError::WorkerUnavailable);
        }
        if let Some(replaced) = slot.pending.replace(job) {
            replaced.respond(Err(ServiceError::Superseded));
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.wake.notify_all();
        Ok(())
    }

    /// Blocks until a job arrives. Returns `None` once shut down.
    fn next_job(&self) -> Option<(Job, u64)> {
        let slot = self.lock();
        let mut slot = self
            .wake
            .wait_while(slot, |s| s.pending.is_none() && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);

        if slot.shutdown {
            if let Some(job) = slot.pending.take() {
                job.respond(Err(ServiceError::WorkerUnavailable));
            }
            return None;
        }
        let generation = slot.generation;
        slot.pending.take().map(|job| (job, generation))
    }

    fn set_status(&self, status: EngineStatus) {
        self.lock().status = status;
    }

    /// Marks the worker gone and rejects whatever is still waiting.
    fn close(&self) {
        let mut slot = self.lock();
        slot.shutdown = true;
        slot.status = EngineStatus::Stopped;
        if let Some(job) = slot.pending.take() {
            job.respond(Err(ServiceError::WorkerUnavailable));
        }
        self.wake.notify_all();
    }
}

/// Closes the slot when the worker exits, including by panic.
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("LED worker panicked; strip left as is");
        }
        self.0.close();
    }
}

/// Stops a run once a newer job is submitted or the service shuts down.
struct GenerationStop<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl StopSignal for GenerationStop<'_> {
    fn stop_requested(&self) -> bool {
        self.shared.lock().interrupts(self.generation)
    }

    fn wait(&mut self, delay: Duration) -> bool {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .wake
            .wait_timeout_while(slot, delay, |s| !s.interrupts(self.generation))
            .unwrap_or_else(PoisonError::into_inner);
        slot.interrupts(self.generation)
    }
}

struct Worker {
    backend: Box<dyn StripBackend>,
    engine: AnimationEngine,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(mut self) {
        let _exit = ExitGuard(Arc::clone(&self.shared));

        while let Some((job, generation)) = self.shared.next_job() {
            match job.work {
                Work::Paint { color, pattern } => {
                    let result = self.paint(color, pattern);
                    job.respond(result);
                }
                Work::Animate(spec) => {
                    self.engine.start(spec, self.backend.pixel_count());
                    self.shared.set_status(EngineStatus::Running(spec.pattern));
                    job.respond(Ok(()));
                    self.animate(spec.pattern, generation);
                }
            }
        }

        self.backend.clear();
        match self.backend.render() {
            Ok(()) => info!("LED worker stopped, strip cleared"),
            Err(e) => error!("LED worker stopped, final clear failed: {}", e),
        }
    }

    fn paint(&mut self, color: Color, pattern: Pattern) -> Result<(), ServiceError> {
        self.backend.buffer_mut().fill(color);
        match self.backend.render() {
            Ok(()) => {
                self.shared.set_status(EngineStatus::Idle);
                Ok(())
            }
            Err(reason) => {
                let err = EngineError::RenderFailure {
                    pattern,
                    last_frame: None,
                    reason,
                };
                error!("{}", err);
                self.shared.set_status(EngineStatus::Failed(err.clone()));
                Err(err.into())
            }
        }
    }

    fn animate(&mut self, pattern: Pattern, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let mut stop = GenerationStop {
            shared: &shared,
            generation,
        };

        let status = match self.engine.run(self.backend.as_mut(), &mut stop) {
            Ok(RunOutcome::Completed { frames }) => {
                debug!("{} completed after {} frames", pattern, frames);
                EngineStatus::Completed { pattern, frames }
            }
            Ok(RunOutcome::Cancelled { frames }) => {
                debug!("{} cancelled after {} frames", pattern, frames);
                EngineStatus::Cancelled { pattern, frames }
            }
            Err(err) => {
                error!("{}", err);
                EngineStatus::Failed(err)
            }
        };
        shared.set_status(status);
    }
}

/// Owns one strip and serialises commands to it.
pub struct LedService {
    state: Mutex<StripState>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    timings: FrameTimings,
    info: HardwareInfo,
}

impl LedService {
    /// Opens the backend chosen by `config.backend` and starts the worker.
    ///
    /// With [`BackendPreference::Auto`](crate::config::BackendPreference::Auto)
    /// the platform is probed first.
    pub fn new(config: LedConfig) -> Result<Self, ServiceError> {
        let capability = Capability::for_preference(config.backend);
        Self::with_capability(config, capability)
    }

    /// Like [`new`](Self::new) with an explicit probe result.
    pub fn with_capability(config: LedConfig, capability: Capability) -> Result<Self, ServiceError> {
        let backend = open_backend(&config, capability)?;
        Self::with_backend(backend, &config)
    }

    /// Starts a service on an already opened backend.
    ///
    /// The pixel count comes from `backend`; the rest of `config` supplies
    /// brightness, pacing and wiring details.
    pub fn with_backend(
        backend: Box<dyn StripBackend>,
        config: &LedConfig,
    ) -> Result<Self, ServiceError> {
        let info = HardwareInfo {
            backend: backend.kind(),
            pixel_count: backend.pixel_count(),
            channel: config.channel,
            pin: config.pin,
            frequency_hz: config.frequency_hz,
            invert: config.invert,
        };

        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                pending: None,
                generation: 0,
                shutdown: false,
                status: EngineStatus::Idle,
            }),
            wake: Condvar::new(),
        });

        let worker = Worker {
            backend,
            engine: AnimationEngine::new(),
            shared: Arc::clone(&shared),
        };
        let handle = thread::Builder::new()
            .name("led-worker".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                error!("cannot spawn LED worker: {}", e);
                ServiceError::WorkerUnavailable
            })?;

        info!(
            "LED service ready: {:?} backend, {} pixels",
            info.backend, info.pixel_count
        );

        Ok(Self {
            state: Mutex::new(StripState::initial(config.brightness.min(100))),
            shared,
            worker: Some(handle),
            timings: config.timings,
            info,
        })
    }

    /// Records a new state and shows it.
    ///
    /// Any running animation is stopped first. `Solid`, `Off` and `is_on ==
    /// false` render once before returning; animated patterns return as soon
    /// as the worker has started them. Brightness is clamped to 0..=100.
    pub fn apply_state(
        &self,
        is_on: bool,
        color: Color,
        brightness: i32,
        pattern: Pattern,
    ) -> Result<(), ServiceError> {
        let brightness = clamp_brightness(brightness);
        let work = if !is_on || pattern == Pattern::Off {
            Work::Paint {
                color: BLACK,
                pattern,
            }
        } else {
            match AnimationSpec::for_pattern(pattern, color, brightness, &self.timings) {
                Some(spec) => Work::Animate(spec),
                None => Work::Paint {
                    color: color.scaled(brightness),
                    pattern,
                },
            }
        };

        debug!(
            "apply: on={} color={} brightness={} pattern={}",
            is_on, color, brightness, pattern
        );

        let reply = {
            let mut state = self.lock_state();
            *state = StripState {
                is_on,
                color,
                brightness,
                pattern,
                last_updated: Some(SystemTime::now()),
            };
            self.dispatch(work)?
        };
        Self::await_reply(reply)
    }

    /// Applies an unvalidated command.
    pub fn apply(&self, command: &StripCommand) -> Result<(), ServiceError> {
        let pattern: Pattern = command.pattern.parse()?;
        let color = Color::new(command.color.r, command.color.g, command.color.b);
        self.apply_state(command.is_on, color, command.brightness, pattern)
    }

    /// Snapshot of the last applied state.
    pub fn status(&self) -> StripState {
        self.lock_state().clone()
    }

    /// Stops any animation and blanks the strip.
    ///
    /// Color and brightness are kept for the next `set_color`.
    pub fn turn_off(&self) -> Result<(), ServiceError> {
        let reply = {
            let mut state = self.lock_state();
            state.is_on = false;
            state.pattern = Pattern::Off;
            state.last_updated = Some(SystemTime::now());
            self.dispatch(Work::Paint {
                color: BLACK,
                pattern: Pattern::Off,
            })?
        };
        Self::await_reply(reply)
    }

    /// Shows a solid color at the current brightness.
    pub fn set_color(&self, color: Color) -> Result<(), ServiceError> {
        let brightness = self.lock_state().brightness;
        self.apply_state(true, color, brightness as i32, Pattern::Solid)
    }

    /// Lights each pixel in turn to check the wiring.
    pub fn test_strip(&self) -> Result<(), ServiceError> {
        let (color, brightness) = {
            let state = self.lock_state();
            (state.color, state.brightness)
        };
        self.apply_state(true, color, brightness as i32, Pattern::PixelTest)
    }

    pub fn hardware_info(&self) -> HardwareInfo {
        self.info.clone()
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.shared.lock().status.clone()
    }

    /// Stops the worker after clearing the strip.
    ///
    /// Commands issued afterwards fail with
    /// [`ServiceError::WorkerUnavailable`]. Also runs on drop.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        {
            let mut slot = self.shared.lock();
            slot.shutdown = true;
            self.shared.wake.notify_all();
        }
        if handle.join().is_err() {
            warn!("LED worker panicked before shutdown");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StripState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, work: Work) -> Result<mpsc::Receiver<Result<(), ServiceError>>, ServiceError> {
        let (reply, receiver) = mpsc::channel();
        self.shared.submit(Job { work, reply })?;
        Ok(receiver)
    }

    fn await_reply(receiver: mpsc::Receiver<Result<(), ServiceError>>) -> Result<(), ServiceError> {
        receiver
            .recv()
            .map_err(|_| ServiceError::WorkerUnavailable)?
    }
}

impl Drop for LedService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::color::{RED, WHITE};

    fn simulated(pixels: usize) -> LedService {
        let backend = Box::new(SimulatedBackend::new(pixels).unwrap());
        LedService::with_backend(backend, &LedConfig::default()).unwrap()
    }

    #[test]
    fn initial_state_is_off() {
        let service = simulated(4);
        let state = service.status();
        assert!(!state.is_on);
        assert_eq!(state.color, BLACK);
        assert_eq!(state.brightness, 50);
        assert_eq!(state.pattern, Pattern::Solid);
        assert_eq!(state.last_updated, None);
        assert_eq!(service.engine_status(), EngineStatus::Idle);
    }

    #[test]
    fn brightness_is_clamped() {
        let service = simulated(4);
        service.apply_state(true, RED, 250, Pattern::Solid).unwrap();
        assert_eq!(service.status().brightness, 100);
        service.apply_state(true, RED, -5, Pattern::Solid).unwrap();
        assert_eq!(service.status().brightness, 0);
    }

    #[test]
    fn unknown_pattern_is_invalid() {
        let service = simulated(4);
        let command = StripCommand {
            is_on: true,
            pattern: "sparkle".into(),
            ..StripCommand::default()
        };
        assert!(matches!(
            service.apply(&command),
            Err(ServiceError::InvalidCommand(_))
        ));
        assert_eq!(service.status().last_updated, None);
    }

    #[test]
    fn command_channels_are_clamped() {
        let service = simulated(4);
        let command = StripCommand {
            is_on: true,
            color: CommandColor { r: 300, g: -20, b: 128 },
            brightness: 100,
            pattern: "solid".into(),
        };
        service.apply(&command).unwrap();
        assert_eq!(service.status().color, Color::rgb(255, 0, 128));
    }

    #[test]
    fn set_color_keeps_brightness() {
        let service = simulated(4);
        service.apply_state(false, BLACK, 30, Pattern::Off).unwrap();
        service.set_color(WHITE).unwrap();

        let state = service.status();
        assert!(state.is_on);
        assert_eq!(state.brightness, 30);
        assert_eq!(state.pattern, Pattern::Solid);
    }

    #[test]
    fn turn_off_keeps_color_and_brightness() {
        let service = simulated(4);
        service.apply_state(true, RED, 70, Pattern::Solid).unwrap();
        service.turn_off().unwrap();

        let state = service.status();
        assert!(!state.is_on);
        assert_eq!(state.pattern, Pattern::Off);
        assert_eq!(state.color, RED);
        assert_eq!(state.brightness, 70);
    }

    #[test]
    fn commands_after_shutdown_fail() {
        let mut service = simulated(4);
        service.shutdown();
        assert_eq!(service.engine_status(), EngineStatus::Stopped);
        assert_eq!(
            service.apply_state(true, RED, 50, Pattern::Solid),
            Err(ServiceError::WorkerUnavailable)
        );
        service.shutdown();
    }

    #[test]
    fn hardware_info_reports_backend() {
        let service = simulated(7);
        let info = service.hardware_info();
        assert_eq!(info.backend, BackendKind::Simulated);
        assert_eq!(info.pixel_count, 7);
        assert_eq!(info.channel, 0);
        assert_eq!(info.pin, 10);
        assert_eq!(info.frequency_hz, 800_000);
    }
}
