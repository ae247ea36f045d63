//! Shared test infrastructure for led-strip-engine integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use core::time::Duration;
use led_strip_engine::{
    BackendKind, Color, FrameTimings, LedConfig, PixelBuffer, RenderError, StopSignal,
    StripBackend,
};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ============================================================================
// Mock Backend
// ============================================================================

/// Everything a [`MockBackend`] has pushed.
#[derive(Debug, Default)]
pub struct StripLog {
    /// Committed frames, oldest first.
    pub frames: Vec<Vec<Color>>,
    /// Render calls, including failed ones.
    pub attempts: usize,
}

pub type SharedLog = Arc<Mutex<StripLog>>;

/// Backend that records every committed frame and can fail on demand.
pub struct MockBackend {
    buffer: PixelBuffer,
    log: SharedLog,
    fail_on_attempt: Option<usize>,
    panic_on_attempt: Option<usize>,
}

impl MockBackend {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            buffer: PixelBuffer::new(pixel_count).unwrap(),
            log: SharedLog::default(),
            fail_on_attempt: None,
            panic_on_attempt: None,
        }
    }

    /// Makes the render call with this zero-based index fail once.
    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on_attempt = Some(attempt);
        self
    }

    /// Makes the render call with this zero-based index panic.
    pub fn panicking_on(mut self, attempt: usize) -> Self {
        self.panic_on_attempt = Some(attempt);
        self
    }

    /// Handle for inspecting frames after the backend is moved away.
    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }
}

impl StripBackend for MockBackend {
    fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    fn render(&mut self) -> Result<(), RenderError> {
        let mut log = self.log.lock().unwrap();
        let attempt = log.attempts;
        log.attempts += 1;
        if self.panic_on_attempt == Some(attempt) {
            // release the log so the test can still read it
            drop(log);
            panic!("strip driver crashed on render {}", attempt);
        }
        if self.fail_on_attempt == Some(attempt) {
            return Err(RenderError::Disconnected);
        }
        log.frames.push(self.buffer.as_slice().to_vec());
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }
}

pub fn frames(log: &SharedLog) -> Vec<Vec<Color>> {
    log.lock().unwrap().frames.clone()
}

pub fn frame_count(log: &SharedLog) -> usize {
    log.lock().unwrap().frames.len()
}

// ============================================================================
// Mock Stop Signal
// ============================================================================

/// Stop signal that never sleeps and fires after a fixed number of waits.
#[derive(Debug, Default)]
pub struct CountingStop {
    stop_after_waits: Option<usize>,
    /// Delays requested so far, one per frame gap.
    pub waits: Vec<Duration>,
}

impl CountingStop {
    /// Never requests a stop.
    pub fn never() -> Self {
        Self::default()
    }

    /// Requests a stop during the `n`th wait.
    pub fn after_waits(n: usize) -> Self {
        Self {
            stop_after_waits: Some(n),
            waits: Vec::new(),
        }
    }

    fn tripped(&self) -> bool {
        self.stop_after_waits
            .is_some_and(|limit| self.waits.len() >= limit)
    }
}

impl StopSignal for CountingStop {
    fn stop_requested(&self) -> bool {
        self.tripped()
    }

    fn wait(&mut self, delay: Duration) -> bool {
        self.waits.push(delay);
        self.tripped()
    }
}

// ============================================================================
// Service helpers
// ============================================================================

/// Config with millisecond pacing so service tests finish quickly.
pub fn fast_config() -> LedConfig {
    let tick = Duration::from_millis(1);
    LedConfig {
        timings: FrameTimings {
            wipe: tick,
            chase: tick,
            rainbow_cycle: tick,
            chase_rainbow: tick,
            pixel_test: tick,
            ..FrameTimings::default()
        },
        ..LedConfig::default()
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub const PATIENCE: Duration = Duration::from_secs(5);
