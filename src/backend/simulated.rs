//! In-memory strip with an optional text surface.
//!
//! Rendering never sleeps and never touches hardware, so a caller stepping
//! an animation frame by frame sees exactly one committed frame per
//! `render` call.

use super::{BackendKind, RenderError, StripBackend};
use crate::buffer::PixelBuffer;
use crate::color::Color;
use core::fmt::Write as _;
use std::io::Write;

const RULE: &str = "============================================================";

/// Moves the cursor home so each frame overwrites the previous one.
const CURSOR_HOME: &str = "\x1b[H";
const RESET: &str = "\x1b[0m";

/// Five-step meter for a pixel's channel sum.
pub fn intensity_meter(color: Color) -> &'static str {
    match color.intensity() {
        0 => "○○○○○",
        1..100 => "●○○○○",
        100..200 => "●●○○○",
        200..400 => "●●●○○",
        400..600 => "●●●●○",
        _ => "●●●●●",
    }
}

/// Appends the text rendering of one frame to `out`.
pub fn describe_frame(pixels: &[Color], out: &mut String) {
    let _ = writeln!(out, "WS2812B LED Strip Simulator - {} LEDs", pixels.len());
    let _ = writeln!(out, "{}", RULE);
    for (index, pixel) in pixels.iter().enumerate() {
        let _ = writeln!(
            out,
            "LED {:2}: \x1b[38;2;{};{};{}m██{} {} {}",
            index,
            pixel.r,
            pixel.g,
            pixel.b,
            RESET,
            pixel,
            intensity_meter(*pixel)
        );
    }
    let _ = writeln!(out, "{}", RULE);
}

/// Strip that commits frames to memory and optionally prints them.
pub struct SimulatedBackend {
    buffer: PixelBuffer,
    committed: PixelBuffer,
    frames_rendered: u64,
    surface: Option<Box<dyn Write + Send>>,
    redraw_in_place: bool,
    scratch: String,
}

impl SimulatedBackend {
    /// Silent simulated strip of `pixel_count` pixels.
    ///
    /// Returns `None` when the count is outside the buffer capacity.
    pub fn new(pixel_count: usize) -> Option<Self> {
        let buffer = PixelBuffer::new(pixel_count)?;
        Some(Self {
            committed: buffer.clone(),
            buffer,
            frames_rendered: 0,
            surface: None,
            redraw_in_place: false,
            scratch: String::new(),
        })
    }

    /// Simulated strip redrawn on stdout at every frame.
    pub fn console(pixel_count: usize) -> Option<Self> {
        let mut backend = Self::with_surface(pixel_count, std::io::stdout())?;
        backend.redraw_in_place = true;
        Some(backend)
    }

    /// Simulated strip that writes each frame's text to `surface`.
    pub fn with_surface<W>(pixel_count: usize, surface: W) -> Option<Self>
    where
        W: Write + Send + 'static,
    {
        let mut backend = Self::new(pixel_count)?;
        backend.surface = Some(Box::new(surface));
        Some(backend)
    }

    /// Pixels of the last successfully rendered frame.
    pub fn committed(&self) -> &[Color] {
        self.committed.as_slice()
    }

    /// Number of successful `render` calls.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl StripBackend for SimulatedBackend {
    fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buffer
    }

    fn render(&mut self) -> Result<(), RenderError> {
        if let Some(surface) = self.surface.as_mut() {
            self.scratch.clear();
            if self.redraw_in_place {
                self.scratch.push_str(CURSOR_HOME);
            }
            describe_frame(self.buffer.as_slice(), &mut self.scratch);
            surface
                .write_all(self.scratch.as_bytes())
                .and_then(|()| surface.flush())
                .map_err(|e| RenderError::Io(e.to_string()))?;
        }

        self.committed = self.buffer.clone();
        self.frames_rendered += 1;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }
}
