#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use fretnote_core::{AudioFrame, FrameSource, SessionInfo};

pub const SAMPLE_RATE: u32 = 44100;
pub const BUFFER_SIZE: usize = 4096;
pub const BINS: usize = BUFFER_SIZE / 2;
pub const A4: f32 = 440.0;

pub fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..BUFFER_SIZE)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

/// A flat `floor` with the first five partials of `freq` raised to `level`.
pub fn harmonic_spectrum(freq: f32, level: f32, floor: f32) -> Vec<f32> {
    let mut spectrum = vec![floor; BINS];
    let bin_width = SAMPLE_RATE as f32 / BUFFER_SIZE as f32;
    for h in 1..=5 {
        let bin = (freq * h as f32 / bin_width).round() as usize;
        spectrum[bin] = level.max(floor);
    }
    spectrum
}

pub fn silent_frame() -> AudioFrame {
    AudioFrame::new(vec![0.0; BUFFER_SIZE], vec![0.0; BINS], SAMPLE_RATE)
}

pub fn tone_frame(amplitude: f32, magnitudes: Vec<f32>) -> AudioFrame {
    AudioFrame::new(sine(A4, amplitude), magnitudes, SAMPLE_RATE)
}

/// Five quiet frames, a three-frame swell whose spectrum keeps rising, a
/// steady hold, then one quieter frame that pulls the envelope off its peak.
pub fn pluck(harmonics: bool) -> Vec<AudioFrame> {
    let level = if harmonics { 1.0 } else { 0.0 };
    let mut frames: Vec<AudioFrame> = (0..5).map(|_| silent_frame()).collect();
    for step in 1..=3 {
        let floor = 0.1 * step as f32;
        frames.push(tone_frame(0.5, harmonic_spectrum(A4, level, floor)));
    }
    for _ in 0..4 {
        frames.push(tone_frame(0.5, harmonic_spectrum(A4, level, 0.3)));
    }
    frames.push(tone_frame(0.2, harmonic_spectrum(A4, level, 0.3)));
    frames
}

/// Monotonic clock advancing 16 ms per tick.
pub struct TickClock {
    start: Instant,
    ticks: u64,
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            ticks: 0,
        }
    }

    pub fn next(&mut self) -> Instant {
        self.ticks += 1;
        self.start + Duration::from_millis(16 * self.ticks)
    }
}

/// Frame source replaying a fixed script.
pub struct ScriptedSource {
    pub frames: VecDeque<AudioFrame>,
    pub sample_rate: u32,
    pub fail_open: bool,
    pub closed: Rc<Cell<u32>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames: frames.into(),
            sample_rate: SAMPLE_RATE,
            fail_open: false,
            closed: Rc::new(Cell::new(0)),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<SessionInfo> {
        if self.fail_open {
            return Err(anyhow!("permission denied"));
        }
        Ok(SessionInfo {
            sample_rate: self.sample_rate,
            buffer_size: BUFFER_SIZE,
        })
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        self.frames.pop_front()
    }

    fn close(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}
