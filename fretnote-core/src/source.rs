//! # Frame Source Boundary
//!
//! The detector never touches audio devices itself. Once per tick it asks a
//! [`FrameSource`] for the most recent analysis window together with the
//! magnitude spectrum of that same window.

use anyhow::Result;
use serde::Serialize;

/// One tick's worth of audio, consumed immediately and never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Time-domain window, values in [-1, 1].
    pub samples: Vec<f32>,
    /// Normalized magnitudes in [0, 1], half as many as `samples`.
    pub magnitudes: Vec<f32>,
    /// Sample rate of the stream in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, magnitudes: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            magnitudes,
            sample_rate,
        }
    }
}

/// Stream parameters reported by a successful `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub sample_rate: u32,
    pub buffer_size: usize,
}

/// Something that can deliver analysis frames, typically a microphone.
pub trait FrameSource {
    /// Acquires the underlying audio session.
    fn open(&mut self) -> Result<SessionInfo>;

    /// Returns the latest frame, or `None` if no audio is available yet.
    fn next_frame(&mut self) -> Option<AudioFrame>;

    /// Releases the audio session. Must be safe to call more than once.
    fn close(&mut self);
}
