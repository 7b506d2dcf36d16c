// fretnote-core/src/lib.rs

//! The core logic for the fretboard note trainer.
//! This crate turns a stream of microphone frames into confidence-scored
//! note events: envelope tracking, spectral-flux onsets, YIN pitch
//! estimation, harmonic validation and a hysteretic note lifecycle.
//! It is completely headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod detector;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fft;
pub mod harmonic;
pub mod onset;
pub mod pitch;
pub mod source;
pub mod tuning;

use serde::Serialize;

pub use config::DetectorConfig;
pub use detector::{DetectorPhase, NoteCandidate};
pub use engine::{update, EngineState, NoteEngine, TickDiagnostics};
pub use error::{ConfigError, EngineError};
pub use source::{AudioFrame, FrameSource, SessionInfo};

/// A detected note as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEvent {
    /// Note name with octave, e.g. "E2".
    pub display_name: String,
    pub frequency_hz: f32,
    /// Offset from the nearest semitone.
    pub cents: i32,
    pub yin_confidence: f32,
    pub harmonic_confidence: f32,
    pub state: DetectorPhase,
}

impl NoteEvent {
    pub fn from_candidate(candidate: &NoteCandidate, state: DetectorPhase) -> Self {
        Self {
            display_name: candidate.display_name(),
            frequency_hz: candidate.frequency,
            cents: candidate.cents,
            yin_confidence: candidate.yin_confidence,
            harmonic_confidence: candidate.harmonic_confidence,
            state,
        }
    }
}

/// Everything emitted by one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutput {
    /// Smoothed input level in [0, 100].
    pub volume_level: f32,
    /// The sounding note, if one has been recognised.
    pub note: Option<NoteEvent>,
    /// Present when diagnostics are enabled in the configuration.
    pub diagnostics: Option<TickDiagnostics>,
}
