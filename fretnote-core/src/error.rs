//! # Error Types
//!
//! Steady-state detection never fails: numerically dangerous paths degrade to
//! "no pitch this tick". The only errors this crate reports are caller errors
//! (bad configuration) and session errors (a frame source that could not open,
//! or a second `start()` while a session is live).

use thiserror::Error;

/// A configuration value that would make the detector produce wrong pitches.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("yin threshold must be in (0, 1), got {0}")]
    YinThreshold(f32),

    #[error("frequency range must satisfy 0 < min < max, got {min} Hz..{max} Hz")]
    FrequencyRange { min: f32, max: f32 },

    #[error("onset threshold must be non-negative, got {0}")]
    OnsetThreshold(f32),

    #[error("flux history must hold at least one value")]
    FluxHistorySize,

    #[error("release threshold ({release}) must be positive and below the attack threshold ({attack})")]
    EnvelopeThresholds { attack: f32, release: f32 },

    #[error("envelope smoothing must be in (0, 1], got {0}")]
    EnvelopeSmoothing(f32),

    #[error("{which} hysteresis must be at least one frame")]
    Hysteresis { which: &'static str },

    #[error("minimum harmonic confidence must be in [0, 1], got {0}")]
    HarmonicConfidence(f32),

    #[error("volume gain must be positive, got {0}")]
    VolumeGain(f32),

    #[error("sample rate must be positive")]
    SampleRate,

    #[error("buffer of {0} samples is too short to analyse")]
    BufferSize(usize),

    #[error("max frequency {max} Hz is at or above Nyquist ({nyquist} Hz)")]
    AboveNyquist { max: f32, nyquist: f32 },

    #[error("min frequency {min} Hz needs a lag of {lag} samples, but the buffer only allows {limit}")]
    PeriodTooLong { min: f32, lag: usize, limit: usize },
}

/// Failure of an engine control operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a detection session is already running")]
    AlreadyRunning,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("frame source failed to open: {0:#}")]
    Source(anyhow::Error),
}
