//! # Detector Configuration
//!
//! Every threshold of the pipeline lives here so that a caller can override
//! any of them at construction time. Defaults are tuned for guitar at a
//! display-synchronised tick rate of about 60 Hz.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable parameters of the note detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// CMNDF value a lag must dip under to count as periodic.
    pub yin_threshold: f32,
    /// Lowest fundamental searched for, in Hz.
    pub min_frequency: f32,
    /// Highest fundamental searched for, in Hz.
    pub max_frequency: f32,
    /// Floor of the adaptive spectral flux threshold.
    pub onset_threshold: f32,
    /// Number of recent flux values averaged by the adaptive threshold.
    pub flux_history_size: usize,
    /// Envelope level a note must exceed to start.
    pub attack_threshold: f32,
    /// Envelope level under which a note is considered to be dying out.
    pub release_threshold: f32,
    /// Weight of the newest RMS value in the smoothed envelope.
    pub envelope_smoothing: f32,
    /// Consecutive qualifying frames needed before entering attack.
    pub attack_hysteresis_frames: u32,
    /// Consecutive quiet frames needed before entering release.
    pub release_hysteresis_frames: u32,
    /// Minimum wall-clock lifetime of a note before it may end.
    pub min_note_duration_ms: u64,
    /// Harmonic score a pitch must beat to become a note candidate.
    pub min_harmonic_confidence: f32,
    /// Number of ticks blanked by `trigger_cooldown`.
    pub cooldown_frames: u32,
    /// Scale from smoothed RMS to the 0-100 volume level.
    pub volume_gain: f32,
    /// Attach a diagnostic snapshot to every tick output.
    pub emit_diagnostics: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            yin_threshold: 0.15,
            min_frequency: 50.0,
            max_frequency: 2000.0,
            onset_threshold: 0.3,
            flux_history_size: 5,
            attack_threshold: 0.02,
            release_threshold: 0.01,
            envelope_smoothing: 0.3,
            attack_hysteresis_frames: 3,
            release_hysteresis_frames: 5,
            min_note_duration_ms: 100,
            min_harmonic_confidence: 0.5,
            cooldown_frames: 50,
            volume_gain: 300.0,
            emit_diagnostics: false,
        }
    }
}

impl DetectorConfig {
    pub fn min_note_duration(&self) -> Duration {
        Duration::from_millis(self.min_note_duration_ms)
    }

    /// Rejects values that are outside any plausible range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            return Err(ConfigError::YinThreshold(self.yin_threshold));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return Err(ConfigError::FrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }
        if !(self.onset_threshold >= 0.0) {
            return Err(ConfigError::OnsetThreshold(self.onset_threshold));
        }
        if self.flux_history_size == 0 {
            return Err(ConfigError::FluxHistorySize);
        }
        if !(self.release_threshold > 0.0 && self.release_threshold < self.attack_threshold) {
            return Err(ConfigError::EnvelopeThresholds {
                attack: self.attack_threshold,
                release: self.release_threshold,
            });
        }
        if !(self.envelope_smoothing > 0.0 && self.envelope_smoothing <= 1.0) {
            return Err(ConfigError::EnvelopeSmoothing(self.envelope_smoothing));
        }
        if self.attack_hysteresis_frames == 0 {
            return Err(ConfigError::Hysteresis { which: "attack" });
        }
        if self.release_hysteresis_frames == 0 {
            return Err(ConfigError::Hysteresis { which: "release" });
        }
        if !(0.0..=1.0).contains(&self.min_harmonic_confidence) {
            return Err(ConfigError::HarmonicConfidence(self.min_harmonic_confidence));
        }
        if !(self.volume_gain > 0.0) {
            return Err(ConfigError::VolumeGain(self.volume_gain));
        }
        Ok(())
    }

    /// Checks that a stream with this sample rate and window length can
    /// actually resolve the configured frequency range.
    pub fn validate_session(&self, sample_rate: u32, buffer_size: usize) -> Result<(), ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if buffer_size < 2 {
            return Err(ConfigError::BufferSize(buffer_size));
        }
        let nyquist = sample_rate as f32 / 2.0;
        if self.max_frequency >= nyquist {
            return Err(ConfigError::AboveNyquist {
                max: self.max_frequency,
                nyquist,
            });
        }
        let lag = (sample_rate as f32 / self.min_frequency).ceil() as usize;
        let limit = buffer_size / 2;
        if lag >= limit {
            return Err(ConfigError::PeriodTooLong {
                min: self.min_frequency,
                lag,
                limit,
            });
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: DetectorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}
