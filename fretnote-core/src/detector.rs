//! # Note State Machine
//!
//! Four-phase lifecycle (silence, attack, sustain, release) driven once per
//! frame by the envelope, onset, pitch and harmonic signals. Each phase owns
//! exactly the data it needs, so a peak can only exist during an attack and a
//! note candidate only during a sustain.

use std::fmt;
use std::time::Instant;

use log::debug;
use serde::Serialize;

use crate::config::DetectorConfig;
use crate::pitch::PitchEstimate;
use crate::tuning;

/// Fraction of the attack peak the envelope must drop under to sustain.
const SUSTAIN_DROP: f32 = 0.95;
/// Fraction of the release threshold that ends a release.
const RELEASE_FLOOR: f32 = 0.5;
/// Largest jump, in Hz, accepted when refining a sustained note.
const MAX_REFINE_JUMP_HZ: f32 = 20.0;

/// Phase tag without per-phase data, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorPhase {
    Silence,
    Attack,
    Sustain,
    Release,
}

impl fmt::Display for DetectorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorPhase::Silence => "SILENCE",
            DetectorPhase::Attack => "ATTACK",
            DetectorPhase::Sustain => "SUSTAIN",
            DetectorPhase::Release => "RELEASE",
        };
        f.write_str(name)
    }
}

/// The note currently believed to be sounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteCandidate {
    pub name: &'static str,
    pub octave: i32,
    pub frequency: f32,
    pub cents: i32,
    pub yin_confidence: f32,
    pub harmonic_confidence: f32,
}

impl NoteCandidate {
    /// Builds a candidate from a pitch that passed the harmonic gate.
    ///
    /// Returns `None` when there is no pitch, the harmonic score does not
    /// beat `min_harmonic_confidence`, or the frequency maps to no note.
    pub fn capture(pitch: Option<&PitchEstimate>, harmonic: f32, min_harmonic_confidence: f32) -> Option<Self> {
        let pitch = pitch?;
        if harmonic <= min_harmonic_confidence {
            return None;
        }
        let note = tuning::frequency_to_note(pitch.frequency)?;
        Some(Self {
            name: note.name,
            octave: note.octave,
            frequency: pitch.frequency,
            cents: note.cents,
            yin_confidence: pitch.confidence,
            harmonic_confidence: harmonic,
        })
    }

    pub fn display_name(&self) -> String {
        format!("{}{}", self.name, self.octave)
    }
}

/// Everything the state machine looks at for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignals {
    pub envelope: f32,
    pub is_onset: bool,
    pub pitch: Option<PitchEstimate>,
    pub harmonic: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteState {
    Silence {
        /// Consecutive frames that qualified as an attack so far.
        attack_frames: u32,
    },
    Attack {
        started_at: Instant,
        peak: f32,
    },
    Sustain {
        started_at: Instant,
        /// Consecutive frames under the release threshold so far.
        release_frames: u32,
        candidate: Option<NoteCandidate>,
    },
    Release {
        started_at: Instant,
    },
}

impl Default for NoteState {
    fn default() -> Self {
        NoteState::Silence { attack_frames: 0 }
    }
}

impl NoteState {
    pub fn phase(&self) -> DetectorPhase {
        match self {
            NoteState::Silence { .. } => DetectorPhase::Silence,
            NoteState::Attack { .. } => DetectorPhase::Attack,
            NoteState::Sustain { .. } => DetectorPhase::Sustain,
            NoteState::Release { .. } => DetectorPhase::Release,
        }
    }

    pub fn candidate(&self) -> Option<&NoteCandidate> {
        match self {
            NoteState::Sustain { candidate, .. } => candidate.as_ref(),
            _ => None,
        }
    }

    /// Running envelope peak, tracked only while attacking.
    pub fn peak(&self) -> Option<f32> {
        match self {
            NoteState::Attack { peak, .. } => Some(*peak),
            _ => None,
        }
    }

    /// Advances the lifecycle by one frame.
    pub fn step(self, signals: &FrameSignals, now: Instant, config: &DetectorConfig) -> NoteState {
        let envelope = signals.envelope;
        let attacking = signals.is_onset && envelope > config.attack_threshold;

        match self {
            NoteState::Silence { attack_frames } => {
                if !attacking {
                    return NoteState::Silence { attack_frames: 0 };
                }
                let attack_frames = attack_frames + 1;
                if attack_frames < config.attack_hysteresis_frames {
                    return NoteState::Silence { attack_frames };
                }
                debug!("[DETECTOR] SILENCE -> ATTACK (envelope {:.4})", envelope);
                NoteState::Attack {
                    started_at: now,
                    peak: envelope,
                }
            }

            NoteState::Attack { started_at, peak } => {
                let peak = peak.max(envelope);
                if envelope < SUSTAIN_DROP * peak && envelope > config.release_threshold {
                    let candidate = NoteCandidate::capture(
                        signals.pitch.as_ref(),
                        signals.harmonic,
                        config.min_harmonic_confidence,
                    );
                    match &candidate {
                        Some(note) => debug!(
                            "[DETECTOR] ATTACK -> SUSTAIN with {} ({:.1} Hz, harmonic {:.2})",
                            note.display_name(),
                            note.frequency,
                            note.harmonic_confidence
                        ),
                        None => debug!(
                            "[DETECTOR] ATTACK -> SUSTAIN without a note (harmonic {:.2})",
                            signals.harmonic
                        ),
                    }
                    return NoteState::Sustain {
                        started_at,
                        release_frames: 0,
                        candidate,
                    };
                }
                NoteState::Attack { started_at, peak }
            }

            NoteState::Sustain {
                started_at,
                release_frames,
                mut candidate,
            } => {
                if let Some(current) = candidate.as_mut() {
                    let refined = NoteCandidate::capture(
                        signals.pitch.as_ref(),
                        signals.harmonic,
                        config.min_harmonic_confidence,
                    );
                    if let Some(refined) = refined {
                        if (refined.frequency - current.frequency).abs() <= MAX_REFINE_JUMP_HZ {
                            *current = refined;
                        }
                    }
                }

                let release_frames = if envelope < config.release_threshold {
                    release_frames + 1
                } else {
                    0
                };
                if release_frames >= config.release_hysteresis_frames {
                    debug!("[DETECTOR] SUSTAIN -> RELEASE");
                    return NoteState::Release { started_at };
                }
                NoteState::Sustain {
                    started_at,
                    release_frames,
                    candidate,
                }
            }

            NoteState::Release { started_at } => {
                // A fresh attack cuts the release short without waiting for
                // the minimum note duration.
                if attacking {
                    debug!("[DETECTOR] RELEASE -> SILENCE (retrigger)");
                    return NoteState::Silence { attack_frames: 0 };
                }
                let elapsed = now.saturating_duration_since(started_at);
                if envelope < RELEASE_FLOOR * config.release_threshold
                    && elapsed >= config.min_note_duration()
                {
                    debug!("[DETECTOR] RELEASE -> SILENCE after {:?}", elapsed);
                    return NoteState::Silence { attack_frames: 0 };
                }
                NoteState::Release { started_at }
            }
        }
    }
}
