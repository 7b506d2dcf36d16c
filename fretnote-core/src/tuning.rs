//! # Musical Tuning Module
//!
//! Maps frequencies onto the equal-tempered chromatic scale (A4 = 440 Hz)
//! and back. Note names use sharps only.

use serde::Serialize;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Nearest note to a measured frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteMatch {
    pub name: &'static str,
    pub octave: i32,
    pub midi: i32,
    /// Equal-tempered frequency of the matched note.
    pub target_frequency: f32,
    /// Signed offset from the matched note, roughly [-50, 50).
    pub cents: i32,
}

impl NoteMatch {
    /// Name with octave, e.g. "C#3".
    pub fn display_name(&self) -> String {
        format!("{}{}", self.name, self.octave)
    }
}

/// Equal-tempered frequency of a MIDI note number.
pub fn midi_to_frequency(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Finds the nearest chromatic note to `freq`.
///
/// Returns `None` only for non-positive or non-finite input.
pub fn frequency_to_note(freq: f32) -> Option<NoteMatch> {
    if !(freq > 0.0) || !freq.is_finite() {
        return None;
    }
    let half_steps = 12.0 * (freq / A4_FREQUENCY).log2();
    let midi = (A4_MIDI as f32 + half_steps).round() as i32;
    let target_frequency = midi_to_frequency(midi);
    let cents = calculate_cents_deviation(freq, target_frequency).round() as i32;

    Some(NoteMatch {
        name: NOTE_NAMES[midi.rem_euclid(12) as usize],
        octave: midi.div_euclid(12) - 1,
        midi,
        target_frequency,
        cents,
    })
}

/// Deviation of `freq` from `target_freq` in cents (positive = sharp).
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
