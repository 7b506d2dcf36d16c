//! # Onset Detection
//!
//! Positive-only spectral flux between consecutive magnitude spectra,
//! compared against a threshold that rises with the recent flux average.
//! Only increases in energy count, so a note fading out never looks like
//! an attack.

use serde::Serialize;

/// Factor applied to the mean of the flux history.
const ADAPTIVE_MULTIPLIER: f32 = 1.5;

/// Fixed-capacity ring buffer of recent flux values.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxHistory {
    values: Box<[f32]>,
    next: usize,
    len: usize,
}

impl FluxHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity.max(1)].into_boxed_slice(),
            next: 0,
            len: 0,
        }
    }

    /// Stores `flux`, overwriting the oldest value once full.
    pub fn push(&mut self, flux: f32) {
        self.values[self.next] = flux;
        self.next = (self.next + 1) % self.values.len();
        self.len = (self.len + 1).min(self.values.len());
    }

    pub fn mean(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.len as f32
    }

    /// Values currently held, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let capacity = self.values.len();
        let start = (self.next + capacity - self.len) % capacity;
        (0..self.len).map(move |i| self.values[(start + i) % capacity])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.values.fill(0.0);
        self.next = 0;
        self.len = 0;
    }
}

/// Result of feeding one spectrum to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Onset {
    pub flux: f32,
    pub threshold: f32,
    pub is_onset: bool,
}

/// Spectral flux between two spectra, counting only bins that got louder.
pub fn spectral_flux(current: &[f32], previous: &[f32]) -> f32 {
    current
        .iter()
        .zip(previous)
        .map(|(&cur, &prev)| {
            let rise = (cur - prev).max(0.0);
            rise * rise
        })
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnsetDetector {
    previous: Option<Vec<f32>>,
    history: FluxHistory,
}

impl OnsetDetector {
    pub fn new(history_size: usize) -> Self {
        Self {
            previous: None,
            history: FluxHistory::new(history_size),
        }
    }

    /// Computes the flux of `magnitudes` against the last spectrum seen and
    /// decides whether it is an onset.
    ///
    /// The first spectrum, or one whose length differs from the last, has no
    /// usable predecessor and yields zero flux.
    pub fn process(&mut self, magnitudes: &[f32], base_threshold: f32) -> Onset {
        let flux = match self.previous.as_mut() {
            Some(prev) if prev.len() == magnitudes.len() => {
                let flux = spectral_flux(magnitudes, prev);
                prev.copy_from_slice(magnitudes);
                flux
            }
            _ => {
                self.previous = Some(magnitudes.to_vec());
                0.0
            }
        };

        self.history.push(flux);
        let threshold = base_threshold.max(self.history.mean() * ADAPTIVE_MULTIPLIER);

        Onset {
            flux,
            threshold,
            is_onset: flux > threshold,
        }
    }

    pub fn history(&self) -> &FluxHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.history.clear();
    }
}
