//! # Spectrum Front End
//!
//! Turns a time-domain window into the normalized magnitude spectrum the
//! detector consumes: DC removal, Hann window, forward FFT, then a decibel
//! scale squeezed into [0, 1].

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Level mapped to 0.0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Level mapped to 1.0.
pub const MAX_DECIBELS: f32 = -30.0;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window in place to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Maps a linear magnitude onto [0, 1] between `MIN_DECIBELS` and `MAX_DECIBELS`.
pub fn normalize_magnitude(magnitude: f32) -> f32 {
    if magnitude <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0)
}

/// Forward FFT of a fixed window size, planned once.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            fft,
            size,
            scratch: vec![Complex { re: 0.0, im: 0.0 }; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `size / 2` normalized magnitudes for `signal`.
    ///
    /// A window of the wrong length is zero-padded or truncated.
    pub fn normalized_magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let mut processed = vec![0.0; self.size];
        let len = signal.len().min(self.size);
        processed[..len].copy_from_slice(&signal[..len]);
        remove_dc_offset(&mut processed);
        apply_hann_window(&mut processed);

        for (slot, sample) in self.scratch.iter_mut().zip(processed) {
            *slot = Complex { re: sample, im: 0.0 };
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.size as f32;
        self.scratch
            .iter()
            .take(self.size / 2)
            .map(|c| normalize_magnitude(c.norm() * scale))
            .collect()
    }
}
