//! Exponentially smoothed RMS envelope of the time-domain window.

use serde::Serialize;

/// Root mean square of a window. Empty windows are silent.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnvelopeTracker {
    value: f32,
}

impl EnvelopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the window's RMS into the envelope and returns the new value.
    pub fn update(&mut self, samples: &[f32], smoothing: f32) -> f32 {
        let instant = rms(samples);
        self.value = smoothing * instant + (1.0 - smoothing) * self.value;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_a_constant_is_its_magnitude() {
        assert_eq!(rms(&[0.5; 64]), 0.5);
        assert_eq!(rms(&[-0.25; 64]), 0.25);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn envelope_converges_towards_the_input_level() {
        let mut envelope = EnvelopeTracker::new();
        let loud = [0.5; 128];

        let first = envelope.update(&loud, 0.3);
        assert!((first - 0.15).abs() < 1e-6);

        let second = envelope.update(&loud, 0.3);
        assert!((second - 0.255).abs() < 1e-6);

        for _ in 0..50 {
            envelope.update(&loud, 0.3);
        }
        assert!((envelope.value() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn envelope_decays_and_never_goes_negative() {
        let mut envelope = EnvelopeTracker::new();
        envelope.update(&[1.0; 16], 1.0);
        let mut previous = envelope.value();
        for _ in 0..100 {
            let value = envelope.update(&[0.0; 16], 0.3);
            assert!(value >= 0.0);
            assert!(value <= previous);
            previous = value;
        }
        envelope.reset();
        assert_eq!(envelope.value(), 0.0);
    }
}
