//! # Pitch Detection Module
//!
//! Fundamental-frequency estimation with the YIN algorithm: a difference
//! function, its cumulative mean normalization, an absolute-threshold search
//! restricted to the configured frequency range, and parabolic interpolation
//! for sub-sample accuracy.
//!
//! Degenerate input (empty or silent windows, ranges the window cannot hold)
//! yields `None` rather than an error.

use serde::Serialize;

/// A periodicity estimate for one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchEstimate {
    /// Estimated fundamental in Hz.
    pub frequency: f32,
    /// `1 - cmndf` at the chosen lag, in [0, 1].
    pub confidence: f32,
    /// Interpolated lag in samples.
    pub tau: f32,
}

/// Parameters of a YIN search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YinParams {
    pub threshold: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
}

/// Squared difference of the window against itself shifted by each lag,
/// `d(tau) = sum_{i < N/2} (x[i] - x[i + tau])^2`, for `tau` in `0..lags`.
pub fn difference_function(signal: &[f32], lags: usize) -> Vec<f32> {
    let window = signal.len() / 2;
    let lags = lags.min(window);
    let mut diff = vec![0.0; lags];
    for (tau, d) in diff.iter_mut().enumerate().skip(1) {
        let mut sum = 0.0;
        for i in 0..window {
            let delta = signal[i] - signal[i + tau];
            sum += delta * delta;
        }
        *d = sum;
    }
    diff
}

/// Cumulative mean normalized difference, in place. `cmndf(0) = 1`, and lags
/// whose running sum is still zero are treated as aperiodic.
pub fn cumulative_mean_normalize(diff: &mut [f32]) {
    if diff.is_empty() {
        return;
    }
    diff[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        if running_sum > 0.0 {
            diff[tau] *= tau as f32 / running_sum;
        } else {
            diff[tau] = 1.0;
        }
    }
}

/// Runs YIN over `signal`.
///
/// # Returns
/// * `Some(estimate)` - a lag in `[sample_rate / max, sample_rate / min)`
///   dipped under the threshold
/// * `None` - no periodicity in range this tick
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, params: &YinParams) -> Option<PitchEstimate> {
    if signal.len() < 4 || sample_rate == 0 || !(params.min_frequency > 0.0) {
        return None;
    }
    let window = signal.len() / 2;
    let min_tau = ((sample_rate as f32 / params.max_frequency) as usize).max(1);
    let max_tau = ((sample_rate as f32 / params.min_frequency) as usize).min(window);
    if min_tau >= max_tau {
        return None;
    }

    // One lag past the search range keeps interpolation possible at its edge.
    let mut cmndf = difference_function(signal, (max_tau + 1).min(window));
    cumulative_mean_normalize(&mut cmndf);

    // --- Absolute threshold, then walk down to the local minimum ---
    let mut tau = (min_tau..max_tau).find(|&t| cmndf[t] < params.threshold)?;
    while tau + 1 < max_tau && cmndf[tau + 1] < cmndf[tau] {
        tau += 1;
    }

    let refined = parabolic_interpolation(&cmndf, tau);
    let frequency = sample_rate as f32 / refined;
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }

    Some(PitchEstimate {
        frequency,
        confidence: (1.0 - cmndf[tau]).clamp(0.0, 1.0),
        tau: refined,
    })
}

/// Fits a parabola through `values[tau - 1..=tau + 1]` and returns the
/// position of its vertex. Falls back to `tau` at the array edges or when
/// the three points are collinear.
fn parabolic_interpolation(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f32;
    }
    let y1 = values[tau - 1];
    let y2 = values[tau];
    let y3 = values[tau + 1];

    let curvature = y1 - 2.0 * y2 + y3;
    if curvature == 0.0 {
        return tau as f32;
    }
    tau as f32 + (y1 - y3) / (2.0 * curvature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn params() -> YinParams {
        YinParams {
            threshold: 0.15,
            min_frequency: 50.0,
            max_frequency: 2000.0,
        }
    }

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn sines_across_the_guitar_range() {
        for freq in [
            50.0, 55.0, 82.41, 110.0, 196.0, 329.63, 440.0, 659.26, 987.77, 1318.5, 2000.0,
        ] {
            let estimate = detect_pitch_yin(&sine(freq, 0.5, 4096), SAMPLE_RATE, &params())
                .unwrap_or_else(|| panic!("no pitch for {freq} Hz"));
            let error = (estimate.frequency - freq).abs() / freq;
            assert!(error < 0.01, "{freq} Hz estimated as {}", estimate.frequency);
            assert!(estimate.confidence > 0.8, "{freq} Hz confidence {}", estimate.confidence);
        }
    }

    #[test]
    fn quiet_sines_are_still_periodic() {
        let estimate = detect_pitch_yin(&sine(220.0, 0.01, 4096), SAMPLE_RATE, &params()).unwrap();
        assert!((estimate.frequency - 220.0).abs() < 2.2);
    }

    #[test]
    fn harmonic_rich_tone_reports_its_fundamental() {
        let fundamental = 146.83;
        let signal: Vec<f32> = (0..4096)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (1..=5)
                    .map(|h| (2.0 * PI * fundamental * h as f32 * t).sin() / h as f32)
                    .sum::<f32>()
                    * 0.3
            })
            .collect();
        let estimate = detect_pitch_yin(&signal, SAMPLE_RATE, &params()).unwrap();
        assert!((estimate.frequency - fundamental).abs() / fundamental < 0.01);
    }

    #[test]
    fn silence_has_no_pitch() {
        assert!(detect_pitch_yin(&vec![0.0; 4096], SAMPLE_RATE, &params()).is_none());
    }

    #[test]
    fn empty_and_tiny_windows_have_no_pitch() {
        assert!(detect_pitch_yin(&[], SAMPLE_RATE, &params()).is_none());
        assert!(detect_pitch_yin(&[0.1, -0.1], SAMPLE_RATE, &params()).is_none());
        assert!(detect_pitch_yin(&sine(440.0, 0.5, 4096), 0, &params()).is_none());
    }

    #[test]
    fn noise_has_no_pitch() {
        // Deterministic LCG noise.
        let mut state: u32 = 12345;
        let noise: Vec<f32> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect();
        assert!(detect_pitch_yin(&noise, SAMPLE_RATE, &params()).is_none());
    }

    #[test]
    fn frequencies_outside_the_range_are_ignored() {
        let narrow = YinParams {
            min_frequency: 300.0,
            max_frequency: 2000.0,
            ..params()
        };
        // 100 Hz has period 441, past the 147-sample search limit; its
        // harmonics never dip under the threshold inside the range either.
        assert!(detect_pitch_yin(&sine(100.0, 0.5, 4096), SAMPLE_RATE, &narrow).is_none());
    }

    #[test]
    fn cmndf_starts_at_one_and_guards_zero_sums() {
        let mut values = vec![0.0, 0.0, 2.0, 4.0];
        cumulative_mean_normalize(&mut values);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 1.0);
        assert!((values[2] - 2.0).abs() < 1e-6);
        assert!((values[3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn interpolation_skips_flat_and_edge_lags() {
        assert_eq!(parabolic_interpolation(&[0.5, 0.5, 0.5], 1), 1.0);
        assert_eq!(parabolic_interpolation(&[0.5, 0.2], 1), 1.0);
        let refined = parabolic_interpolation(&[0.4, 0.1, 0.2], 1);
        assert!(refined > 1.0 && refined < 1.5);
    }

    #[test]
    fn interpolation_keeps_vertices_past_the_neighbours() {
        // Vertex of y = 0.5 + 0.45x - 0.05x^2 (x relative to tau) sits at 4.5.
        let refined = parabolic_interpolation(&[0.0, 0.5, 0.9], 1);
        assert!((refined - 5.5).abs() < 1e-3, "vertex at {refined}");
    }
}
