//! Harmonic plausibility of a pitch candidate.
//!
//! A real plucked string carries energy at integer multiples of its
//! fundamental. Looking at the first few partials weeds out octave errors
//! and noise that YIN happened to find periodic.

/// Number of partials inspected, fundamental included.
pub const HARMONIC_COUNT: usize = 5;

/// Scores `frequency` against a normalized magnitude spectrum.
///
/// Partial `h` is weighted by `1 / h` and read as the loudest of its bin and
/// the two neighbours, which tolerates slight drift. Partials above Nyquist
/// are not considered.
///
/// # Returns
/// Weighted mean magnitude in [0, 1]; 0 when no partial fits in range.
pub fn harmonic_score(magnitudes: &[f32], frequency: f32, sample_rate: u32) -> f32 {
    if magnitudes.is_empty() || sample_rate == 0 || !(frequency > 0.0) {
        return 0.0;
    }
    let nyquist = sample_rate as f32 / 2.0;
    let bin_width = sample_rate as f32 / (2.0 * magnitudes.len() as f32);

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for h in 1..=HARMONIC_COUNT {
        let partial = h as f32 * frequency;
        if partial > nyquist {
            break;
        }
        let bin = (partial / bin_width).round() as usize;
        let magnitude = peak_near(magnitudes, bin);
        let weight = 1.0 / h as f32;
        weighted_sum += magnitude * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return 0.0;
    }
    (weighted_sum / total_weight).clamp(0.0, 1.0)
}

/// Largest magnitude among `bin - 1..=bin + 1`, ignoring bins out of range.
fn peak_near(magnitudes: &[f32], bin: usize) -> f32 {
    let start = bin.saturating_sub(1);
    let end = (bin + 1).min(magnitudes.len() - 1);
    if start > end {
        return 0.0;
    }
    magnitudes[start..=end].iter().copied().fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;
    const BINS: usize = 2048;

    fn bin_of(freq: f32) -> usize {
        let bin_width = SAMPLE_RATE as f32 / (2.0 * BINS as f32);
        (freq / bin_width).round() as usize
    }

    fn spectrum_with_partials(fundamental: f32, partials: &[usize]) -> Vec<f32> {
        let mut spectrum = vec![0.0; BINS];
        for &h in partials {
            spectrum[bin_of(fundamental * h as f32)] = 1.0;
        }
        spectrum
    }

    #[test]
    fn full_harmonic_series_scores_one() {
        let spectrum = spectrum_with_partials(196.0, &[1, 2, 3, 4, 5]);
        let score = harmonic_score(&spectrum, 196.0, SAMPLE_RATE);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bare_fundamental_scores_lower() {
        let rich = harmonic_score(&spectrum_with_partials(196.0, &[1, 2, 3, 4, 5]), 196.0, SAMPLE_RATE);
        let bare = harmonic_score(&spectrum_with_partials(196.0, &[1]), 196.0, SAMPLE_RATE);
        assert!(bare < rich);
        // 1 / (1 + 1/2 + 1/3 + 1/4 + 1/5)
        assert!((bare - 0.438).abs() < 1e-3);
    }

    #[test]
    fn neighbouring_bins_absorb_drift() {
        let mut spectrum = vec![0.0; BINS];
        for h in 1..=5 {
            spectrum[bin_of(330.0 * h as f32) + 1] = 0.8;
        }
        let score = harmonic_score(&spectrum, 330.0, SAMPLE_RATE);
        assert!((score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn octave_error_is_penalised() {
        // A real 110 Hz note judged as if it were 55 Hz: the odd partials of
        // the wrong fundamental land on empty bins.
        let spectrum = spectrum_with_partials(110.0, &[1, 2, 3, 4, 5]);
        let right = harmonic_score(&spectrum, 110.0, SAMPLE_RATE);
        let wrong = harmonic_score(&spectrum, 55.0, SAMPLE_RATE);
        assert!(wrong < right);
        assert!(wrong < 0.5);
    }

    #[test]
    fn partials_above_nyquist_are_skipped() {
        let spectrum = vec![1.0; BINS];
        // Only the fundamental of 15 kHz fits under 22.05 kHz.
        assert!((harmonic_score(&spectrum, 15000.0, SAMPLE_RATE) - 1.0).abs() < 1e-6);
        assert_eq!(harmonic_score(&spectrum, 30000.0, SAMPLE_RATE), 0.0);
    }

    #[test]
    fn degenerate_input_scores_zero() {
        assert_eq!(harmonic_score(&[], 440.0, SAMPLE_RATE), 0.0);
        assert_eq!(harmonic_score(&[1.0; 16], 0.0, SAMPLE_RATE), 0.0);
        assert_eq!(harmonic_score(&[1.0; 16], 440.0, 0), 0.0);
    }
}
