//! Tuning estimation
//!
//! Finds how far a recording sits from the A440 equal-tempered grid, as a
//! fraction of a semitone in `[-0.5, 0.5)`. Spectral peaks between 150 Hz and
//! 4 kHz are located by parabolic interpolation; the louder half of them vote
//! in a histogram of deviations from the nearest semitone.

const PITCH_FMIN: f64 = 150.0;
const PITCH_FMAX: f64 = 4000.0;
/// Peaks below this fraction of the frame maximum are ignored
const PEAK_THRESHOLD: f64 = 0.1;
/// Histogram bin width, in semitones
pub const TUNING_RESOLUTION: f64 = 0.01;

/// Collects interpolated spectral peaks frame by frame
pub struct TuningEstimator {
    bin_hz: f64,
    lo_bin: usize,
    hi_bin: usize,
    /// (frequency, magnitude) of every accepted peak
    peaks: Vec<(f64, f64)>,
}

impl TuningEstimator {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        let sr = sample_rate as f64;
        let bin_hz = sr / n_fft as f64;
        let fmax = PITCH_FMAX.min(sr / 2.0);
        let num_bins = n_fft / 2 + 1;

        let freq = |k: usize| k as f64 * bin_hz;
        let lo_bin = (0..num_bins).find(|&k| freq(k) >= PITCH_FMIN).unwrap_or(num_bins);
        let hi_bin = (0..num_bins).find(|&k| freq(k) >= fmax).unwrap_or(num_bins);

        Self {
            bin_hz,
            lo_bin,
            hi_bin,
            peaks: Vec::new(),
        }
    }

    /// Record the peaks of one power spectrum frame
    pub fn observe(&mut self, power: &[f64]) {
        let n = power.len();
        if n == 0 {
            return;
        }
        let floor = PEAK_THRESHOLD * power.iter().fold(0.0f64, |acc, &p| acc.max(p));
        let gated = |k: usize| if power[k] > floor { power[k] } else { 0.0 };

        for k in self.lo_bin..self.hi_bin.min(n) {
            let here = gated(k);
            let prev = if k == 0 { here } else { gated(k - 1) };
            let next = if k + 1 == n { here } else { gated(k + 1) };
            if !(here > prev && here >= next) {
                continue;
            }

            // Vertex of the parabola through the raw neighbours
            let (shift, skew) = if k == 0 || k + 1 == n {
                (0.0, 0.0)
            } else {
                let slope = 0.5 * (power[k + 1] - power[k - 1]);
                let curvature = 2.0 * power[k] - power[k + 1] - power[k - 1];
                let guard = if curvature.abs() < f64::MIN_POSITIVE { 1.0 } else { 0.0 };
                let shift = slope / (curvature + guard);
                (shift, 0.5 * slope * shift)
            };

            let frequency = (k as f64 + shift) * self.bin_hz;
            if frequency > 0.0 {
                self.peaks.push((frequency, power[k] + skew));
            }
        }
    }

    /// Estimated tuning offset in semitones; 0 when no peak was seen
    pub fn estimate(&self) -> f64 {
        if self.peaks.is_empty() {
            return 0.0;
        }
        let mut magnitudes: Vec<f64> = self.peaks.iter().map(|&(_, m)| m).collect();
        let threshold = median(&mut magnitudes);

        let frequencies: Vec<f64> = self
            .peaks
            .iter()
            .filter(|&&(_, m)| m >= threshold)
            .map(|&(f, _)| f)
            .collect();
        pitch_tuning(&frequencies, TUNING_RESOLUTION, 12)
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Most common deviation of `frequencies` from the equal-tempered grid.
///
/// Returns the lower edge of the winning histogram bin.
pub fn pitch_tuning(frequencies: &[f64], resolution: f64, bins_per_octave: usize) -> f64 {
    let n_bins = (1.0 / resolution).ceil() as usize;
    let step = 1.0 / n_bins as f64;
    let edge = |i: usize| -0.5 + i as f64 * step;

    let mut counts = vec![0usize; n_bins];
    let mut seen = false;
    for &f in frequencies.iter().filter(|&&f| f > 0.0) {
        let mut residual =
            (bins_per_octave as f64 * (f / (440.0 / 16.0)).log2()).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }

        let mut idx = (((residual + 0.5) * n_bins as f64) as usize).min(n_bins - 1);
        if residual < edge(idx) && idx > 0 {
            idx -= 1;
        } else if idx + 1 < n_bins && residual >= edge(idx + 1) {
            idx += 1;
        }
        counts[idx] += 1;
        seen = true;
    }

    if !seen {
        return 0.0;
    }
    // First maximum wins
    let best = counts
        .iter()
        .enumerate()
        .fold(0, |best, (i, &c)| if c > counts[best] { i } else { best });
    edge(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_in_tune_frequencies() {
        let freqs = [440.0, 220.0, 261.6255653005986, 880.0];
        assert_abs_diff_eq!(pitch_tuning(&freqs, 0.01, 12), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_frequencies_vote_negative() {
        let flat = |f: f64| f * 2f64.powf(-0.3 / 12.0);
        let freqs = [flat(440.0), flat(330.0), flat(523.2511306011972), 1000.0];
        let tuning = pitch_tuning(&freqs, 0.01, 12);
        assert!((-0.32..=-0.28).contains(&tuning), "tuning = {}", tuning);
    }

    #[test]
    fn test_no_frequencies_is_zero() {
        assert_eq!(pitch_tuning(&[], 0.01, 12), 0.0);
        assert_eq!(pitch_tuning(&[0.0, -5.0], 0.01, 12), 0.0);
    }

    #[test]
    fn test_estimator_on_single_peak_spectrum() {
        // Symmetric peak: interpolation lands exactly on bin 40
        let (sr, n_fft) = (22050, 2048);
        let mut power = vec![0.0; n_fft / 2 + 1];
        power[39] = 0.5;
        power[40] = 1.0;
        power[41] = 0.5;

        let mut estimator = TuningEstimator::new(sr, n_fft);
        estimator.observe(&power);
        assert_eq!(estimator.peaks.len(), 1);
        assert_abs_diff_eq!(estimator.peaks[0].0, 40.0 * 22050.0 / 2048.0, epsilon = 1e-9);

        // 430.66 Hz sits about 0.37 semitones below A440
        let tuning = estimator.estimate();
        assert!((-0.39..=-0.36).contains(&tuning), "tuning = {}", tuning);
    }

    #[test]
    fn test_estimator_ignores_silence() {
        let mut estimator = TuningEstimator::new(22050, 2048);
        estimator.observe(&vec![0.0; 1025]);
        assert_eq!(estimator.estimate(), 0.0);
    }
}
