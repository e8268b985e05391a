//! Pitch-class (chroma) energy

use crate::config::CHROMA_LEN;

/// Maps STFT power spectra onto 12 pitch classes starting at C.
///
/// Each FFT bin spreads its energy over neighbouring pitch classes with a
/// Gaussian bump, and bins far from the centre octave are attenuated.
pub struct ChromaFilterbank {
    num_bins: usize,
    /// Row-major `[CHROMA_LEN][num_bins]`
    weights: Vec<f64>,
}

impl ChromaFilterbank {
    /// `tuning` shifts the reference A away from 440 Hz, in fractions of a
    /// semitone.
    pub fn new(
        sample_rate: u32,
        n_fft: usize,
        tuning: f64,
        center_octave: f64,
        octave_width: f64,
    ) -> Self {
        let n_chroma = CHROMA_LEN as f64;
        let num_bins = n_fft / 2 + 1;
        let a440 = 440.0 * 2f64.powf(tuning / n_chroma);

        // Fractional chroma bin of every FFT bin, octaves counted from A0 / 16
        let mut frqbins = Vec::with_capacity(n_fft);
        for k in 1..n_fft {
            let freq = k as f64 * sample_rate as f64 / n_fft as f64;
            frqbins.push(n_chroma * (freq / (a440 / 16.0)).log2());
        }
        // DC has no pitch; place it 1.5 octaves below the first bin
        frqbins.insert(0, frqbins[0] - 1.5 * n_chroma);

        let mut binwidths: Vec<f64> = frqbins
            .windows(2)
            .map(|w| (w[1] - w[0]).max(1.0))
            .collect();
        binwidths.push(1.0);

        let half = (n_chroma / 2.0).round();
        let mut wts = vec![0.0; CHROMA_LEN * n_fft];
        for (k, (&fb, &width)) in frqbins.iter().zip(&binwidths).enumerate() {
            for c in 0..CHROMA_LEN {
                let d = (fb - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
                wts[c * n_fft + k] = (-0.5 * (2.0 * d / width).powi(2)).exp();
            }
        }

        // L2-normalise each column, then apply the octave weighting
        for (k, &fb) in frqbins.iter().enumerate() {
            let norm = (0..CHROMA_LEN)
                .map(|c| wts[c * n_fft + k].powi(2))
                .sum::<f64>()
                .sqrt();
            let octave_weight =
                (-0.5 * ((fb / n_chroma - center_octave) / octave_width).powi(2)).exp();
            for c in 0..CHROMA_LEN {
                let w = &mut wts[c * n_fft + k];
                if norm > 0.0 {
                    *w /= norm;
                }
                *w *= octave_weight;
            }
        }

        // Rotate so row 0 is C rather than A, and keep the non-negative frequencies
        let mut weights = Vec::with_capacity(CHROMA_LEN * num_bins);
        for c in 0..CHROMA_LEN {
            let src = (c + 3) % CHROMA_LEN;
            weights.extend_from_slice(&wts[src * n_fft..src * n_fft + num_bins]);
        }

        Self { num_bins, weights }
    }

    /// Chroma of one power spectrum frame, scaled so its largest class is 1.
    /// Silent frames stay all-zero.
    pub fn apply(&self, power: &[f64]) -> [f64; CHROMA_LEN] {
        let mut chroma = [0.0; CHROMA_LEN];
        for (slot, row) in chroma.iter_mut().zip(self.weights.chunks(self.num_bins)) {
            *slot = row.iter().zip(power).map(|(w, p)| w * p).sum();
        }

        let peak = chroma.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if peak > f64::MIN_POSITIVE {
            for v in chroma.iter_mut() {
                *v /= peak;
            }
        }
        chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power_at(freq: f64, sample_rate: u32, n_fft: usize) -> Vec<f64> {
        let mut power = vec![0.0; n_fft / 2 + 1];
        let bin = (freq * n_fft as f64 / sample_rate as f64).round() as usize;
        power[bin] = 1.0;
        power
    }

    #[test]
    fn test_a440_maps_to_pitch_class_a() {
        let fb = ChromaFilterbank::new(22050, 4096, 0.0, 5.0, 2.0);
        let chroma = fb.apply(&power_at(440.0, 22050, 4096));

        // C=0, C#=1, ... A=9
        let best = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9);
        assert!((chroma[9] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_middle_c_maps_to_pitch_class_c() {
        let fb = ChromaFilterbank::new(22050, 4096, 0.0, 5.0, 2.0);
        let chroma = fb.apply(&power_at(261.63, 22050, 4096));
        let best = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 0);
    }

    #[test]
    fn test_tuning_recentres_detuned_bin() {
        // 430.66 Hz (bin 80 of 4096) is ~0.37 semitones flat of A440
        let power = power_at(430.66, 22050, 4096);
        let at_a440 = ChromaFilterbank::new(22050, 4096, 0.0, 5.0, 2.0).apply(&power);
        let tuned = ChromaFilterbank::new(22050, 4096, -0.37, 5.0, 2.0).apply(&power);

        assert!(at_a440[8] > 0.5, "G# = {}", at_a440[8]);
        assert!(tuned[8] < 0.2, "G# = {}", tuned[8]);
        assert!((tuned[9] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_silent_frame_stays_zero() {
        let fb = ChromaFilterbank::new(22050, 2048, 0.0, 5.0, 2.0);
        let chroma = fb.apply(&vec![0.0; 1025]);
        assert!(chroma.iter().all(|&v| v == 0.0));
    }
}
