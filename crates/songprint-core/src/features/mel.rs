//! Mel-frequency cepstral coefficients
//!
//! Slaney-style mel filterbank (linear below 1 kHz, logarithmic above,
//! unit-area triangles) followed by log compression and an orthonormal
//! DCT-II.

use std::f64::consts::PI;

const AMIN: f64 = 1e-10;

// Slaney mel scale constants
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank over `[0, sample_rate / 2]`
pub struct MelFilterbank {
    n_mels: usize,
    num_bins: usize,
    /// Row-major `[n_mels][num_bins]`
    weights: Vec<f64>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let num_bins = n_fft / 2 + 1;
        let fft_freqs = crate::transform::fft_frequencies(sample_rate, n_fft);

        let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
        let mel_f: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let mut weights = vec![0.0; n_mels * num_bins];
        for m in 0..n_mels {
            let lower_width = mel_f[m + 1] - mel_f[m];
            let upper_width = mel_f[m + 2] - mel_f[m + 1];
            let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);

            for (k, &freq) in fft_freqs.iter().enumerate() {
                let lower = (freq - mel_f[m]) / lower_width;
                let upper = (mel_f[m + 2] - freq) / upper_width;
                weights[m * num_bins + k] = lower.min(upper).max(0.0) * enorm;
            }
        }

        Self {
            n_mels,
            num_bins,
            weights,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// Project one power spectrum frame onto the mel bands
    pub fn apply(&self, power: &[f64], out: &mut Vec<f64>) {
        out.extend(self.weights.chunks(self.num_bins).map(|row| {
            row.iter().zip(power).map(|(w, p)| w * p).sum::<f64>()
        }));
    }
}

/// Convert power values to decibels in place, clipping everything more than
/// `top_db` below the peak.
pub fn power_to_db(values: &mut [f64], top_db: f64) {
    let mut max_db = f64::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }
    let floor = max_db - top_db;
    for v in values.iter_mut() {
        *v = v.max(floor);
    }
}

/// Orthonormal DCT-II, keeping the first `n_coeffs` outputs
pub struct Dct {
    n_inputs: usize,
    /// Row-major `[n_coeffs][n_inputs]`
    basis: Vec<f64>,
}

impl Dct {
    pub fn new(n_inputs: usize, n_coeffs: usize) -> Self {
        let n = n_inputs as f64;
        let mut basis = Vec::with_capacity(n_coeffs * n_inputs);
        for k in 0..n_coeffs {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            for i in 0..n_inputs {
                basis.push(scale * (PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n)).cos());
            }
        }
        Self { n_inputs, basis }
    }

    /// Add the transform of `input` into `acc`
    pub fn accumulate(&self, input: &[f64], acc: &mut [f64]) {
        for (row, slot) in self.basis.chunks(self.n_inputs).zip(acc.iter_mut()) {
            *slot += row.iter().zip(input).map(|(b, x)| b * x).sum::<f64>();
        }
    }
}
