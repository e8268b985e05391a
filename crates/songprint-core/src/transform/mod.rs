//! Short-time Fourier transform
//!
//! Centered, Hann-windowed frames matching librosa's `stft` defaults. Frames
//! are handed to a callback one at a time so long recordings never need the
//! full spectrogram in memory.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Frame-by-frame STFT engine
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        Self {
            n_fft,
            hop_length,
            window: create_hann_window(n_fft),
            fft,
        }
    }

    /// Number of frequency bins per frame (`n_fft / 2 + 1`)
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn num_frames(&self, len: usize) -> usize {
        // Centering pads n_fft / 2 on both sides
        1 + len / self.hop_length
    }

    /// Run the transform, calling `on_frame` with each frame's magnitude spectrum
    pub fn for_each_frame<F>(&self, samples: &[f32], mut on_frame: F)
    where
        F: FnMut(usize, &[f64]),
    {
        let pad = self.n_fft / 2;
        let num_frames = self.num_frames(samples.len());

        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        let mut magnitudes = vec![0.0; self.num_bins()];

        for frame_idx in 0..num_frames {
            // Position of the frame's first sample in the unpadded signal
            let start = (frame_idx * self.hop_length) as isize - pad as isize;

            for (i, slot) in buffer.iter_mut().enumerate() {
                let pos = start + i as isize;
                let sample = if pos >= 0 && (pos as usize) < samples.len() {
                    samples[pos as usize] as f64
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (mag, bin) in magnitudes.iter_mut().zip(buffer.iter()) {
                *mag = bin.norm();
            }

            on_frame(frame_idx, &magnitudes);
        }
    }
}

/// Center frequency of each STFT bin
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let num_bins = n_fft / 2 + 1;
    (0..num_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Periodic Hann window
fn create_hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(512);
        assert_eq!(window.len(), 512);
        assert!(window[0].abs() < 1e-12);
        assert!((window[256] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_frame_count_matches_centered_stft() {
        let stft = Stft::new(2048, 512);
        assert_eq!(stft.num_frames(22050), 44);
        assert_eq!(stft.num_frames(10), 1);

        let mut seen = 0;
        stft.for_each_frame(&vec![0.0f32; 22050], |_, frame| {
            assert_eq!(frame.len(), 1025);
            seen += 1;
        });
        assert_eq!(seen, 44);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let sr = 8000u32;
        let n_fft = 1024;
        // 1000 Hz lands exactly on bin 128
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();

        let stft = Stft::new(n_fft, 256);
        let mut peak_bin = 0;
        stft.for_each_frame(&samples, |frame_idx, frame| {
            if frame_idx == 10 {
                peak_bin = frame
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap();
            }
        });
        assert_eq!(peak_bin, 128);
    }

    #[test]
    fn test_fft_frequencies() {
        let freqs = fft_frequencies(22050, 2048);
        assert_eq!(freqs.len(), 1025);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1024] - 11025.0).abs() < 1e-9);
    }
}
