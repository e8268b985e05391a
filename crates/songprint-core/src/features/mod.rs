//! Feature extraction
//!
//! Computes MFCC, chroma and spectral contrast over centered STFT frames in a
//! single pass, then averages each descriptor across frames. Unless a tuning
//! offset is configured, a preliminary pass estimates it for the chroma
//! filterbank.

mod chroma;
mod contrast;
mod mel;
mod tuning;

pub use chroma::ChromaFilterbank;
pub use contrast::ContrastBands;
pub use mel::{hz_to_mel, mel_to_hz, power_to_db, Dct, MelFilterbank};
pub use tuning::{pitch_tuning, TuningEstimator};

use crate::audio::DecodedAudio;
use crate::config::{FeatureConfig, CHROMA_LEN, MFCC_LEN, SPECTRAL_CONTRAST_LEN};
use crate::error::{Result, SongprintError};
use crate::fingerprint::Fingerprint;
use crate::transform::Stft;

/// Derives a [`Fingerprint`] from decoded mono audio
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, name: &str, audio: &DecodedAudio) -> Result<Fingerprint> {
        let cfg = &self.config;
        cfg.validate()
            .map_err(|e| SongprintError::Extraction(e.to_string()))?;

        if audio.samples.is_empty() {
            return Err(SongprintError::Extraction("empty signal".to_string()));
        }
        if audio.sample_rate == 0 {
            return Err(SongprintError::Extraction("sample rate must be > 0".to_string()));
        }
        if let Some(pos) = audio.samples.iter().position(|s| !s.is_finite()) {
            return Err(SongprintError::Extraction(format!(
                "sample {} is not finite",
                pos
            )));
        }

        let sr = audio.sample_rate;
        let stft = Stft::new(cfg.n_fft, cfg.hop_length);
        let mel_fb = MelFilterbank::new(sr, cfg.n_fft, cfg.n_mels);
        let tuning = match cfg.tuning {
            Some(tuning) => tuning,
            None => estimate_tuning(&stft, &audio.samples, sr, cfg.n_fft),
        };
        log::debug!("Chroma tuning offset {:+.2} semitones", tuning);
        let chroma_fb = ChromaFilterbank::new(
            sr,
            cfg.n_fft,
            tuning,
            cfg.chroma_center_octave,
            cfg.chroma_octave_width,
        );
        let contrast_bands = ContrastBands::new(sr, cfg.n_fft, cfg.contrast_fmin, cfg.contrast_quantile)
            .map_err(SongprintError::Extraction)?;

        let num_frames = stft.num_frames(audio.samples.len());
        let mut mel_spec = Vec::with_capacity(num_frames * mel_fb.n_mels());
        let mut chroma_sum = [0.0; CHROMA_LEN];
        let mut peaks = Vec::with_capacity(num_frames * SPECTRAL_CONTRAST_LEN);
        let mut valleys = Vec::with_capacity(num_frames * SPECTRAL_CONTRAST_LEN);

        let mut power = vec![0.0; stft.num_bins()];
        let mut scratch = Vec::new();

        stft.for_each_frame(&audio.samples, |_, magnitudes| {
            for (p, m) in power.iter_mut().zip(magnitudes) {
                *p = m * m;
            }

            mel_fb.apply(&power, &mut mel_spec);

            for (acc, v) in chroma_sum.iter_mut().zip(chroma_fb.apply(&power)) {
                *acc += v;
            }

            let (peak, valley) = contrast_bands.measure(magnitudes, &mut scratch);
            peaks.extend_from_slice(&peak);
            valleys.extend_from_slice(&valley);
        });

        log::debug!(
            "Analysed {} frames ({} samples @ {}Hz)",
            num_frames,
            audio.samples.len(),
            sr
        );

        let frames = num_frames as f64;

        // MFCC: log-mel over the whole spectrogram, DCT per frame, then mean
        power_to_db(&mut mel_spec, cfg.top_db);
        let dct = Dct::new(mel_fb.n_mels(), MFCC_LEN);
        let mut mfcc = vec![0.0; MFCC_LEN];
        for frame in mel_spec.chunks(mel_fb.n_mels()) {
            dct.accumulate(frame, &mut mfcc);
        }
        mfcc.iter_mut().for_each(|v| *v /= frames);

        let chroma: Vec<f64> = chroma_sum.iter().map(|v| v / frames).collect();

        // Contrast: peak and valley are each converted to dB as whole matrices
        power_to_db(&mut peaks, cfg.top_db);
        power_to_db(&mut valleys, cfg.top_db);
        let mut spectral_contrast = vec![0.0; SPECTRAL_CONTRAST_LEN];
        for (peak, valley) in peaks
            .chunks(SPECTRAL_CONTRAST_LEN)
            .zip(valleys.chunks(SPECTRAL_CONTRAST_LEN))
        {
            for ((acc, p), v) in spectral_contrast.iter_mut().zip(peak).zip(valley) {
                *acc += p - v;
            }
        }
        spectral_contrast.iter_mut().for_each(|v| *v /= frames);

        let fingerprint = Fingerprint::new(name, mfcc, chroma, spectral_contrast);
        fingerprint.validate()?;
        Ok(fingerprint)
    }
}

fn estimate_tuning(stft: &Stft, samples: &[f32], sample_rate: u32, n_fft: usize) -> f64 {
    let mut estimator = TuningEstimator::new(sample_rate, n_fft);
    let mut power = vec![0.0; stft.num_bins()];
    stft.for_each_frame(samples, |_, magnitudes| {
        for (p, m) in power.iter_mut().zip(magnitudes) {
            *p = m * m;
        }
        estimator.observe(&power);
    });
    estimator.estimate()
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freqs: &[f32], sample_rate: u32, seconds: f32) -> DecodedAudio {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
            })
            .collect();
        DecodedAudio {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn test_extract_produces_contract_lengths() {
        let fp = FeatureExtractor::default()
            .extract("tone.wav", &tone(&[440.0], 22050, 1.0))
            .unwrap();
        assert_eq!(fp.name, "tone.wav");
        assert_eq!(fp.mfcc.len(), MFCC_LEN);
        assert_eq!(fp.chroma.len(), CHROMA_LEN);
        assert_eq!(fp.spectral_contrast.len(), SPECTRAL_CONTRAST_LEN);
    }

    #[test]
    fn test_a440_chroma_dominated_by_a() {
        let fp = FeatureExtractor::default()
            .extract("a.wav", &tone(&[440.0], 22050, 1.0))
            .unwrap();
        let best = fp
            .chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9);
    }

    #[test]
    fn test_detuned_tone_lands_in_one_pitch_class() {
        // A4 lowered by 45 cents
        let audio = tone(&[440.0 * 2f32.powf(-0.45 / 12.0)], 22050, 2.0);

        let estimated = FeatureExtractor::default().extract("flat.wav", &audio).unwrap();
        let at_a440 = FeatureExtractor::new(FeatureConfig {
            tuning: Some(0.0),
            ..Default::default()
        })
        .extract("flat.wav", &audio)
        .unwrap();

        assert!(estimated.chroma[8] < 0.45 * estimated.chroma[9], "{:?}", estimated.chroma);
        assert!(at_a440.chroma[8] > 0.6 * at_a440.chroma[9], "{:?}", at_a440.chroma);
    }

    #[test]
    fn test_tuning_estimate_on_detuned_tone() {
        let audio = tone(&[440.0 * 2f32.powf(-0.45 / 12.0)], 22050, 2.0);
        let tuning = estimate_tuning(&Stft::new(2048, 512), &audio.samples, 22050, 2048);
        assert!((-0.5..=-0.3).contains(&tuning), "tuning = {}", tuning);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let audio = tone(&[220.0, 330.0], 22050, 0.5);
        let extractor = FeatureExtractor::default();
        assert_eq!(
            extractor.extract("x", &audio).unwrap(),
            extractor.extract("x", &audio).unwrap()
        );
    }

    #[test]
    fn test_silence_is_finite() {
        let audio = DecodedAudio {
            samples: vec![0.0; 22050],
            sample_rate: 22050,
        };
        let fp = FeatureExtractor::default().extract("silence", &audio).unwrap();
        assert!(fp.chroma.iter().all(|&v| v == 0.0));
        assert!(fp.spectral_contrast.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_signal_fails() {
        let audio = DecodedAudio {
            samples: Vec::new(),
            sample_rate: 22050,
        };
        let err = FeatureExtractor::default().extract("empty", &audio).unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
    }

    #[test]
    fn test_low_sample_rate_fails() {
        let err = FeatureExtractor::default()
            .extract("phone.wav", &tone(&[440.0], 8000, 0.5))
            .unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
    }
}
