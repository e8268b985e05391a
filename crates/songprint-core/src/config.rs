//! Configuration parameters for feature extraction
//!
//! Defaults match the librosa feature functions the catalog was built with.

use serde::{Deserialize, Serialize};

/// Number of MFCC coefficients per fingerprint
pub const MFCC_LEN: usize = 13;
/// Number of pitch classes per fingerprint
pub const CHROMA_LEN: usize = 12;
/// Number of spectral contrast bands per fingerprint (octave bands + 1)
pub const SPECTRAL_CONTRAST_LEN: usize = 7;

/// Analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    // Short-time Fourier transform
    pub n_fft: usize,
    pub hop_length: usize,

    // MFCC
    pub n_mels: usize,
    pub top_db: f64,

    // Chroma
    /// Fixed tuning offset in semitones; estimated per file when unset
    pub tuning: Option<f64>,
    pub chroma_center_octave: f64,
    pub chroma_octave_width: f64,

    // Spectral contrast
    pub contrast_fmin: f64,
    pub contrast_quantile: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,

            n_mels: 128,
            top_db: 80.0,

            tuning: None,
            chroma_center_octave: 5.0,
            chroma_octave_width: 2.0,

            contrast_fmin: 200.0,
            contrast_quantile: 0.02,
        }
    }
}

impl FeatureConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.n_fft < 2 {
            anyhow::bail!("n_fft must be >= 2");
        }
        if self.hop_length == 0 {
            anyhow::bail!("hop_length must be > 0");
        }
        if self.n_mels < MFCC_LEN {
            anyhow::bail!("n_mels must be >= {}", MFCC_LEN);
        }
        if self.top_db <= 0.0 {
            anyhow::bail!("top_db must be > 0");
        }
        if let Some(tuning) = self.tuning {
            if !(-0.5..0.5).contains(&tuning) {
                anyhow::bail!("tuning must be within [-0.5, 0.5)");
            }
        }
        if self.chroma_octave_width <= 0.0 {
            anyhow::bail!("chroma_octave_width must be > 0");
        }
        if self.contrast_fmin <= 0.0 {
            anyhow::bail!("contrast_fmin must be > 0");
        }
        if !(self.contrast_quantile > 0.0 && self.contrast_quantile < 1.0) {
            anyhow::bail!("contrast_quantile must be in (0, 1)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(FeatureConfig::default().validate().is_ok());
    }

    #[test]
    fn test_too_few_mel_bands_rejected() {
        let config = FeatureConfig {
            n_mels: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tuning_override_range() {
        let config = FeatureConfig {
            tuning: Some(-0.25),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = FeatureConfig {
            tuning: Some(0.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
