//! Spectral fingerprint of one audio file

use crate::config::{CHROMA_LEN, MFCC_LEN, SPECTRAL_CONTRAST_LEN};
use crate::error::{Result, SongprintError};
use serde::{Deserialize, Serialize};

/// Three time-averaged descriptor vectors summarising a song.
///
/// `name` is only a label; it takes no part in similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "song_name")]
    pub name: String,
    pub mfcc: Vec<f64>,
    pub chroma: Vec<f64>,
    pub spectral_contrast: Vec<f64>,
}

impl Fingerprint {
    pub fn new(
        name: impl Into<String>,
        mfcc: Vec<f64>,
        chroma: Vec<f64>,
        spectral_contrast: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            mfcc,
            chroma,
            spectral_contrast,
        }
    }

    /// Descriptor vectors paired with their names, in comparison order
    pub fn descriptors(&self) -> [(&'static str, &[f64]); 3] {
        [
            ("mfcc", self.mfcc.as_slice()),
            ("chroma", self.chroma.as_slice()),
            ("spectral_contrast", self.spectral_contrast.as_slice()),
        ]
    }

    /// Check the fixed descriptor lengths and that every value is finite
    pub fn validate(&self) -> Result<()> {
        let expected = [MFCC_LEN, CHROMA_LEN, SPECTRAL_CONTRAST_LEN];
        for ((descriptor, values), expected) in self.descriptors().into_iter().zip(expected) {
            if values.len() != expected {
                return Err(SongprintError::DimensionMismatch {
                    descriptor,
                    expected,
                    found: values.len(),
                });
            }
            if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
                return Err(SongprintError::Extraction(format!(
                    "{} value {} is not finite ({})",
                    descriptor, pos, values[pos]
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Fingerprint {
        Fingerprint::new(
            "a.wav",
            vec![1.0; MFCC_LEN],
            vec![0.5; CHROMA_LEN],
            vec![20.0; SPECTRAL_CONTRAST_LEN],
        )
    }

    #[test]
    fn test_valid_fingerprint() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_short_mfcc_rejected() {
        let mut fp = valid();
        fp.mfcc.pop();
        let err = fp.validate().unwrap_err();
        assert!(matches!(
            err,
            SongprintError::DimensionMismatch {
                descriptor: "mfcc",
                expected: 13,
                found: 12
            }
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let mut fp = valid();
        fp.chroma[3] = f64::NAN;
        assert_eq!(fp.validate().unwrap_err().kind(), "ExtractionError");
    }

    #[test]
    fn test_serializes_with_song_name() {
        let json = serde_json::to_value(valid()).unwrap();
        assert_eq!(json["song_name"], "a.wav");
        assert_eq!(json["mfcc"].as_array().unwrap().len(), MFCC_LEN);
    }
}
