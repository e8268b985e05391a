//! Fingerprint similarity
//!
//! Each descriptor pair is unit-normalised, compared with the Pearson
//! correlation coefficient, and the three coefficients are averaged and
//! scaled to a 0-100 percentage. Pure functions only.

use crate::error::{Result, SongprintError};
use crate::fingerprint::Fingerprint;
use serde::Serialize;

/// Per-descriptor correlations and the combined percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub mfcc: f64,
    pub chroma: f64,
    pub spectral_contrast: f64,
    pub percentage: f64,
}

/// Scale a vector to unit Euclidean norm. A zero vector is returned unchanged.
pub fn normalize_vector(values: &[f64]) -> Vec<f64> {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return values.to_vec();
    }
    values.iter().map(|v| v / norm).collect()
}

/// Pearson correlation coefficient of two equal-length vectors.
///
/// Returns 0 when either vector has zero variance (all elements equal), where
/// the coefficient is undefined.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if is_constant(a) || is_constant(b) {
        return 0.0;
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

/// Compare a query fingerprint against a reference fingerprint.
///
/// Fails with `DimensionMismatch` if any descriptor pair differs in length.
pub fn compare(query: &Fingerprint, reference: &Fingerprint) -> Result<SimilarityScore> {
    let mut coefficients = [0.0; 3];

    for (slot, ((descriptor, q), (_, r))) in coefficients
        .iter_mut()
        .zip(query.descriptors().into_iter().zip(reference.descriptors()))
    {
        if q.len() != r.len() {
            return Err(SongprintError::DimensionMismatch {
                descriptor,
                expected: r.len(),
                found: q.len(),
            });
        }
        *slot = pearson_correlation(&normalize_vector(q), &normalize_vector(r));
    }

    let [mfcc, chroma, spectral_contrast] = coefficients;
    Ok(SimilarityScore {
        mfcc,
        chroma,
        spectral_contrast,
        percentage: (mfcc + chroma + spectral_contrast) / 3.0 * 100.0,
    })
}

/// Similarity percentage in `[-100, 100]`; 100 means identical shape on all
/// three descriptors.
pub fn similarity(query: &Fingerprint, reference: &Fingerprint) -> Result<f64> {
    compare(query, reference).map(|score| score.percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHROMA_LEN, MFCC_LEN, SPECTRAL_CONTRAST_LEN};
    use approx::assert_abs_diff_eq;

    fn ramp(len: usize, scale: f64, offset: f64) -> Vec<f64> {
        (0..len).map(|i| offset + scale * (i as f64).sin()).collect()
    }

    fn fingerprint(seed: f64) -> Fingerprint {
        Fingerprint::new(
            format!("song-{}", seed),
            ramp(MFCC_LEN, seed, -200.0),
            ramp(CHROMA_LEN, 0.3 * seed, 0.5),
            ramp(SPECTRAL_CONTRAST_LEN, 2.0 + seed, 20.0)
                .into_iter()
                .enumerate()
                .map(|(i, v)| v + seed * i as f64)
                .collect(),
        )
    }

    #[test]
    fn test_zero_vector_normalizes_to_itself() {
        assert_eq!(normalize_vector(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_unit_norm() {
        let v = normalize_vector(&[3.0, 4.0]);
        assert_abs_diff_eq!(v[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_is_mean_centered() {
        // Cosine similarity of these is high; correlation is perfectly negative
        let a = [10.0, 11.0, 12.0];
        let b = [12.0, 11.0, 10.0];
        assert_abs_diff_eq!(pearson_correlation(&a, &b), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_vector_contributes_zero() {
        assert_eq!(pearson_correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(pearson_correlation(&[0.0; 4], &[0.0; 4]), 0.0);
    }

    #[test]
    fn test_self_similarity_is_100() {
        let fp = fingerprint(1.7);
        assert_abs_diff_eq!(similarity(&fp, &fp).unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = fingerprint(1.0);
        let b = fingerprint(3.5);
        let ab = similarity(&a, &b).unwrap();
        let ba = similarity(&b, &a).unwrap();
        assert_abs_diff_eq!(ab, ba, epsilon = 1e-12);
        assert!(ab <= 100.0 && ab >= -100.0);
    }

    #[test]
    fn test_scale_does_not_change_score() {
        let a = fingerprint(2.0);
        let mut b = a.clone();
        b.mfcc.iter_mut().for_each(|v| *v *= 4.0);
        assert_abs_diff_eq!(similarity(&a, &b).unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_descriptor_caps_score() {
        let a = fingerprint(2.0);
        let mut b = a.clone();
        b.chroma = vec![0.0; CHROMA_LEN];
        let score = compare(&a, &b).unwrap();
        assert_eq!(score.chroma, 0.0);
        assert_abs_diff_eq!(score.percentage, 200.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_short_mfcc_is_dimension_mismatch() {
        let stored = fingerprint(1.0);
        let mut query = stored.clone();
        query.mfcc.truncate(12);

        match similarity(&query, &stored) {
            Err(SongprintError::DimensionMismatch {
                descriptor,
                expected,
                found,
            }) => {
                assert_eq!(descriptor, "mfcc");
                assert_eq!(expected, 13);
                assert_eq!(found, 12);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }
}
