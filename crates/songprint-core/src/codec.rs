//! Textual encoding of descriptor vectors
//!
//! The catalog stores each vector as a JSON array string. Encoding happens on
//! write, decoding on read; anything that does not decode to a non-empty list
//! of finite numbers is a catalog read error.

use crate::error::{Result, SongprintError};

pub fn encode_vector(values: &[f64]) -> String {
    // serde_json cannot fail on a slice of f64; non-finite values become null
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_vector(descriptor: &str, encoded: &str) -> Result<Vec<f64>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(encoded).map_err(|e| {
        SongprintError::CatalogRead(format!("{} is not a JSON array: {}", descriptor, e))
    })?;

    if values.is_empty() {
        return Err(SongprintError::CatalogRead(format!("{} is empty", descriptor)));
    }

    values
        .iter()
        .enumerate()
        .map(|(i, v)| match v.as_f64() {
            Some(x) if x.is_finite() => Ok(x),
            _ => Err(SongprintError::CatalogRead(format!(
                "{}[{}] is not a finite number: {}",
                descriptor, i, v
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_json_array() {
        assert_eq!(encode_vector(&[1.5, -2.0, 0.25]), "[1.5,-2.0,0.25]");
    }

    #[test]
    fn test_decode_accepts_python_style_spacing() {
        // json.dumps output uses ", " separators
        assert_eq!(
            decode_vector("mfcc", "[-210.5, 88.25, 3]").unwrap(),
            vec![-210.5, 88.25, 3.0]
        );
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let err = decode_vector("chroma", r#"[0.1, "loud", 0.3]"#).unwrap_err();
        assert_eq!(err.kind(), "CatalogReadError");
        assert!(err.to_string().contains("chroma[1]"));
    }

    #[test]
    fn test_decode_rejects_garbage_and_empty() {
        assert!(decode_vector("mfcc", "not json").is_err());
        assert!(decode_vector("mfcc", "{\"a\": 1}").is_err());
        assert!(decode_vector("mfcc", "[]").is_err());
        assert!(decode_vector("mfcc", "[null]").is_err());
    }
}
