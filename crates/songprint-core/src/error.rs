//! Error kinds surfaced by the fingerprinting pipeline

use thiserror::Error;

/// Failure of any pipeline stage.
///
/// Every variant carries a human-readable cause; `kind()` gives the stable
/// machine name used in structured error payloads.
#[derive(Debug, Error)]
pub enum SongprintError {
    /// Unreadable or unsupported audio
    #[error("decode error: {0}")]
    Decode(String),

    /// Feature computation failed on decoded samples
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Two descriptor vectors that must agree in length do not
    #[error("dimension mismatch in {descriptor}: expected {expected} values, found {found}")]
    DimensionMismatch {
        descriptor: &'static str,
        expected: usize,
        found: usize,
    },

    /// Malformed descriptor data read back from the catalog
    #[error("catalog read error: {0}")]
    CatalogRead(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    Config(String),
}

impl SongprintError {
    pub fn kind(&self) -> &'static str {
        match self {
            SongprintError::Decode(_) => "DecodeError",
            SongprintError::Extraction(_) => "ExtractionError",
            SongprintError::DimensionMismatch { .. } => "DimensionMismatchError",
            SongprintError::CatalogRead(_) => "CatalogReadError",
            SongprintError::Store(_) => "StoreError",
            SongprintError::Config(_) => "ConfigError",
        }
    }
}

pub type Result<T> = std::result::Result<T, SongprintError>;
