//! Songprint Core - Audio Duplicate Detection Library
//!
//! Summarises an audio file as three averaged spectral descriptors (MFCC,
//! chroma, spectral contrast), scores it against a catalog of previously
//! accepted songs, and appends it to the catalog when it is not a duplicate.

pub mod audio;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod matching;
pub mod similarity;
pub mod storage_backend;
pub mod storage_config;
pub mod transform;

pub use audio::{AudioDecoder, DecodedAudio, FileDecoder};
pub use config::FeatureConfig;
pub use coordinator::{Coordinator, DecisionOutcome, DecisionRecord};
pub use error::{Result, SongprintError};
pub use features::FeatureExtractor;
pub use fingerprint::Fingerprint;
pub use matching::{CatalogMatch, CatalogScanner, ScanOutcome};
pub use similarity::{compare, similarity, SimilarityScore};
pub use storage_backend::{
    open_store, CatalogStore, EntryId, FilesystemCatalog, MemoryCatalog, NewCatalogEntry,
    PostgresCatalog, StoredFingerprint, Submission,
};
pub use storage_config::SongprintConfig;

