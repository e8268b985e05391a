use serde::{Deserialize, Serialize};

/// A fingerprinted song as stored in the `songs` table.
///
/// Descriptor vectors are kept in their textual array encoding; decoding
/// them is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRow {
    pub id: i32,
    pub song_name: String,
    pub mfcc: String,
    pub chroma: String,
    pub spectral_contrast: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input structure for inserting a new song
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSong {
    pub song_name: String,
    pub mfcc: String,
    pub chroma: String,
    pub spectral_contrast: String,
    /// Raw audio payload, stored as BYTEA when present
    #[serde(skip)]
    pub audio_data: Option<Vec<u8>>,
}

/// One processed submission, kept as an audit log next to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmission {
    pub file_name: String,
    /// Decision record as returned to the caller
    pub result: serde_json::Value,
}
