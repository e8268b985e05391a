//! Catalog entry file format
//!
//! One file per catalog entry, stored as pretty JSON or BSON. Descriptor
//! vectors are kept in their textual array encoding so both formats carry
//! exactly what the relational backend stores.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current entry file version
pub const ENTRY_FILE_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum EntryFileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON entry file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode BSON entry file {path}: {source}")]
    BsonEncode {
        path: PathBuf,
        #[source]
        source: bson::ser::Error,
    },
    #[error("invalid BSON entry file {path}: {source}")]
    BsonDecode {
        path: PathBuf,
        #[source]
        source: bson::de::Error,
    },
    #[error("unrecognised entry file extension: {0}")]
    UnknownExtension(PathBuf),
    #[error("unsupported entry file version {found} in {path}")]
    UnsupportedVersion { path: PathBuf, found: String },
}

impl EntryFileError {
    /// A write found its target file already present
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            EntryFileError::Io { source, .. } if source.kind() == std::io::ErrorKind::AlreadyExists
        )
    }
}

pub type Result<T> = std::result::Result<T, EntryFileError>;

/// On-disk encoding of an entry file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    Json,
    Bson,
}

impl EntryFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EntryFormat::Json => "json",
            EntryFormat::Bson => "bson",
        }
    }

    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(EntryFormat::Json),
            Some("bson") => Some(EntryFormat::Bson),
            _ => None,
        }
    }
}

/// Complete entry file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFile {
    pub version: String,
    pub metadata: EntryMetadata,
    pub descriptors: EntryDescriptors,
}

/// Identity and provenance of the entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub id: u64,
    pub song_name: String,
    pub original_path: String,
    pub created_at: String,
}

/// Encoded descriptor vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDescriptors {
    pub mfcc: String,
    pub chroma: String,
    pub spectral_contrast: String,
}

impl EntryFile {
    pub fn new(
        id: u64,
        song_name: String,
        original_path: String,
        descriptors: EntryDescriptors,
    ) -> Self {
        Self {
            version: ENTRY_FILE_VERSION.to_string(),
            metadata: EntryMetadata {
                id,
                song_name,
                original_path,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            descriptors,
        }
    }

    /// File name used for an entry id, zero-padded so directory listings sort by id
    pub fn file_name(id: u64, format: EntryFormat) -> String {
        format!("{:010}.{}", id, format.extension())
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self).map_err(|source| EntryFileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_new(path, json_str.as_bytes())
    }

    /// Save to BSON file
    pub fn save_bson(&self, path: &Path) -> Result<()> {
        let bytes = bson::to_vec(self).map_err(|source| EntryFileError::BsonEncode {
            path: path.to_path_buf(),
            source,
        })?;
        write_new(path, &bytes)
    }

    /// Save in the given format
    pub fn save_as(&self, path: &Path, format: EntryFormat) -> Result<()> {
        match format {
            EntryFormat::Json => self.save(path),
            EntryFormat::Bson => self.save_bson(path),
        }
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path).map_err(|source| EntryFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entry: EntryFile = serde_json::from_str(&json_str).map_err(|source| {
            EntryFileError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        entry.check_version(path)
    }

    /// Load from BSON file
    pub fn load_bson(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| EntryFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entry: EntryFile =
            bson::from_slice(&bytes).map_err(|source| EntryFileError::BsonDecode {
                path: path.to_path_buf(),
                source,
            })?;
        entry.check_version(path)
    }

    /// Load choosing the decoder from the file extension
    pub fn load_auto(path: &Path) -> Result<Self> {
        match EntryFormat::from_path(path) {
            Some(EntryFormat::Json) => Self::load(path),
            Some(EntryFormat::Bson) => Self::load_bson(path),
            None => Err(EntryFileError::UnknownExtension(path.to_path_buf())),
        }
    }

    fn check_version(self, path: &Path) -> Result<Self> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(EntryFileError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: self.version,
            });
        }
        Ok(self)
    }
}

// Entries are append-only: never overwrite an existing file.
fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let io_err = |source| EntryFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}
