//! Catalog store trait and implementations
//!
//! The catalog is append-only: entries are inserted once and read back in
//! insertion order. Descriptor vectors cross this boundary in their encoded
//! text form (see [`crate::codec`]).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::codec::encode_vector;
use crate::error::{Result, SongprintError};
use crate::fingerprint::Fingerprint;
use crate::storage_config::{
    FileFormat, FilesystemConfig, PostgresqlConfig, StorageBackend, StorageConfig,
};

/// Identifier assigned by the store on insert
pub type EntryId = i64;

/// A fingerprint ready to be persisted
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub song_name: String,
    pub mfcc: String,
    pub chroma: String,
    pub spectral_contrast: String,
    pub original_path: String,
    /// Original audio bytes; only kept by stores that support it
    pub raw_audio: Option<Vec<u8>>,
}

impl NewCatalogEntry {
    pub fn from_fingerprint(fingerprint: &Fingerprint, original_path: &Path) -> Self {
        Self {
            song_name: fingerprint.name.clone(),
            mfcc: encode_vector(&fingerprint.mfcc),
            chroma: encode_vector(&fingerprint.chroma),
            spectral_contrast: encode_vector(&fingerprint.spectral_contrast),
            original_path: original_path.display().to_string(),
            raw_audio: None,
        }
    }

    pub fn with_raw_audio(mut self, bytes: Vec<u8>) -> Self {
        self.raw_audio = Some(bytes);
        self
    }
}

/// A catalog entry as read back, vectors still encoded
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFingerprint {
    pub id: EntryId,
    pub song_name: String,
    pub mfcc: String,
    pub chroma: String,
    pub spectral_contrast: String,
}

/// One processed file and the decision returned for it
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub file_name: String,
    pub result: serde_json::Value,
}

/// Abstract catalog store
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Append an entry, returning its id
    async fn insert(&self, entry: NewCatalogEntry) -> Result<EntryId>;

    /// Every entry in insertion order
    async fn list_all(&self) -> Result<Vec<StoredFingerprint>>;

    async fn count(&self) -> Result<usize>;

    /// Append to the submission log kept beside the catalog
    async fn record_submission(&self, submission: &Submission) -> Result<()>;

    /// Whether `raw_audio` is kept on insert
    fn supports_raw_audio(&self) -> bool {
        false
    }
}

fn store_err(e: impl std::fmt::Display) -> SongprintError {
    SongprintError::Store(e.to_string())
}

fn read_err(e: impl std::fmt::Display) -> SongprintError {
    SongprintError::CatalogRead(e.to_string())
}

/// PostgreSQL-backed catalog (`songs` table)
pub struct PostgresCatalog {
    pool: songprint_db::DbPool,
    store_raw_audio: bool,
}

impl PostgresCatalog {
    /// Connect, verify the connection and create the schema if missing
    pub async fn connect(config: &PostgresqlConfig) -> Result<Self> {
        let params = songprint_db::ConnectionParams {
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            max_connections: config.max_connections,
        };
        let pool = songprint_db::create_pool(&params).map_err(store_err)?;

        songprint_db::test_connection(&pool)
            .await
            .map_err(|e| SongprintError::Store(format!("{:#}", e)))?;
        songprint_db::ensure_schema(&pool)
            .await
            .map_err(|e| SongprintError::Store(format!("{:#}", e)))?;

        log::info!(
            "Connected to catalog database {}@{}:{}",
            config.database,
            config.host,
            config.port
        );

        Ok(Self {
            pool,
            store_raw_audio: config.store_raw_audio,
        })
    }

    /// Whether a song with this name is already catalogued
    pub async fn contains_song(&self, song_name: &str) -> Result<bool> {
        songprint_db::song_exists_by_name(&self.pool, song_name)
            .await
            .map_err(|e| SongprintError::CatalogRead(format!("{:#}", e)))
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn insert(&self, entry: NewCatalogEntry) -> Result<EntryId> {
        let song = songprint_db::NewSong {
            song_name: entry.song_name,
            mfcc: entry.mfcc,
            chroma: entry.chroma,
            spectral_contrast: entry.spectral_contrast,
            audio_data: if self.store_raw_audio {
                entry.raw_audio
            } else {
                None
            },
        };

        let id = songprint_db::insert_song(&self.pool, &song)
            .await
            .map_err(|e| SongprintError::Store(format!("{:#}", e)))?;
        Ok(EntryId::from(id))
    }

    async fn list_all(&self) -> Result<Vec<StoredFingerprint>> {
        let rows = songprint_db::get_all_songs(&self.pool)
            .await
            .map_err(|e| SongprintError::CatalogRead(format!("{:#}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| StoredFingerprint {
                id: EntryId::from(row.id),
                song_name: row.song_name,
                mfcc: row.mfcc,
                chroma: row.chroma,
                spectral_contrast: row.spectral_contrast,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let n = songprint_db::count_songs(&self.pool)
            .await
            .map_err(|e| SongprintError::CatalogRead(format!("{:#}", e)))?;
        Ok(n.max(0) as usize)
    }

    async fn record_submission(&self, submission: &Submission) -> Result<()> {
        let row = songprint_db::NewSubmission {
            file_name: submission.file_name.clone(),
            result: submission.result.clone(),
        };
        songprint_db::insert_submission(&self.pool, &row)
            .await
            .map_err(|e| SongprintError::Store(format!("{:#}", e)))?;
        Ok(())
    }

    fn supports_raw_audio(&self) -> bool {
        self.store_raw_audio
    }
}

const MAX_ID_ATTEMPTS: usize = 64;

/// Submission log file inside a filesystem catalog (one JSON object per line)
pub const SUBMISSION_LOG_FILE: &str = "submissions.jsonl";

/// One entry file per catalog entry under a base directory
pub struct FilesystemCatalog {
    base_dir: PathBuf,
    format: songprint_fp::EntryFormat,
    // Serialises id allocation within this process
    insert_lock: Mutex<()>,
}

impl FilesystemCatalog {
    pub fn new(config: &FilesystemConfig) -> Self {
        Self::from_path(&config.base_directory, config.format)
    }

    pub fn from_path(base_dir: impl AsRef<Path>, format: FileFormat) -> Self {
        let format = match format {
            FileFormat::Json => songprint_fp::EntryFormat::Json,
            FileFormat::Bson => songprint_fp::EntryFormat::Bson,
        };
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            format,
            insert_lock: Mutex::new(()),
        }
    }

    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.base_dir).map_err(read_err)?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| songprint_fp::EntryFormat::from_path(path).is_some())
            .collect())
    }

    fn entry_path(&self, id: u64, format: songprint_fp::EntryFormat) -> PathBuf {
        self.base_dir.join(songprint_fp::EntryFile::file_name(id, format))
    }

    /// Write `entry` under the first free id at or after `first_id`.
    ///
    /// Another process may claim an id between listing and writing; the
    /// loser of that race moves on to the next id.
    fn write_entry(&self, first_id: u64, entry: NewCatalogEntry) -> Result<EntryId> {
        use songprint_fp::EntryFormat;

        let mut file = songprint_fp::EntryFile::new(
            first_id,
            entry.song_name,
            entry.original_path,
            songprint_fp::EntryDescriptors {
                mfcc: entry.mfcc,
                chroma: entry.chroma,
                spectral_contrast: entry.spectral_contrast,
            },
        );

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = file.metadata.id;
            let taken = [EntryFormat::Json, EntryFormat::Bson]
                .into_iter()
                .any(|format| format != self.format && self.entry_path(id, format).exists());
            if !taken {
                let path = self.entry_path(id, self.format);
                match file.save_as(&path, self.format) {
                    Ok(()) => {
                        log::debug!("Wrote catalog entry {}", path.display());
                        return Ok(id as EntryId);
                    }
                    Err(e) if e.is_already_exists() => {
                        log::debug!("Entry id {} already taken, retrying", id);
                    }
                    Err(e) => return Err(store_err(e)),
                }
            }
            file.metadata.id += 1;
        }

        Err(SongprintError::Store(format!(
            "no free entry id after {} attempts in {}",
            MAX_ID_ATTEMPTS,
            self.base_dir.display()
        )))
    }

    fn load_entries(&self) -> Result<Vec<songprint_fp::EntryFile>> {
        use rayon::prelude::*;

        let paths = self.entry_paths()?;
        let mut entries = paths
            .par_iter()
            .map(|path| songprint_fp::EntryFile::load_auto(path).map_err(read_err))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.metadata.id);
        Ok(entries)
    }
}

#[async_trait]
impl CatalogStore for FilesystemCatalog {
    async fn insert(&self, entry: NewCatalogEntry) -> Result<EntryId> {
        let _guard = self
            .insert_lock
            .lock()
            .map_err(|_| SongprintError::Store("filesystem catalog lock poisoned".into()))?;

        std::fs::create_dir_all(&self.base_dir).map_err(store_err)?;

        let next_id = self
            .load_entries()
            .map_err(store_err)?
            .last()
            .map(|e| e.metadata.id + 1)
            .unwrap_or(1);

        self.write_entry(next_id, entry)
    }

    async fn list_all(&self) -> Result<Vec<StoredFingerprint>> {
        Ok(self
            .load_entries()?
            .into_iter()
            .map(|e| StoredFingerprint {
                id: e.metadata.id as EntryId,
                song_name: e.metadata.song_name,
                mfcc: e.descriptors.mfcc,
                chroma: e.descriptors.chroma,
                spectral_contrast: e.descriptors.spectral_contrast,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entry_paths()?.len())
    }

    async fn record_submission(&self, submission: &Submission) -> Result<()> {
        use std::io::Write;

        let line = serde_json::json!({
            "file_name": submission.file_name,
            "result": submission.result,
            "date_created": chrono::Utc::now().to_rfc3339(),
        });

        std::fs::create_dir_all(&self.base_dir).map_err(store_err)?;
        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.base_dir.join(SUBMISSION_LOG_FILE))
            .map_err(store_err)?;
        writeln!(log_file, "{}", line).map_err(store_err)
    }
}

/// Process-local catalog, used for `--no-store` style dry runs and tests
#[derive(Default)]
pub struct MemoryCatalog {
    entries: Mutex<Vec<StoredFingerprint>>,
    submissions: Mutex<Vec<Submission>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with already-encoded entries, ids assigned in order
    pub fn with_entries(entries: Vec<NewCatalogEntry>) -> Self {
        let stored = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| StoredFingerprint {
                id: i as EntryId + 1,
                song_name: e.song_name,
                mfcc: e.mfcc,
                chroma: e.chroma,
                spectral_contrast: e.spectral_contrast,
            })
            .collect();
        Self {
            entries: Mutex::new(stored),
            submissions: Mutex::default(),
        }
    }

    /// Submissions recorded so far, oldest first
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredFingerprint>>> {
        self.entries
            .lock()
            .map_err(|_| SongprintError::Store("memory catalog lock poisoned".into()))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn insert(&self, entry: NewCatalogEntry) -> Result<EntryId> {
        let mut entries = self.lock()?;
        let id = entries.last().map(|e| e.id + 1).unwrap_or(1);
        entries.push(StoredFingerprint {
            id,
            song_name: entry.song_name,
            mfcc: entry.mfcc,
            chroma: entry.chroma,
            spectral_contrast: entry.spectral_contrast,
        });
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<StoredFingerprint>> {
        Ok(self.lock()?.clone())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    async fn record_submission(&self, submission: &Submission) -> Result<()> {
        self.submissions
            .lock()
            .map_err(|_| SongprintError::Store("memory catalog lock poisoned".into()))?
            .push(submission.clone());
        Ok(())
    }
}

/// Open the backend selected in `config`
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn CatalogStore>> {
    let store: Arc<dyn CatalogStore> = match config.backend {
        StorageBackend::Postgresql => Arc::new(PostgresCatalog::connect(&config.postgresql).await?),
        StorageBackend::Filesystem => {
            log::info!("Using filesystem catalog at {}", config.filesystem.base_directory);
            Arc::new(FilesystemCatalog::new(&config.filesystem))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory catalog; entries are discarded on exit");
            Arc::new(MemoryCatalog::new())
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(name: &str, offset: f64) -> Fingerprint {
        Fingerprint::new(
            name,
            (0..13).map(|i| i as f64 + offset).collect(),
            (0..12).map(|i| (i as f64 * 0.1 + offset).sin()).collect(),
            (0..7).map(|i| 10.0 + i as f64 * offset).collect(),
        )
    }

    fn entry(name: &str, offset: f64) -> NewCatalogEntry {
        NewCatalogEntry::from_fingerprint(&fingerprint(name, offset), Path::new("/tmp/in.wav"))
    }

    #[tokio::test]
    async fn test_memory_catalog_insertion_order() {
        let store = MemoryCatalog::new();
        assert_eq!(store.count().await.unwrap(), 0);

        let a = store.insert(entry("a.wav", 0.0)).await.unwrap();
        let b = store.insert(entry("b.wav", 1.0)).await.unwrap();
        assert!(b > a);

        let all = store.list_all().await.unwrap();
        let names: Vec<&str> = all.iter().map(|e| e.song_name.as_str()).collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
        assert!(!store.supports_raw_audio());
    }

    #[tokio::test]
    async fn test_filesystem_catalog_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCatalog::from_path(dir.path().join("catalog"), FileFormat::Json);

        assert!(store.list_all().await.unwrap().is_empty());

        let first = entry("first.mp3", 0.5);
        let id1 = store.insert(first.clone()).await.unwrap();
        let id2 = store.insert(entry("second.mp3", 2.0)).await.unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].song_name, "first.mp3");
        assert_eq!(all[0].mfcc, first.mfcc);
        assert_eq!(all[0].spectral_contrast, first.spectral_contrast);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filesystem_catalog_reads_mixed_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json_store = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);
        json_store.insert(entry("one.wav", 0.0)).await.unwrap();

        let bson_store = FilesystemCatalog::from_path(dir.path(), FileFormat::Bson);
        let id = bson_store.insert(entry("two.wav", 1.0)).await.unwrap();
        assert_eq!(id, 2);

        let all = json_store.list_all().await.unwrap();
        let names: Vec<&str> = all.iter().map(|e| e.song_name.as_str()).collect();
        assert_eq!(names, vec!["one.wav", "two.wav"]);
    }

    #[tokio::test]
    async fn test_filesystem_catalog_corrupt_entry_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0000000001.json"), "{ not json").unwrap();

        let store = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);
        let err = store.list_all().await.unwrap_err();
        assert_eq!(err.kind(), "CatalogReadError");
    }

    #[tokio::test]
    async fn test_filesystem_insert_skips_ids_claimed_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);

        // Another writer claimed ids 1 and 2 after this store listed the catalog
        let other = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);
        other.insert(entry("other-1.wav", 0.0)).await.unwrap();
        other.insert(entry("other-2.wav", 1.0)).await.unwrap();

        let id = store.write_entry(1, entry("late.wav", 2.0)).unwrap();
        assert_eq!(id, 3);

        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.song_name)
            .collect();
        assert_eq!(names, vec!["other-1.wav", "other-2.wav", "late.wav"]);
    }

    #[tokio::test]
    async fn test_filesystem_insert_skips_id_taken_in_other_format() {
        let dir = tempfile::tempdir().unwrap();
        let bson = FilesystemCatalog::from_path(dir.path(), FileFormat::Bson);
        bson.insert(entry("first.wav", 0.0)).await.unwrap();

        let json = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);
        assert_eq!(json.write_entry(1, entry("second.wav", 1.0)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_submission_log_is_kept_outside_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemCatalog::from_path(dir.path(), FileFormat::Json);
        let submission = Submission {
            file_name: "upload.mp3".to_string(),
            result: serde_json::json!({ "match_percentage": 0.0, "is_copyrighted": false }),
        };
        store.record_submission(&submission).await.unwrap();
        store.record_submission(&submission).await.unwrap();

        let log = std::fs::read_to_string(dir.path().join(SUBMISSION_LOG_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["file_name"], "upload.mp3");
        assert_eq!(lines[0]["result"]["is_copyrighted"], false);
        assert!(lines[0]["date_created"].is_string());

        // The log is not a catalog entry
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_store_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Filesystem,
            filesystem: FilesystemConfig {
                base_directory: dir.path().display().to_string(),
                format: FileFormat::Json,
            },
            ..Default::default()
        };
        let store = open_store(&config).await.unwrap();
        store.insert(entry("x.wav", 0.0)).await.unwrap();
        assert!(dir.path().join("0000000001.json").exists());
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL
    async fn test_postgres_catalog_insert_and_list() {
        let store = PostgresCatalog::connect(&PostgresqlConfig::default())
            .await
            .unwrap();
        let before = store.count().await.unwrap();

        let id = store
            .insert(entry("pg.wav", 3.0).with_raw_audio(vec![1, 2, 3]))
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), before + 1);
        assert_eq!(all.last().unwrap().id, id);
    }
}
