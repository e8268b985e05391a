//! Decision and persistence
//!
//! Runs one submission end to end: decode, extract, scan the catalog, decide,
//! and append the fingerprint to the catalog when it is not a duplicate.
//! Every decided submission is also written to the store's submission log.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::audio::{AudioDecoder, FileDecoder};
use crate::error::{Result, SongprintError};
use crate::features::FeatureExtractor;
use crate::fingerprint::Fingerprint;
use crate::matching::{CatalogMatch, CatalogScanner};
use crate::storage_backend::{CatalogStore, EntryId, NewCatalogEntry, Submission};
use crate::storage_config::SongprintConfig;

/// Verdict for one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub match_percentage: f64,
    #[serde(rename = "is_copyrighted")]
    pub is_duplicate: bool,
    pub song_data: Fingerprint,
}

/// Decision record plus what happened on the catalog side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    #[serde(flatten)]
    pub record: DecisionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<CatalogMatch>,
    /// Id of the entry written for this submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    /// Write failure; the verdict above still stands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// Inclusive duplicate boundary
pub fn is_duplicate(match_percentage: f64, threshold: f64) -> bool {
    match_percentage >= threshold
}

/// Label recorded for a submitted file
pub fn song_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct Coordinator {
    decoder: Box<dyn AudioDecoder>,
    extractor: FeatureExtractor,
    scanner: CatalogScanner,
    store: Arc<dyn CatalogStore>,
    duplicate_threshold: f64,
    persist: bool,
}

impl Coordinator {
    pub fn new(store: Arc<dyn CatalogStore>, config: &SongprintConfig) -> Self {
        Self {
            decoder: Box::new(FileDecoder),
            extractor: FeatureExtractor::new(config.features.clone()),
            scanner: CatalogScanner::new(config.matching.early_exit_threshold),
            store,
            duplicate_threshold: config.matching.duplicate_threshold,
            persist: true,
        }
    }

    pub fn with_decoder(mut self, decoder: Box<dyn AudioDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Evaluate without ever writing to the catalog
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Fingerprint the file at `path` without touching the catalog
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let audio = self.decoder.decode(path)?;
        self.extractor.extract(&song_name(path), &audio)
    }

    pub async fn process(&self, path: &Path) -> Result<DecisionOutcome> {
        let fingerprint = self.fingerprint(path)?;
        let scan = self.scanner.scan_store(&fingerprint, self.store.as_ref()).await?;

        let duplicate = is_duplicate(scan.score, self.duplicate_threshold);
        log::info!(
            "{}: match {:.2}% -> {}",
            fingerprint.name,
            scan.score,
            if duplicate { "duplicate" } else { "new" }
        );

        let mut outcome = DecisionOutcome {
            record: DecisionRecord {
                match_percentage: scan.score,
                is_duplicate: duplicate,
                song_data: fingerprint,
            },
            matched_entry: scan.matched,
            entry_id: None,
            persistence_error: None,
        };

        if !duplicate && self.persist {
            match self.persist_entry(&outcome.record.song_data, path).await {
                Ok(id) => {
                    log::info!("Stored {} as entry {}", outcome.record.song_data.name, id);
                    outcome.entry_id = Some(id);
                }
                Err(e) => {
                    log::warn!("Failed to store {}: {}", outcome.record.song_data.name, e);
                    outcome.persistence_error = Some(e.to_string());
                }
            }
        }

        if self.persist {
            if let Err(e) = self.log_submission(&outcome.record).await {
                log::warn!("Failed to log submission {}: {}", outcome.record.song_data.name, e);
                outcome.persistence_error.get_or_insert_with(|| e.to_string());
            }
        }

        Ok(outcome)
    }

    async fn log_submission(&self, record: &DecisionRecord) -> Result<()> {
        let result = serde_json::to_value(record)
            .map_err(|e| SongprintError::Store(format!("failed to encode decision record: {}", e)))?;
        let submission = Submission {
            file_name: record.song_data.name.clone(),
            result,
        };
        self.store.record_submission(&submission).await
    }

    async fn persist_entry(&self, fingerprint: &Fingerprint, path: &Path) -> Result<EntryId> {
        let mut entry = NewCatalogEntry::from_fingerprint(fingerprint, path);
        if self.store.supports_raw_audio() {
            let bytes = std::fs::read(path).map_err(|e| {
                SongprintError::Store(format!("failed to read {}: {}", path.display(), e))
            })?;
            entry = entry.with_raw_audio(bytes);
        }
        self.store.insert(entry).await
    }
}
