//! Catalog scanning
//!
//! Walks the catalog in insertion order, scoring the query against each
//! stored fingerprint. The scan stops at the first entry scoring at or above
//! the early-exit threshold and reports that entry's score; if none does,
//! the reported score is 0.

use serde::Serialize;

use crate::codec::decode_vector;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::similarity::similarity;
use crate::storage_backend::{CatalogStore, EntryId, StoredFingerprint};
use crate::storage_config::DEFAULT_EARLY_EXIT_THRESHOLD;


/// The catalog entry that stopped the scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogMatch {
    pub entry_id: EntryId,
    pub song_name: String,
}

/// Result of one catalog scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    /// Score of the first qualifying entry, or 0
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<CatalogMatch>,
    pub entries_scanned: usize,
}

impl ScanOutcome {
    fn no_match(entries_scanned: usize) -> Self {
        Self {
            score: 0.0,
            matched: None,
            entries_scanned,
        }
    }
}

/// Decode an entry's stored vectors back into a fingerprint
pub fn decode_entry(entry: &StoredFingerprint) -> Result<Fingerprint> {
    Ok(Fingerprint::new(
        entry.song_name.clone(),
        decode_vector("mfcc", &entry.mfcc)?,
        decode_vector("chroma", &entry.chroma)?,
        decode_vector("spectral_contrast", &entry.spectral_contrast)?,
    ))
}

/// First-match catalog scanner
#[derive(Debug, Clone, Copy)]
pub struct CatalogScanner {
    early_exit_threshold: f64,
}

impl Default for CatalogScanner {
    fn default() -> Self {
        Self::new(DEFAULT_EARLY_EXIT_THRESHOLD)
    }
}

impl CatalogScanner {
    pub fn new(early_exit_threshold: f64) -> Self {
        Self {
            early_exit_threshold,
        }
    }

    /// Scan `entries` in order.
    ///
    /// A malformed entry or a length disagreement aborts the scan; entries
    /// are never skipped.
    pub fn scan(&self, query: &Fingerprint, entries: &[StoredFingerprint]) -> Result<ScanOutcome> {
        for (scanned, entry) in entries.iter().enumerate() {
            let reference = decode_entry(entry)?;
            let score = similarity(query, &reference)?;

            log::debug!(
                "Entry {} ({}): similarity {:.2}%",
                entry.id,
                entry.song_name,
                score
            );

            if score >= self.early_exit_threshold {
                log::info!(
                    "Early exit on entry {} ({}) at {:.2}% after {} entries",
                    entry.id,
                    entry.song_name,
                    score,
                    scanned + 1
                );
                return Ok(ScanOutcome {
                    score,
                    matched: Some(CatalogMatch {
                        entry_id: entry.id,
                        song_name: entry.song_name.clone(),
                    }),
                    entries_scanned: scanned + 1,
                });
            }
        }

        log::info!("No catalog entry reached {:.0}% ({} scanned)", self.early_exit_threshold, entries.len());
        Ok(ScanOutcome::no_match(entries.len()))
    }

    /// Read the full catalog from `store` and scan it
    pub async fn scan_store(
        &self,
        query: &Fingerprint,
        store: &dyn CatalogStore,
    ) -> Result<ScanOutcome> {
        let entries = store.list_all().await?;
        log::info!("Scanning {} catalog entries", entries.len());
        self.scan(query, &entries)
    }
}
