//! Catalog schema bootstrap

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

/// Schema for the song catalog.
///
/// Vectors are TEXT holding JSON arrays so rows written by older tools
/// (which stored `json.dumps` output) stay readable.
pub const CREATE_SONGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS songs (
    id                SERIAL PRIMARY KEY,
    song_name         TEXT NOT NULL,
    audio_data        BYTEA,
    mfcc              TEXT NOT NULL,
    chroma            TEXT NOT NULL,
    spectral_contrast TEXT NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

pub const CREATE_SONG_NAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS songs_song_name_idx ON songs (song_name)";

/// Audit log of every processed submission and its decision record
pub const CREATE_SUBMISSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS submissions (
    id           SERIAL PRIMARY KEY,
    file_name    TEXT NOT NULL,
    result       JSONB NOT NULL,
    date_created TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// Create the catalog tables if they are missing
pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .batch_execute(&format!(
            "{};\n{};\n{};",
            CREATE_SONGS_TABLE, CREATE_SONG_NAME_INDEX, CREATE_SUBMISSIONS_TABLE
        ))
        .await
        .context("Failed to create catalog schema")?;

    log::debug!("Catalog schema ready");
    Ok(())
}
