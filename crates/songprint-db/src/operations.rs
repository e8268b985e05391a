use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::models::*;

const SONG_COLUMNS: &str = "id, song_name, mfcc, chroma, spectral_contrast, created_at";

fn row_to_song(r: &Row) -> SongRow {
    SongRow {
        id: r.get(0),
        song_name: r.get(1),
        mfcc: r.get(2),
        chroma: r.get(3),
        spectral_contrast: r.get(4),
        created_at: r.get(5),
    }
}

/// Insert a new song, returning its generated id
pub async fn insert_song(pool: &Pool, song: &NewSong) -> Result<i32> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "INSERT INTO songs
             (song_name, audio_data, mfcc, chroma, spectral_contrast)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
            &[
                &song.song_name,
                &song.audio_data,
                &song.mfcc,
                &song.chroma,
                &song.spectral_contrast,
            ],
        )
        .await
        .context("Failed to insert song")?;

    Ok(row.get(0))
}

/// Get all songs in insertion order (audio payload excluded)
pub async fn get_all_songs(pool: &Pool) -> Result<Vec<SongRow>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            &format!("SELECT {} FROM songs ORDER BY id", SONG_COLUMNS),
            &[],
        )
        .await
        .context("Failed to get all songs")?;

    Ok(rows.iter().map(row_to_song).collect())
}

/// Check whether any song with this name exists
pub async fn song_exists_by_name(pool: &Pool, song_name: &str) -> Result<bool> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM songs WHERE song_name = $1)",
            &[&song_name],
        )
        .await
        .context("Failed to check song existence")?;

    Ok(row.get(0))
}

/// Number of songs in the catalog
pub async fn count_songs(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;

    let row = client
        .query_one("SELECT COUNT(*) FROM songs", &[])
        .await
        .context("Failed to count songs")?;

    Ok(row.get(0))
}

/// Append a submission to the audit log, returning its id
pub async fn insert_submission(pool: &Pool, submission: &NewSubmission) -> Result<i32> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "INSERT INTO submissions (file_name, result)
             VALUES ($1, $2)
             RETURNING id",
            &[&submission.file_name, &submission.result],
        )
        .await
        .context("Failed to record submission")?;

    Ok(row.get(0))
}
