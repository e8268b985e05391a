//! Songprint Database Layer
//!
//! PostgreSQL storage for the song catalog

pub mod connection;
pub mod models;
pub mod operations;
pub mod schema;

// Re-export commonly used types
pub use connection::{create_pool, test_connection, ConnectionParams, DbPool};
pub use models::{NewSong, NewSubmission, SongRow};
pub use operations::{
    count_songs, get_all_songs, insert_song, insert_submission, song_exists_by_name,
};
pub use schema::ensure_schema;
