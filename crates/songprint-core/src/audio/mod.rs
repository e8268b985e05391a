//! Audio decoding
//!
//! Supports WAV, MP3, FLAC, OGG and container formats (MP4/M4A, MKV/WebM, MOV)
//! using pure Rust decoders. Output is always mono at the stream's native
//! sample rate.

mod container;
mod decoder;

pub use container::decode_container;
pub use decoder::{decode_file, RawAudio};

use crate::error::{Result, SongprintError};
use std::path::Path;

/// Supported audio and container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    // Pure audio formats
    Wav,
    Mp3,
    Flac,
    Ogg,

    // Containers (audio track extracted with Symphonia)
    Mp4,
    Mkv,
    Mov,
    Webm,

    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,

            Some("mp4") | Some("m4a") | Some("m4v") | Some("aac") => AudioFormat::Mp4,
            Some("mkv") | Some("mka") => AudioFormat::Mkv,
            Some("mov") => AudioFormat::Mov,
            Some("webm") => AudioFormat::Webm,

            _ => AudioFormat::Unknown,
        }
    }

    /// Check if format is a container handled by Symphonia
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            AudioFormat::Mp4 | AudioFormat::Mkv | AudioFormat::Mov | AudioFormat::Webm
        )
    }
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Turns an audio resource into mono PCM samples
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// Decoder for audio files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl AudioDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let raw = decode_file(path).map_err(|e| SongprintError::Decode(format!("{:#}", e)))?;

        if raw.sample_rate == 0 {
            return Err(SongprintError::Decode(format!(
                "{} reports a sample rate of 0",
                path.display()
            )));
        }
        if raw.samples.is_empty() {
            return Err(SongprintError::Decode(format!(
                "{} contains no audio samples",
                path.display()
            )));
        }

        log::info!(
            "Decoded {}: {} frames, {} channel(s) @ {}Hz",
            path.display(),
            raw.samples.len() / raw.channels.max(1) as usize,
            raw.channels,
            raw.sample_rate
        );

        Ok(DecodedAudio {
            samples: raw.to_mono(),
            sample_rate: raw.sample_rate,
        })
    }
}
