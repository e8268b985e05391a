//! Per-format decoders producing interleaved PCM

use super::AudioFormat;
use anyhow::{Context, Result};
use std::path::Path;

/// Interleaved samples straight out of a decoder
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RawAudio {
    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Decode an audio file at its native sample rate
pub fn decode_file(path: &Path) -> Result<RawAudio> {
    if !path.exists() {
        anyhow::bail!("Audio file not found: {}", path.display());
    }

    let format = AudioFormat::from_path(path);
    log::debug!("Decoding {} as {:?}", path.display(), format);

    match format {
        AudioFormat::Wav => decode_wav(path),
        AudioFormat::Mp3 => decode_mp3(path),
        AudioFormat::Flac => decode_flac(path),
        AudioFormat::Ogg => decode_ogg(path),
        // Containers and anything unrecognised go through Symphonia's probe
        _ => super::decode_container(path)
            .with_context(|| format!("Unsupported audio format: {}", path.display())),
    }
}

fn decode_wav(path: &Path) -> Result<RawAudio> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Corrupt WAV data in {}", path.display()))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Corrupt WAV data in {}", path.display()))?
        }
    };

    Ok(RawAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn decode_mp3(path: &Path) -> Result<RawAudio> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => anyhow::bail!("MP3 decode error in {}: {}", path.display(), e),
        }
    }

    Ok(RawAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_flac(path: &Path) -> Result<RawAudio> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;

    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Corrupt FLAC data in {}", path.display()))?;

    Ok(RawAudio {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

fn decode_ogg(path: &Path) -> Result<RawAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)
        .with_context(|| format!("Invalid OGG stream: {}", path.display()))?;

    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(RawAudio {
        samples,
        sample_rate,
        channels,
    })
}
