//! WAV file input.
//!
//! [`load_wav`] reads a mono WAV file into normalised `f32` samples. The file
//! must already be at the rate the engine expects; this crate does not
//! resample or downmix.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reason an audio file could not be used.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The file could not be opened or decoded.
    #[error("failed to read WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("expected mono audio, got {0} channels")]
    NotMono(u16),

    #[error("expected {expected} Hz audio, got {got} Hz")]
    SampleRate { expected: u32, got: u32 },

    #[error("unsupported sample format: {bits}-bit {format:?}")]
    UnsupportedFormat { format: SampleFormat, bits: u16 },
}

/// Load a mono WAV file recorded at `expected_rate` Hz.
///
/// Integer samples are scaled into `[-1.0, 1.0]`; float samples are returned
/// unchanged.
pub fn load_wav(path: impl AsRef<Path>, expected_rate: u32) -> Result<Vec<f32>, AudioError> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    log::debug!("audio: loading {} ({spec:?})", path.display());

    if spec.channels != 1 {
        return Err(AudioError::NotMono(spec.channels));
    }
    if spec.sample_rate != expected_rate {
        return Err(AudioError::SampleRate {
            expected: expected_rate,
            got: spec.sample_rate,
        });
    }

    let samples = decode(reader)?;
    log::info!(
        "audio: loaded {} samples ({:.1}s) from {}",
        samples.len(),
        samples.len() as f32 / expected_rate as f32,
        path.display()
    );
    Ok(samples)
}

fn decode<R: std::io::Read>(mut reader: WavReader<R>) -> Result<Vec<f32>, AudioError> {
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_607.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (format, bits) => return Err(AudioError::UnsupportedFormat { format, bits }),
    };
    Ok(samples)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
