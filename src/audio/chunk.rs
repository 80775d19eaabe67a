//! Bounded, immutable views over a shared sample buffer.
//!
//! An [`AudioChunk`] is a window `[start, end)` into an `Arc<[f32]>`, so
//! [`split_into_chunks`] never copies samples and a chunk can be handed to
//! the engine by value while the session keeps its own handle for retries.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use whisper_stream::audio::split_into_chunks;
//!
//! let audio: Arc<[f32]> = vec![0.0_f32; 250_000].into();
//! let chunks = split_into_chunks(audio, 16_000, 160_000);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].len(), 160_000);
//! assert_eq!(chunks[1].len(), 90_000);
//! ```

use std::ops::Range;
use std::sync::Arc;

/// Default chunk length in seconds; the engine's recommended maximum.
pub const DEFAULT_CHUNK_SECS: u32 = 100;

/// Default sample rate expected by whisper.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A contiguous run of mono `f32` samples.
///
/// Cloning is cheap: clones share the underlying buffer.
#[derive(Clone)]
pub struct AudioChunk {
    buffer: Arc<[f32]>,
    range: Range<usize>,
    sample_rate: u32,
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("range", &self.range)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl AudioChunk {
    /// Wrap a whole buffer as one chunk.
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate == 0`.
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be > 0");
        let buffer = samples.into();
        let range = 0..buffer.len();
        Self {
            buffer,
            range,
            sample_rate,
        }
    }

    /// The samples in this chunk.
    pub fn samples(&self) -> &[f32] {
        &self.buffer[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Index of the first sample within the source buffer.
    pub fn start_sample(&self) -> usize {
        self.range.start
    }

    /// Audio length in whole milliseconds, rounded down.
    pub fn duration_ms(&self) -> u64 {
        self.len() as u64 * 1_000 / u64::from(self.sample_rate)
    }

    /// Audio length in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split `audio` into consecutive chunks of at most `max_chunk_samples`.
///
/// Chunk `i` covers `[i * M, min((i + 1) * M, N))`, so concatenating the
/// chunks reproduces the input exactly. An empty input yields no chunks.
///
/// # Panics
///
/// Panics if `max_chunk_samples == 0` or `sample_rate == 0`.
pub fn split_into_chunks(
    audio: Arc<[f32]>,
    sample_rate: u32,
    max_chunk_samples: usize,
) -> Vec<AudioChunk> {
    assert!(max_chunk_samples > 0, "max_chunk_samples must be > 0");
    assert!(sample_rate > 0, "sample rate must be > 0");

    let total = audio.len();
    (0..total)
        .step_by(max_chunk_samples)
        .map(|start| AudioChunk {
            buffer: Arc::clone(&audio),
            range: start..(start + max_chunk_samples).min(total),
            sample_rate,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
