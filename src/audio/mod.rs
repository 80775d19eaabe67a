//! Audio input: shared sample buffers cut into engine-sized chunks.
//!
//! # Pipeline
//!
//! ```text
//! WAV file → load_wav → Arc<[f32]> → split_into_chunks → AudioChunk × N → session
//! ```
//!
//! Callers that already hold 16 kHz mono `f32` samples skip the WAV step and
//! hand the buffer straight to a
//! [`TranscriptionSession`](crate::session::TranscriptionSession).

pub mod chunk;
pub mod wav;

pub use chunk::{split_into_chunks, AudioChunk, DEFAULT_CHUNK_SECS, WHISPER_SAMPLE_RATE};
pub use wav::{load_wav, AudioError};
