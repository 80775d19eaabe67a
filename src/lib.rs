//! Streaming whisper transcription over arbitrarily long audio.
//!
//! - [`stt`]: the single-flight engine adapter, its event bus and cue parser.
//! - [`session`]: chunked streaming sessions with timeout and restart policy.
//! - [`cache`]: model catalog downloads backed by a persistent blob store.
//! - [`audio`]: chunking and WAV input.
//! - [`config`]: `settings.toml` and platform paths.

pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod session;
pub mod stt;
