//! Streaming transcription sessions.
//!
//! A session turns one long audio buffer into an ordered, lazily produced
//! sequence of segments with session-relative timestamps, driving a
//! single-flight [`EngineAdapter`](crate::stt::EngineAdapter) one chunk at a
//! time.
//!
//! # Architecture
//!
//! ```text
//! caller ── streaming(audio) ──▶ SessionWorker (tokio task)
//!                                   │  for each chunk:
//!                                   │    adapter.transcribe ─ segments ─┐
//!                                   │    idle timeout / restart policy  │
//!                                   ▼                                   ▼
//!                             SessionSummary            SegmentStream (capacity 1)
//! ```
//!
//! At most one session may be in flight per adapter: the first call of a
//! second concurrent session fails with
//! [`EngineError::Busy`](crate::stt::EngineError::Busy).

pub mod runner;
pub mod state;
pub mod stream;

pub use runner::TranscriptionSession;
pub use state::{SessionOptions, MIN_TIMEOUT_MS, SessionOutcome, SessionState, SessionSummary};
pub use stream::{SegmentStream, SessionItem};
