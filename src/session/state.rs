//! Session options and per-session bookkeeping.
//!
//! [`SessionOptions`] is what the caller passes to
//! [`TranscriptionSession::streaming`](super::TranscriptionSession::streaming).
//! [`SessionState`] lives inside the worker task and is reported back as a
//! [`SessionSummary`] when the worker ends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stt::{EngineError, Segment, TranscribeOptions};

/// Floor for [`SessionOptions::timeout_ms`].
pub const MIN_TIMEOUT_MS: u64 = 1;

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

/// Per-session behaviour.
///
/// ```
/// use whisper_stream::session::SessionOptions;
///
/// let opts = SessionOptions::default();
/// assert_eq!(opts.timeout_ms, 30_000);
/// assert!(!opts.restart_model_on_error);
/// assert_eq!(opts.transcribe.language, "auto");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Passed through to every engine call.
    #[serde(flatten)]
    pub transcribe: TranscribeOptions,

    /// Longest the session waits for the next segment (or completion) of a
    /// chunk. Re-armed after every delivered segment. Zero is treated as
    /// [`MIN_TIMEOUT_MS`].
    pub timeout_ms: u64,

    /// Pause between chunks. Not applied after the last one.
    pub sleep_ms_between_chunks: Option<u64>,

    /// On a timeout or engine failure, restart the model and retry the same
    /// chunk instead of ending the stream with the error.
    pub restart_model_on_error: bool,

    /// Upper bound on restarts for a single chunk. `None` retries forever.
    pub max_restarts_per_chunk: Option<u32>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transcribe: TranscribeOptions::default(),
            timeout_ms: 30_000,
            sleep_ms_between_chunks: None,
            restart_model_on_error: false,
            max_restarts_per_chunk: None,
        }
    }
}

impl SessionOptions {
    /// Whether another restart is allowed after `restarts` restarts of the
    /// current chunk.
    pub fn may_restart(&self, restarts: u32) -> bool {
        self.restart_model_on_error && self.max_restarts_per_chunk.map_or(true, |cap| restarts < cap)
    }

    /// The per-chunk idle timeout, never below [`MIN_TIMEOUT_MS`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(MIN_TIMEOUT_MS))
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Mutable progress of one session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Cumulative duration of every completed chunk, in milliseconds.
    pub offset_ms: u64,
    /// Index of the chunk being transcribed.
    pub chunk_index: usize,
    /// 1-based attempt number for the current chunk.
    pub attempt: u32,
    pub chunks_completed: usize,
    pub segments_delivered: usize,
    /// Restarts across the whole session.
    pub restarts: u32,
    /// `(time_start, time_end)` of the last segment delivered from the
    /// current chunk, across all of its attempts.
    pub chunk_watermark: Option<(u64, u64)>,
}

impl SessionState {
    /// Reset the per-chunk bookkeeping before chunk `index`.
    pub fn begin_chunk(&mut self, index: usize) {
        self.chunk_index = index;
        self.attempt = 0;
        self.chunk_watermark = None;
    }

    /// Bookkeeping for a chunk that completed.
    pub fn complete_chunk(&mut self, duration_ms: u64) {
        self.offset_ms += duration_ms;
        self.chunks_completed += 1;
        self.chunk_watermark = None;
    }

    /// Whether a retry re-emitted `segment`, which the consumer already has.
    ///
    /// Only retries are filtered; anything at or before the watermark would
    /// put `time_start` out of order.
    pub fn is_replayed(&self, segment: &Segment) -> bool {
        self.attempt > 1
            && self
                .chunk_watermark
                .is_some_and(|mark| (segment.time_start, segment.time_end) <= mark)
    }

    /// Bookkeeping for a segment the consumer received.
    pub fn record_delivery(&mut self, segment: &Segment) {
        self.segments_delivered += 1;
        self.chunk_watermark = Some((segment.time_start, segment.time_end));
    }

    pub fn into_summary(self, outcome: SessionOutcome) -> SessionSummary {
        SessionSummary {
            chunks_completed: self.chunks_completed,
            segments_delivered: self.segments_delivered,
            restarts: self.restarts,
            offset_ms: self.offset_ms,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every chunk was transcribed.
    Completed,
    /// The consumer went away before the last chunk.
    Cancelled,
    /// The stream ended with this error.
    Failed(EngineError),
}

/// Final report of a session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub chunks_completed: usize,
    pub segments_delivered: usize,
    pub restarts: u32,
    /// Session-relative end of the last completed chunk.
    pub offset_ms: u64,
    pub outcome: SessionOutcome,
}
