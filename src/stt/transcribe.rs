//! Transcription parameter types and result types.
//!
//! [`TranscribeOptions`] carries the per-call settings handed to the engine's
//! `full_default` entry point. [`TranscribeOutcome`] is what
//! [`EngineAdapter::transcribe`](crate::stt::EngineAdapter::transcribe)
//! resolves to once the engine signals completion.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TranscribeOptions
// ---------------------------------------------------------------------------

/// Parameters for a single engine call.
///
/// ```
/// use whisper_stream::stt::TranscribeOptions;
///
/// let opts = TranscribeOptions {
///     language: "en".into(),
///     ..TranscribeOptions::default()
/// };
/// assert_eq!(opts.threads, 4);
/// assert!(!opts.translate);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeOptions {
    /// ISO-639-1 language code (e.g. `"en"`), or `"auto"` to let the engine
    /// detect the language.
    pub language: String,

    /// Number of CPU threads handed to the engine.
    pub threads: i32,

    /// Translate the transcript to English instead of transcribing verbatim.
    pub translate: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            threads: 4,
            translate: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single time-aligned piece of transcribed text.
///
/// Timestamps are milliseconds. Segments produced by the adapter are relative
/// to the start of their chunk; segments yielded by a
/// [`TranscriptionSession`](crate::session::TranscriptionSession) are relative
/// to the start of the whole recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Start of the segment in milliseconds.
    pub time_start: u64,
    /// End of the segment in milliseconds; never less than `time_start`.
    pub time_end: u64,
    /// Transcript text with surrounding whitespace removed.
    pub text: String,
    /// The cue line exactly as the engine printed it.
    pub raw: String,
}

impl Segment {
    /// Return a copy shifted forward by `offset_ms`.
    pub fn shifted(mut self, offset_ms: u64) -> Self {
        self.time_start += offset_ms;
        self.time_end += offset_ms;
        self
    }

    /// Length of the segment in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.time_end - self.time_start
    }
}

/// The output of one successful engine call.
#[derive(Debug, Clone)]
pub struct TranscribeOutcome {
    /// Every segment the engine produced, in emission order.
    pub segments: Vec<Segment>,

    /// Duration of the transcribed audio in milliseconds.
    pub duration_ms: u64,

    /// Wall-clock time the engine call took.
    pub elapsed: Duration,
}
