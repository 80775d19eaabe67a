//! Speech-to-text engine layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EngineAdapter                          │
//! │   single flight · timeout race · restart_model               │
//! │                                                              │
//! │   transcribe(chunk) ──▶ WhisperBackend::full_default         │
//! │          ▲                        │                          │
//! │          │                        ▼ Printer                  │
//! │   parse_cue_line ◀── Transcribe ── EventBus ── SystemInfo    │
//! │                                      │                       │
//! │                              Completed / TranscribeError     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use whisper_stream::audio::AudioChunk;
//! use whisper_stream::stt::{AdapterConfig, EngineAdapter, TranscribeOptions, WhisperRsBackend};
//!
//! # async fn run(model: Vec<u8>) -> Result<(), whisper_stream::stt::EngineError> {
//! let adapter = EngineAdapter::new(WhisperRsBackend::new("/tmp/whisper-stage"), AdapterConfig::default());
//! adapter.load_model(model)?;
//!
//! let chunk = AudioChunk::new(vec![0.0; 16_000], 16_000);
//! let outcome = adapter
//!     .transcribe(chunk, &TranscribeOptions::default(), |seg| println!("{}", seg.text))
//!     .await?;
//! println!("{} segments", outcome.segments.len());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backend;
pub mod bus;
pub mod cue;
pub mod model;
pub mod transcribe;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use adapter::{AdapterConfig, EngineAdapter, EngineError, EngineState, MODEL_FILE_NAME};
pub use backend::{InstanceHandle, Printer, WhisperBackend, WhisperRsBackend};
pub use bus::{EngineEvent, EventBus, EventKind, Subscription};
pub use cue::{format_timestamp, parse_cue_line, parse_timestamp, render_cue_line, CueParseError};
pub use model::{find_model, models_for_language, ModelDescriptor, ModelLanguage, MODELS};
pub use transcribe::{Segment, TranscribeOptions, TranscribeOutcome};
