//! Engine contract and the production whisper-rs backend.
//!
//! # Overview
//!
//! [`WhisperBackend`] is the native-module surface the adapter drives:
//! stage the model bytes through a small filesystem shim, `init` an
//! instance, then fire-and-forget `full_default` calls whose results arrive
//! as printed lines on a [`Printer`].
//!
//! [`WhisperRsBackend`] implements it on top of `whisper_rs`. The staging
//! directory plays the role of the filesystem shim, inference runs on tokio's
//! blocking pool, and every segment is printed as a cue line the moment
//! whisper reports it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use whisper_rs::{FullParams, SamplingStrategy, SegmentCallbackData, WhisperContext, WhisperContextParameters};

use crate::audio::AudioChunk;
use crate::stt::adapter::EngineError;
use crate::stt::bus::{EngineEvent, EventBus, EventKind};
use crate::stt::cue::render_cue_line;
use crate::stt::transcribe::{Segment, TranscribeOptions};

// ---------------------------------------------------------------------------
// InstanceHandle
// ---------------------------------------------------------------------------

/// Opaque handle to an initialised engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u32);

// ---------------------------------------------------------------------------
// Printer
// ---------------------------------------------------------------------------

/// The print callbacks handed to the engine for one call.
///
/// Everything printed is tagged with the call id and emitted on the adapter's
/// [`EventBus`].
#[derive(Debug, Clone)]
pub struct Printer {
    bus: EventBus,
    call: u64,
}

impl Printer {
    pub fn new(bus: EventBus, call: u64) -> Self {
        Self { bus, call }
    }

    /// Id of the engine call this printer belongs to.
    pub fn call_id(&self) -> u64 {
        self.call
    }

    /// stdout: lines starting with `[` are cue lines, anything else is
    /// system information.
    pub fn print(&self, line: &str) {
        let kind = if line.trim_start().starts_with('[') {
            EventKind::Transcribe
        } else {
            EventKind::SystemInfo
        };
        self.emit(kind, line);
    }

    /// stderr.
    pub fn print_err(&self, line: &str) {
        self.emit(EventKind::Diagnostic, line);
    }

    /// Signal that the call finished normally.
    pub fn complete(&self) {
        self.emit(EventKind::Completed, "");
    }

    /// Signal that the call failed.
    pub fn fail(&self, message: &str) {
        self.emit(EventKind::TranscribeError, message);
    }

    fn emit(&self, kind: EventKind, payload: &str) {
        self.bus.emit(&EngineEvent::new(self.call, kind, payload));
    }
}

// ---------------------------------------------------------------------------
// WhisperBackend trait
// ---------------------------------------------------------------------------

/// The native engine surface.
///
/// # Contract
///
/// - `full_default` must return promptly. Results are reported through the
///   [`Printer`]: zero or more cue lines, then exactly one of
///   [`Printer::complete`] or [`Printer::fail`]. A crashed engine may report
///   nothing at all; the adapter's timeout covers that case.
/// - The engine has no internal queue. The adapter guarantees at most one
///   `full_default` in flight per instance.
pub trait WhisperBackend: Send + 'static {
    /// Stage `data` as `dir/name` so that `init` can read it.
    fn create_data_file(&mut self, dir: &str, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Remove a previously staged file.
    fn unlink(&mut self, name: &str) -> Result<(), EngineError>;

    /// Load the staged model at `model_path` and return an instance handle.
    fn init(&mut self, model_path: &str) -> Result<InstanceHandle, EngineError>;

    /// Start transcribing `audio`; results arrive on `printer`.
    fn full_default(
        &mut self,
        instance: InstanceHandle,
        audio: AudioChunk,
        options: &TranscribeOptions,
        printer: Printer,
    ) -> Result<(), EngineError>;

    /// Release every instance.
    fn free(&mut self);
}

// Compile-time assertion: Box<dyn WhisperBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn WhisperBackend>) {}
};

// ---------------------------------------------------------------------------
// WhisperRsBackend
// ---------------------------------------------------------------------------

/// Production backend on `whisper_rs`.
pub struct WhisperRsBackend {
    staging_dir: PathBuf,
    instances: HashMap<InstanceHandle, Arc<WhisperContext>>,
    next_instance: u32,
}

impl std::fmt::Debug for WhisperRsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRsBackend")
            .field("staging_dir", &self.staging_dir)
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

impl WhisperRsBackend {
    /// Create a backend that stages model files under `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            instances: HashMap::new(),
            next_instance: 1,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.staging_dir.join(path.trim_start_matches('/'))
    }
}

impl WhisperBackend for WhisperRsBackend {
    fn create_data_file(&mut self, dir: &str, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let dir = self.resolve(dir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::Backend(format!("create {}: {e}", dir.display())))?;
        let path = dir.join(name);
        std::fs::write(&path, data)
            .map_err(|e| EngineError::Backend(format!("write {}: {e}", path.display())))
    }

    fn unlink(&mut self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name);
        std::fs::remove_file(&path)
            .map_err(|e| EngineError::Backend(format!("unlink {}: {e}", path.display())))
    }

    fn init(&mut self, model_path: &str) -> Result<InstanceHandle, EngineError> {
        let path = self.resolve(model_path);
        let ctx = load_context(&path)?;

        let handle = InstanceHandle(self.next_instance);
        self.next_instance += 1;
        self.instances.insert(handle, Arc::new(ctx));
        log::info!("backend: whisper instance {} loaded from {}", handle.0, path.display());
        Ok(handle)
    }

    fn full_default(
        &mut self,
        instance: InstanceHandle,
        audio: AudioChunk,
        options: &TranscribeOptions,
        printer: Printer,
    ) -> Result<(), EngineError> {
        let ctx = self
            .instances
            .get(&instance)
            .cloned()
            .ok_or(EngineError::EngineNotReady)?;
        let options = options.clone();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Backend(format!("no tokio runtime for inference: {e}")))?;

        // Fire and forget: the result is reported through the printer.
        runtime.spawn_blocking(move || match run_full(&ctx, &audio, &options, &printer) {
            Ok(()) => printer.complete(),
            Err(message) => {
                log::error!("backend: call {} failed: {message}", printer.call_id());
                printer.print_err(&message);
                printer.fail(&message);
            }
        });
        Ok(())
    }

    fn free(&mut self) {
        // In-flight inference threads keep their own Arc to the context.
        self.instances.clear();
    }
}

fn load_context(path: &Path) -> Result<WhisperContext, EngineError> {
    if !path.exists() {
        return Err(EngineError::Backend(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    let path_str = path.to_str().ok_or_else(|| {
        EngineError::Backend(format!(
            "model path contains non-UTF-8 characters: {}",
            path.display()
        ))
    })?;

    WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
        .map_err(|e| EngineError::Backend(format!("whisper context init: {e}")))
}

/// Run one inference pass, printing each segment as it is decoded.
fn run_full(
    ctx: &WhisperContext,
    audio: &AudioChunk,
    options: &TranscribeOptions,
    printer: &Printer,
) -> Result<(), String> {
    let mut state = ctx.create_state().map_err(|e| e.to_string())?;

    let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    let lang: Option<&str> = if options.language == "auto" {
        None
    } else {
        Some(options.language.as_str())
    };
    fp.set_language(lang);
    fp.set_n_threads(options.threads);
    fp.set_translate(options.translate);
    fp.set_print_progress(false);
    fp.set_print_realtime(false);
    fp.set_print_special(false);
    fp.set_print_timestamps(false);

    // Timestamps from whisper are in centiseconds.
    let segment_printer = printer.clone();
    fp.set_segment_callback_safe(move |data: SegmentCallbackData| {
        let start = data.start_timestamp.max(0) as u64 * 10;
        let end = (data.end_timestamp.max(0) as u64 * 10).max(start);
        let line = render_cue_line(&Segment {
            time_start: start,
            time_end: end,
            text: data.text.trim().to_string(),
            raw: String::new(),
        });
        segment_printer.print(&line);
    });

    state
        .full(fp, audio.samples())
        .map(|_| ())
        .map_err(|e| format!("inference failed: {e}"))
}

// ---------------------------------------------------------------------------
// Scripted backend  (test-only)
// ---------------------------------------------------------------------------
