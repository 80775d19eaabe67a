//! Single-flight adapter over a callback-driven engine.
//!
//! # Overview
//!
//! [`EngineAdapter`] owns exactly one [`WhisperBackend`] and turns its
//! fire-and-forget `full_default` + printed-lines protocol into an awaitable
//! [`EngineAdapter::transcribe`].
//!
//! ```text
//!            load_model                transcribe              Completed
//! Unloaded ─────────────▶ Idle ─────────────────▶ Transcribing ─────────▶ Idle
//!                          ▲                           │
//!                          │ restart_model             │ TranscribeError / timeout / dropped
//!                          └──────────── Faulted ◀─────┘
//! ```
//!
//! The engine has no queue, so a second `transcribe` while one is in flight
//! is rejected with [`EngineError::Busy`] rather than waited on.
//!
//! Bus subscriptions live exactly as long as one call. They are removed on
//! every way out of `transcribe`, including the caller dropping the future,
//! and every event is tagged with a call id, so output from an abandoned call
//! can never leak into the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::AudioChunk;
use crate::stt::backend::{InstanceHandle, Printer, WhisperBackend};
use crate::stt::bus::{EngineEvent, EventBus, EventKind, Subscription};
use crate::stt::cue::parse_cue_line;
use crate::stt::transcribe::{Segment, TranscribeOptions, TranscribeOutcome};

/// Name of the staged model file inside the engine's filesystem shim.
pub const MODEL_FILE_NAME: &str = "whisper.bin";

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// All errors that can arise from the engine layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A transcription is already in flight on this engine.
    #[error("engine is busy with another transcription")]
    Busy,

    /// No model has been loaded into the engine.
    #[error("engine not ready: no model loaded")]
    EngineNotReady,

    /// `restart_model` was called before any model bytes were supplied.
    #[error("no model loaded; nothing to restart")]
    NoModelLoaded,

    /// A previous call failed or timed out; the engine must be restarted.
    #[error("engine faulted; restart the model before transcribing")]
    Faulted,

    /// The engine call did not settle in time.
    #[error("transcription timed out after {0:?}")]
    Timeout(Duration),

    /// The engine reported a failure for the call.
    #[error("engine error: {0}")]
    Engine(String),

    /// Staging, loading or starting the engine failed.
    #[error("engine backend error: {0}")]
    Backend(String),

    /// Internal / unexpected error (e.g. a join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the error is local to one chunk and may be cured by a model
    /// restart and a retry of the same chunk.
    pub fn is_chunk_retriable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_) | EngineError::Engine(_) | EngineError::Faulted
        )
    }
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Lifecycle state of the engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No instance.
    #[default]
    Unloaded,
    /// A model is being staged and initialised.
    Loading,
    /// Ready for a call.
    Idle,
    /// A call is in flight.
    Transcribing,
    /// The last call failed; a restart is needed.
    Faulted,
}

impl EngineState {
    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Unloaded => "Unloaded",
            EngineState::Loading => "Loading",
            EngineState::Idle => "Idle",
            EngineState::Transcribing => "Transcribing",
            EngineState::Faulted => "Faulted",
        }
    }
}

// ---------------------------------------------------------------------------
// AdapterConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for [`EngineAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Longest chunk the engine is comfortable with. Longer chunks are
    /// accepted with a warning.
    pub max_transcribe_secs: u64,
    /// Hard deadline for one engine call.
    pub engine_timeout: Duration,
}

impl AdapterConfig {
    /// Derive the engine timeout as twice the recommended maximum chunk.
    pub fn with_max_transcribe_secs(max_transcribe_secs: u64) -> Self {
        Self {
            max_transcribe_secs,
            engine_timeout: Duration::from_secs(max_transcribe_secs * 2),
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::with_max_transcribe_secs(120)
    }
}

// ---------------------------------------------------------------------------
// EngineAdapter
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    state: EngineState,
    instance: Option<InstanceHandle>,
    model: Option<Arc<[u8]>>,
}

/// Owns one engine instance and serialises access to it.
///
/// Share it behind an `Arc`; [`restart_model`](Self::restart_model) needs
/// one to move the reload onto the blocking pool.
pub struct EngineAdapter {
    backend: Mutex<Box<dyn WhisperBackend>>,
    inner: Mutex<Inner>,
    bus: EventBus,
    config: AdapterConfig,
    next_call: AtomicU64,
    _log_subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineAdapter {
    /// Wrap `backend`. No model is loaded yet.
    pub fn new(backend: impl WhisperBackend, config: AdapterConfig) -> Self {
        let bus = EventBus::new();

        let log_subscriptions = vec![
            bus.on(EventKind::SystemInfo, |e| {
                log::debug!("engine[{}]: {}", e.call, e.payload)
            }),
            bus.on(EventKind::Diagnostic, |e| {
                log::warn!("engine[{}] stderr: {}", e.call, e.payload)
            }),
        ];

        Self {
            backend: Mutex::new(Box::new(backend)),
            inner: Mutex::new(Inner::default()),
            bus,
            config,
            next_call: AtomicU64::new(1),
            _log_subscriptions: log_subscriptions,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.lock_inner().state
    }

    /// `true` once model bytes have been supplied, even if the engine has
    /// since faulted.
    pub fn is_model_loaded(&self) -> bool {
        self.lock_inner().model.is_some()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The bus the engine prints on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // -----------------------------------------------------------------------
    // Model lifecycle
    // -----------------------------------------------------------------------

    /// Stage `model` and initialise a fresh engine instance, tearing down any
    /// previous one. The bytes are remembered for
    /// [`restart_model`](Self::restart_model).
    ///
    /// This blocks while the engine loads the model; call it from a blocking
    /// context.
    pub fn load_model(&self, model: impl Into<Arc<[u8]>>) -> Result<(), EngineError> {
        let model: Arc<[u8]> = model.into();

        let previous = {
            let mut inner = self.lock_inner();
            if matches!(inner.state, EngineState::Transcribing | EngineState::Loading) {
                return Err(EngineError::Busy);
            }
            inner.state = EngineState::Loading;
            inner.model = Some(Arc::clone(&model));
            inner.instance.take()
        };

        let loaded = {
            let mut backend = self.lock_backend();
            if previous.is_some() {
                if let Err(e) = backend.unlink(MODEL_FILE_NAME) {
                    log::debug!("adapter: unlink of previous model failed: {e}");
                }
                backend.free();
            }
            backend
                .create_data_file("/", MODEL_FILE_NAME, &model)
                .and_then(|()| backend.init(MODEL_FILE_NAME))
        };

        let mut inner = self.lock_inner();
        match loaded {
            Ok(instance) => {
                inner.instance = Some(instance);
                inner.state = EngineState::Idle;
                log::info!("adapter: model loaded ({} bytes)", model.len());
                Ok(())
            }
            Err(e) => {
                inner.state = EngineState::Unloaded;
                log::error!("adapter: model load failed: {e}");
                Err(e)
            }
        }
    }

    /// Tear down and reload the engine from the last model bytes.
    ///
    /// The reload runs on tokio's blocking pool.
    pub async fn restart_model(self: &Arc<Self>) -> Result<(), EngineError> {
        let model = self
            .lock_inner()
            .model
            .clone()
            .ok_or(EngineError::NoModelLoaded)?;

        log::info!("adapter: restarting engine");
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.load_model(model))
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?
    }

    /// Free the engine instance and forget the model.
    pub fn unload(&self) -> Result<(), EngineError> {
        let mut inner = self.lock_inner();
        if matches!(inner.state, EngineState::Transcribing | EngineState::Loading) {
            return Err(EngineError::Busy);
        }
        if inner.instance.take().is_some() {
            let mut backend = self.lock_backend();
            if let Err(e) = backend.unlink(MODEL_FILE_NAME) {
                log::debug!("adapter: unlink on unload failed: {e}");
            }
            backend.free();
        }
        inner.model = None;
        inner.state = EngineState::Unloaded;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transcription
    // -----------------------------------------------------------------------

    /// Transcribe one chunk.
    ///
    /// `on_segment` receives every segment as soon as the engine prints it;
    /// the resolved [`TranscribeOutcome`] additionally aggregates them.
    /// Segment timestamps are relative to the chunk.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Busy`]: another call is in flight.
    /// - [`EngineError::EngineNotReady`]: no model loaded.
    /// - [`EngineError::Faulted`]: a previous call failed; restart first.
    /// - [`EngineError::Timeout`]: no completion within the engine timeout.
    /// - [`EngineError::Engine`]: the engine reported a failure.
    ///
    /// Dropping the returned future before it settles leaves the adapter
    /// `Faulted`.
    pub async fn transcribe<F>(
        &self,
        chunk: AudioChunk,
        options: &TranscribeOptions,
        mut on_segment: F,
    ) -> Result<TranscribeOutcome, EngineError>
    where
        F: FnMut(Segment) + Send,
    {
        let instance = self.begin()?;
        let call = self.next_call.fetch_add(1, Ordering::Relaxed);
        let mut flight = InFlight::new(self, call);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<EngineEvent>();
        for kind in [EventKind::Transcribe, EventKind::Completed, EventKind::TranscribeError] {
            let tx = event_tx.clone();
            flight.subscriptions.push(self.bus.on(kind, move |e| {
                if e.call == call {
                    let _ = tx.send(e.clone());
                }
            }));
        }
        drop(event_tx);

        if chunk.duration_secs() > self.config.max_transcribe_secs as f32 {
            log::warn!(
                "adapter: chunk of {:.1}s exceeds the recommended {}s",
                chunk.duration_secs(),
                self.config.max_transcribe_secs
            );
        }

        let duration_ms = chunk.duration_ms();
        let started = Instant::now();
        log::debug!("adapter: call {call} started ({} samples)", chunk.len());

        let printer = Printer::new(self.bus.clone(), call);
        let started_ok = self
            .lock_backend()
            .full_default(instance, chunk, options, printer);
        if let Err(e) = started_ok {
            flight.settle(EngineState::Faulted);
            return Err(e);
        }

        let deadline = tokio::time::sleep(self.config.engine_timeout);
        tokio::pin!(deadline);

        let mut segments = Vec::new();
        loop {
            tokio::select! {
                biased;
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        flight.settle(EngineState::Faulted);
                        return Err(EngineError::Internal("engine event channel closed".into()));
                    };
                    match event.kind {
                        EventKind::Transcribe => match parse_cue_line(&event.payload) {
                            Ok(segment) => {
                                segments.push(segment.clone());
                                on_segment(segment);
                            }
                            Err(e) => log::warn!("adapter: dropping cue line: {e}"),
                        },
                        EventKind::Completed => {
                            flight.settle(EngineState::Idle);
                            log::debug!(
                                "adapter: call {call} completed with {} segments",
                                segments.len()
                            );
                            return Ok(TranscribeOutcome {
                                segments,
                                duration_ms,
                                elapsed: started.elapsed(),
                            });
                        }
                        _ => {
                            flight.settle(EngineState::Faulted);
                            log::error!("adapter: call {call} failed: {}", event.payload);
                            return Err(EngineError::Engine(event.payload));
                        }
                    }
                }
                _ = &mut deadline => {
                    flight.settle(EngineState::Faulted);
                    log::error!(
                        "adapter: call {call} timed out after {:?}",
                        self.config.engine_timeout
                    );
                    return Err(EngineError::Timeout(self.config.engine_timeout));
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn begin(&self) -> Result<InstanceHandle, EngineError> {
        let mut inner = self.lock_inner();
        match inner.state {
            EngineState::Transcribing | EngineState::Loading => return Err(EngineError::Busy),
            EngineState::Faulted => return Err(EngineError::Faulted),
            EngineState::Unloaded | EngineState::Idle => {}
        }
        let instance = inner.instance.ok_or(EngineError::EngineNotReady)?;
        inner.state = EngineState::Transcribing;
        Ok(instance)
    }

    fn set_state(&self, state: EngineState) {
        self.lock_inner().state = state;
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_backend(&self) -> MutexGuard<'_, Box<dyn WhisperBackend>> {
        self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// InFlight guard
// ---------------------------------------------------------------------------

/// Holds the bus subscriptions of one call and restores adapter state on
/// every exit path. Subscriptions are dropped before the state changes.
struct InFlight<'a> {
    adapter: &'a EngineAdapter,
    call: u64,
    subscriptions: Vec<Subscription>,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(adapter: &'a EngineAdapter, call: u64) -> Self {
        Self {
            adapter,
            call,
            subscriptions: Vec::new(),
            settled: false,
        }
    }

    fn settle(&mut self, next: EngineState) {
        self.subscriptions.clear();
        self.adapter.set_state(next);
        self.settled = true;
        log::debug!("adapter: call {} settled, engine {}", self.call, next.label());
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("adapter: call {} abandoned before settling", self.call);
            self.settle(EngineState::Faulted);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::stt::backend::testing::{line, wait_ms, Script, Step};

    fn chunk(samples: usize) -> AudioChunk {
        AudioChunk::new(vec![0.0f32; samples], 16_000)
    }

    fn loaded_adapter(script: &Script) -> Arc<EngineAdapter> {
        let adapter = Arc::new(EngineAdapter::new(script.backend(), AdapterConfig::default()));
        adapter.load_model(vec![1u8, 2, 3]).unwrap();
        adapter
    }

    #[tokio::test]
    async fn transcribe_before_load_is_not_ready() {
        let script = Script::new();
        let adapter = EngineAdapter::new(script.backend(), AdapterConfig::default());
        let err = adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::EngineNotReady);
        assert_eq!(adapter.state(), EngineState::Unloaded);
    }

    #[test]
    fn load_model_stages_bytes_and_inits() {
        let script = Script::new();
        let adapter = EngineAdapter::new(script.backend(), AdapterConfig::default());
        adapter.load_model(vec![9u8; 4]).unwrap();

        assert_eq!(adapter.state(), EngineState::Idle);
        assert_eq!(script.staged("/whisper.bin"), Some(vec![9u8; 4]));
        assert_eq!(script.inits(), 1);
        assert!(adapter.is_model_loaded());
    }

    #[test]
    fn failed_init_leaves_adapter_unloaded_but_remembers_bytes() {
        let script = Script::new();
        script.fail_init(true);
        let adapter = EngineAdapter::new(script.backend(), AdapterConfig::default());

        assert!(matches!(adapter.load_model(vec![1u8]), Err(EngineError::Backend(_))));
        assert_eq!(adapter.state(), EngineState::Unloaded);
        assert!(adapter.is_model_loaded());
    }

    #[tokio::test]
    async fn segments_stream_through_callback_and_aggregate() {
        let script = Script::new();
        script.push(vec![
            Step::Info("system_info: AVX = 1".into()),
            line("[00:00:00.000 --> 00:00:01.500]  first"),
            line("[00:00:01.500 --> 00:00:03.000]  second"),
            Step::Complete,
        ]);
        let adapter = loaded_adapter(&script);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let outcome = adapter
            .transcribe(chunk(48_000), &TranscribeOptions::default(), move |s| {
                sink.lock().unwrap().push(s.text)
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(outcome.segments.len(), 2);
        assert_eq!(outcome.segments[1].time_end, 3_000);
        assert_eq!(outcome.duration_ms, 3_000);
        assert_eq!(adapter.state(), EngineState::Idle);
        assert_eq!(adapter.bus().listener_count(), 2, "only the log listeners remain");
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped() {
        let script = Script::new();
        script.push(vec![
            line("[garbage]"),
            line("[00:00:05.000 --> 00:00:04.000] backwards"),
            line("[00:00:00.000 --> 00:00:01.000] ok"),
            Step::Complete,
        ]);
        let adapter = loaded_adapter(&script);
        let outcome = adapter
            .transcribe(chunk(16_000), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.segments[0].text, "ok");
    }

    #[tokio::test]
    async fn concurrent_call_is_busy() {
        let script = Script::new();
        script.push(vec![wait_ms(50), Step::Complete]);
        let adapter = loaded_adapter(&script);

        let opts = TranscribeOptions::default();
        let first = adapter.transcribe(chunk(160), &opts, |_| {});
        let second = async {
            tokio::task::yield_now().await;
            adapter
                .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
                .await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), EngineError::Busy);
        assert_eq!(script.calls().len(), 1);
    }

    #[tokio::test]
    async fn engine_error_faults_and_unsubscribes() {
        let script = Script::new();
        script.push(vec![line("[00:00:00.000 --> 00:00:01.000] partial"), Step::Fail("abort".into())]);
        let adapter = loaded_adapter(&script);

        let err = adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Engine("abort".into()));
        assert_eq!(adapter.state(), EngineState::Faulted);
        assert_eq!(adapter.bus().listener_count(), 2);

        let again = adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(again, EngineError::Faulted);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_engine_times_out_and_faults() {
        let script = Script::new();
        script.push(vec![Step::Hang]);
        let adapter = Arc::new(EngineAdapter::new(
            script.backend(),
            AdapterConfig::with_max_transcribe_secs(5),
        ));
        adapter.load_model(vec![0u8]).unwrap();

        let started = tokio::time::Instant::now();
        let err = adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::Timeout(Duration::from_secs(10)));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(adapter.state(), EngineState::Faulted);
        assert_eq!(adapter.bus().listener_count(), 2);
    }

    #[tokio::test]
    async fn dropped_call_faults_adapter() {
        let script = Script::new();
        script.push(vec![Step::Hang]);
        let adapter = loaded_adapter(&script);

        {
            let opts = TranscribeOptions::default();
            let fut = adapter.transcribe(chunk(160), &opts, |_| {});
            tokio::pin!(fut);
            let polled = tokio::time::timeout(Duration::from_millis(5), &mut fut).await;
            assert!(polled.is_err());
            assert_eq!(adapter.state(), EngineState::Transcribing);
        }

        assert_eq!(adapter.state(), EngineState::Faulted);
        assert_eq!(adapter.bus().listener_count(), 2);
    }

    #[tokio::test]
    async fn stale_output_from_previous_call_is_ignored() {
        let script = Script::new();
        // Call 1 hangs, then prints late while call 2 is running.
        script.push(vec![wait_ms(20), line("[00:00:00.000 --> 00:00:01.000] stale"), Step::Complete]);
        script.push(vec![wait_ms(40), line("[00:00:00.000 --> 00:00:01.000] fresh"), Step::Complete]);
        let adapter = loaded_adapter(&script);

        {
            let opts = TranscribeOptions::default();
            let fut = adapter.transcribe(chunk(160), &opts, |_| {});
            tokio::pin!(fut);
            let _ = tokio::time::timeout(Duration::from_millis(5), &mut fut).await;
        }
        adapter.restart_model().await.unwrap();

        let outcome = adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.segments[0].text, "fresh");
    }

    #[tokio::test]
    async fn restart_without_model_fails() {
        let script = Script::new();
        let adapter = Arc::new(EngineAdapter::new(script.backend(), AdapterConfig::default()));
        assert_eq!(adapter.restart_model().await.unwrap_err(), EngineError::NoModelLoaded);
    }

    #[tokio::test]
    async fn restart_recovers_from_fault() {
        let script = Script::new();
        script.push(vec![Step::Fail("crash".into())]);
        script.push(vec![Step::Complete]);
        let adapter = loaded_adapter(&script);

        assert!(adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .is_err());
        adapter.restart_model().await.unwrap();

        assert_eq!(adapter.state(), EngineState::Idle);
        assert_eq!(script.inits(), 2);
        assert_eq!(script.frees(), 1);
        assert!(adapter
            .transcribe(chunk(160), &TranscribeOptions::default(), |_| {})
            .await
            .is_ok());
    }

    #[test]
    fn unload_frees_and_forgets_model() {
        let script = Script::new();
        let adapter = EngineAdapter::new(script.backend(), AdapterConfig::default());
        adapter.load_model(vec![1u8]).unwrap();
        adapter.unload().unwrap();

        assert_eq!(adapter.state(), EngineState::Unloaded);
        assert!(!adapter.is_model_loaded());
        assert_eq!(script.frees(), 1);
        assert_eq!(script.staged("/whisper.bin"), None);
    }

    #[test]
    fn retriable_classification() {
        assert!(EngineError::Timeout(Duration::from_secs(1)).is_chunk_retriable());
        assert!(EngineError::Engine("x".into()).is_chunk_retriable());
        assert!(EngineError::Faulted.is_chunk_retriable());
        assert!(!EngineError::Busy.is_chunk_retriable());
        assert!(!EngineError::EngineNotReady.is_chunk_retriable());
        assert!(!EngineError::NoModelLoaded.is_chunk_retriable());
        assert!(!EngineError::Backend("x".into()).is_chunk_retriable());
    }

    #[test]
    fn state_labels() {
        assert_eq!(EngineState::default().label(), "Unloaded");
        assert_eq!(EngineState::Transcribing.label(), "Transcribing");
        assert_eq!(EngineState::Faulted.label(), "Faulted");
    }

    #[test]
    fn default_engine_timeout_is_twice_max_transcribe() {
        let cfg = AdapterConfig::default();
        assert_eq!(cfg.max_transcribe_secs, 120);
        assert_eq!(cfg.engine_timeout, Duration::from_secs(240));
    }
}
