//! Session worker. Drives chunks through the adapter one at a time.
//!
//! # Per-chunk flow
//!
//! ```text
//! chunk i ──▶ adapter.transcribe ──on_segment──▶ shift by offset ──▶ pending
//!                    │                                                  │
//!                    │        select! { pending | settled | idle timer }│
//!                    ▼                                                  ▼
//!             Ok  → offset += duration, next chunk          consumer (capacity 1)
//!             Err → restart_model + retry chunk i, or terminal error
//! ```
//!
//! The idle timer is re-armed after every delivered segment, so a chunk that
//! keeps producing output is never cut off. Time spent waiting on a slow
//! consumer does not count against it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::state::{SessionOptions, SessionOutcome, SessionState, SessionSummary, MIN_TIMEOUT_MS};
use super::stream::{SegmentStream, SessionItem};
use crate::audio::{split_into_chunks, AudioChunk, DEFAULT_CHUNK_SECS, WHISPER_SAMPLE_RATE};
use crate::stt::{EngineAdapter, EngineError, Segment};

// ---------------------------------------------------------------------------
// TranscriptionSession
// ---------------------------------------------------------------------------

/// Factory for streaming sessions over one [`EngineAdapter`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use whisper_stream::session::{SessionOptions, TranscriptionSession};
/// use whisper_stream::stt::EngineAdapter;
///
/// # async fn run(adapter: Arc<EngineAdapter>, audio: Vec<f32>) {
/// let session = TranscriptionSession::new(adapter);
/// let mut stream = session.streaming(audio, SessionOptions::default());
/// while let Some(item) = stream.next().await {
///     match item {
///         Ok(seg) => println!("{} ms: {}", seg.time_start, seg.text),
///         Err(e) => eprintln!("session failed: {e}"),
///     }
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TranscriptionSession {
    adapter: Arc<EngineAdapter>,
    sample_rate: u32,
    max_chunk_samples: usize,
}

impl TranscriptionSession {
    /// 16 kHz input cut into 100 s chunks.
    pub fn new(adapter: Arc<EngineAdapter>) -> Self {
        Self {
            adapter,
            sample_rate: WHISPER_SAMPLE_RATE,
            max_chunk_samples: (WHISPER_SAMPLE_RATE * DEFAULT_CHUNK_SECS) as usize,
        }
    }

    /// Override the input sample rate and the chunk length.
    ///
    /// # Panics
    ///
    /// Panics if either value is zero.
    pub fn with_chunking(mut self, sample_rate: u32, max_chunk_samples: usize) -> Self {
        assert!(sample_rate > 0, "sample rate must be > 0");
        assert!(max_chunk_samples > 0, "max_chunk_samples must be > 0");
        self.sample_rate = sample_rate;
        self.max_chunk_samples = max_chunk_samples;
        self
    }

    pub fn max_chunk_samples(&self) -> usize {
        self.max_chunk_samples
    }

    /// Start transcribing `audio` in the background.
    ///
    /// Must be called from within a tokio runtime. Nothing is sent to the
    /// engine until the worker task first runs; segments are produced only
    /// as fast as the returned stream is consumed.
    pub fn streaming(&self, audio: impl Into<Arc<[f32]>>, options: SessionOptions) -> SegmentStream {
        let chunks = split_into_chunks(audio.into(), self.sample_rate, self.max_chunk_samples);
        let (tx, rx) = mpsc::channel(1);

        if options.timeout_ms < MIN_TIMEOUT_MS {
            log::warn!("session: timeout_ms = {}; using {MIN_TIMEOUT_MS} ms", options.timeout_ms);
        }

        log::info!(
            "session: starting over {} chunk(s) of at most {} samples",
            chunks.len(),
            self.max_chunk_samples
        );

        let worker = SessionWorker {
            adapter: Arc::clone(&self.adapter),
            options,
            tx,
            state: SessionState::default(),
        };
        let handle = tokio::spawn(worker.run(chunks));
        SegmentStream::new(rx, handle)
    }
}

// ---------------------------------------------------------------------------
// SessionWorker
// ---------------------------------------------------------------------------

/// How one attempt at a chunk ended.
enum ChunkResult {
    Completed { duration_ms: u64 },
    ConsumerGone,
    Failed(EngineError),
}

struct SessionWorker {
    adapter: Arc<EngineAdapter>,
    options: SessionOptions,
    tx: mpsc::Sender<SessionItem>,
    state: SessionState,
}

impl SessionWorker {
    async fn run(mut self, chunks: Vec<AudioChunk>) -> SessionSummary {
        let total = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if self.tx.is_closed() {
                return self.cancelled();
            }

            self.state.begin_chunk(index);
            let mut restarts = 0u32;

            loop {
                self.state.attempt += 1;
                log::debug!(
                    "session: chunk {}/{} attempt {} at offset {} ms",
                    index + 1,
                    total,
                    self.state.attempt,
                    self.state.offset_ms
                );

                match self.drive_chunk(chunk.clone()).await {
                    ChunkResult::Completed { duration_ms } => {
                        self.state.complete_chunk(duration_ms);
                        break;
                    }
                    ChunkResult::ConsumerGone => return self.cancelled(),
                    ChunkResult::Failed(err) => {
                        if !(err.is_chunk_retriable() && self.options.may_restart(restarts)) {
                            return self.fail(err).await;
                        }
                        log::warn!("session: chunk {} failed ({err}); restarting model", index + 1);
                        restarts += 1;
                        self.state.restarts += 1;
                        if let Err(restart_err) = self.adapter.restart_model().await {
                            return self.fail(restart_err).await;
                        }
                    }
                }
            }

            if index + 1 < total {
                if let Some(ms) = self.options.sleep_ms_between_chunks.filter(|ms| *ms > 0) {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
            }
        }

        log::info!(
            "session: completed {} chunk(s), {} segment(s)",
            self.state.chunks_completed,
            self.state.segments_delivered
        );
        self.state.into_summary(SessionOutcome::Completed)
    }

    /// One attempt at one chunk.
    async fn drive_chunk(&mut self, chunk: AudioChunk) -> ChunkResult {
        let offset = self.state.offset_ms;
        let idle = self.options.idle_timeout();
        let adapter = Arc::clone(&self.adapter);
        let options = self.options.transcribe.clone();

        let (pending_tx, mut pending_rx) = mpsc::unbounded_channel::<Segment>();
        let transcribe = adapter.transcribe(chunk, &options, move |segment| {
            let _ = pending_tx.send(segment.shifted(offset));
        });
        tokio::pin!(transcribe);

        let timer = tokio::time::sleep(idle);
        tokio::pin!(timer);

        let mut consumer_gone = false;
        let settled = loop {
            tokio::select! {
                biased;
                Some(segment) = pending_rx.recv() => {
                    if !consumer_gone {
                        consumer_gone = !self.deliver(segment).await;
                    }
                    timer.as_mut().reset(Instant::now() + idle);
                }
                result = &mut transcribe => break result,
                _ = &mut timer => {
                    log::warn!("session: no output for {idle:?}; abandoning chunk");
                    break Err(EngineError::Timeout(idle));
                }
            }
        };

        // Segments printed in the same poll that settled the call.
        while let Ok(segment) = pending_rx.try_recv() {
            if !consumer_gone {
                consumer_gone = !self.deliver(segment).await;
            }
        }

        if consumer_gone {
            return ChunkResult::ConsumerGone;
        }
        match settled {
            Ok(outcome) => ChunkResult::Completed {
                duration_ms: outcome.duration_ms,
            },
            Err(e) => ChunkResult::Failed(e),
        }
    }

    /// Send one segment; `false` if the consumer is gone.
    ///
    /// Segments a retry re-emits from before the chunk's watermark are
    /// skipped.
    async fn deliver(&mut self, segment: Segment) -> bool {
        if self.state.is_replayed(&segment) {
            log::debug!(
                "session: skipping replayed segment at {} ms (attempt {})",
                segment.time_start,
                self.state.attempt
            );
            return true;
        }
        let mark = segment.clone();
        match self.tx.send(Ok(segment)).await {
            Ok(()) => {
                self.state.record_delivery(&mark);
                true
            }
            Err(_) => {
                log::info!("session: consumer dropped the stream");
                false
            }
        }
    }

    async fn fail(self, err: EngineError) -> SessionSummary {
        log::error!("session: ending with error: {err}");
        let _ = self.tx.send(Err(err.clone())).await;
        self.state.into_summary(SessionOutcome::Failed(err))
    }

    fn cancelled(self) -> SessionSummary {
        log::info!(
            "session: cancelled after {} chunk(s)",
            self.state.chunks_completed
        );
        self.state.into_summary(SessionOutcome::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::backend::testing::{line, wait_ms, Script, Step};
    use crate::stt::{AdapterConfig, EngineState};

    const RATE: u32 = 16_000;

    fn adapter(script: &Script) -> Arc<EngineAdapter> {
        let adapter = Arc::new(EngineAdapter::new(script.backend(), AdapterConfig::default()));
        adapter.load_model(vec![0u8; 8]).unwrap();
        adapter
    }

    fn session(adapter: &Arc<EngineAdapter>, max_chunk_samples: usize) -> TranscriptionSession {
        TranscriptionSession::new(Arc::clone(adapter)).with_chunking(RATE, max_chunk_samples)
    }

    fn silence(samples: usize) -> Vec<f32> {
        vec![0.0; samples]
    }

    async fn drain(mut stream: SegmentStream) -> Vec<SessionItem> {
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    fn texts(items: &[SessionItem]) -> Vec<String> {
        items
            .iter()
            .filter_map(|i| i.as_ref().ok())
            .map(|s| s.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn segments_from_later_chunks_are_offset() {
        let script = Script::new();
        script.push(vec![
            line("[00:00:00.000 --> 00:00:04.000] one"),
            line("[00:00:04.000 --> 00:00:10.000] two"),
            Step::Complete,
        ]);
        script.push(vec![line("[00:00:00.500 --> 00:00:05.000] three"), Step::Complete]);
        let adapter = adapter(&script);

        // 250 000 samples in chunks of 160 000: 10 s + 5.625 s.
        let stream = session(&adapter, 160_000).streaming(silence(250_000), SessionOptions::default());
        let items = drain(stream).await;

        assert_eq!(script.calls(), vec![160_000, 90_000]);
        let segs: Vec<&Segment> = items.iter().map(|i| i.as_ref().unwrap()).collect();
        assert_eq!(texts(&items), vec!["one", "two", "three"]);
        assert_eq!(segs[2].time_start, 10_500);
        assert_eq!(segs[2].time_end, 15_000);
        assert!(segs.windows(2).all(|w| w[0].time_start <= w[1].time_start));
    }

    #[tokio::test]
    async fn empty_audio_yields_nothing() {
        let script = Script::new();
        let adapter = adapter(&script);
        let items = drain(session(&adapter, 100).streaming(silence(0), SessionOptions::default())).await;
        assert!(items.is_empty());
        assert!(script.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_without_restart_ends_stream_after_partial_output() {
        let script = Script::new();
        script.push(vec![line("[00:00:00.000 --> 00:00:01.000] partial"), Step::Fail("boom".into())]);
        let adapter = adapter(&script);

        let stream = session(&adapter, 16_000).streaming(silence(32_000), SessionOptions::default());
        let items = drain(stream).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "partial");
        assert_eq!(items[1], Err(EngineError::Engine("boom".into())));
        assert_eq!(script.calls().len(), 1, "no further chunk after the error");
    }

    #[tokio::test]
    async fn restart_retries_the_same_chunk_without_offset_drift() {
        let script = Script::new();
        script.push(vec![line("[00:00:00.000 --> 00:00:00.400] a"), Step::Complete]);
        script.push(vec![Step::Fail("crash".into())]);
        script.push(vec![line("[00:00:00.200 --> 00:00:00.800] b"), Step::Complete]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            restart_model_on_error: true,
            ..SessionOptions::default()
        };
        let stream = session(&adapter, 16_000).streaming(silence(32_000), options);
        let (segments, summary) = stream.collect_all().await.unwrap();

        assert_eq!(script.calls(), vec![16_000, 16_000, 16_000]);
        assert_eq!(script.inits(), 2);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].time_start, 1_200);
        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.outcome, SessionOutcome::Completed);
        assert_eq!(summary.offset_ms, 2_000);
    }

    #[tokio::test]
    async fn retry_does_not_replay_already_delivered_segments() {
        let script = Script::new();
        script.push(vec![
            line("[00:00:00.000 --> 00:00:00.400] a"),
            line("[00:00:00.400 --> 00:00:00.800] b"),
            Step::Fail("crash".into()),
        ]);
        script.push(vec![
            line("[00:00:00.000 --> 00:00:00.400] a"),
            line("[00:00:00.400 --> 00:00:00.800] b"),
            line("[00:00:00.800 --> 00:00:01.000] c"),
            Step::Complete,
        ]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            restart_model_on_error: true,
            ..SessionOptions::default()
        };
        let (segments, summary) = session(&adapter, 16_000)
            .streaming(silence(16_000), options)
            .collect_all()
            .await
            .unwrap();

        let starts: Vec<u64> = segments.iter().map(|s| s.time_start).collect();
        assert_eq!(starts, vec![0, 400, 800]);
        assert_eq!(segments[2].text, "c");
        assert_eq!(summary.segments_delivered, 3);
        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.outcome, SessionOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_retried_like_an_engine_error() {
        let script = Script::new();
        script.push(vec![Step::Hang]);
        script.push(vec![line("[00:00:00.100 --> 00:00:00.900] ok"), Step::Complete]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            timeout_ms: 500,
            restart_model_on_error: true,
            ..SessionOptions::default()
        };
        let (segments, summary) = session(&adapter, 16_000)
            .streaming(silence(16_000), options)
            .collect_all()
            .await
            .unwrap();

        assert_eq!(script.calls(), vec![16_000, 16_000]);
        assert_eq!(script.inits(), 2);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].time_start, segments[0].text.as_str()), (100, "ok"));
        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.offset_ms, 1_000);
        assert_eq!(summary.outcome, SessionOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_still_waits_for_the_floor() {
        let script = Script::new();
        script.push(vec![Step::Hang]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            timeout_ms: 0,
            ..SessionOptions::default()
        };
        let items = drain(session(&adapter, 16_000).streaming(silence(16_000), options)).await;
        assert_eq!(
            items,
            vec![Err(EngineError::Timeout(Duration::from_millis(MIN_TIMEOUT_MS)))]
        );
    }

    #[tokio::test]
    async fn restart_cap_ends_the_stream() {
        let script = Script::new();
        script.push(vec![Step::Fail("first".into())]);
        script.push(vec![Step::Fail("second".into())]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            restart_model_on_error: true,
            max_restarts_per_chunk: Some(1),
            ..SessionOptions::default()
        };
        let items = drain(session(&adapter, 16_000).streaming(silence(16_000), options)).await;

        assert_eq!(items, vec![Err(EngineError::Engine("second".into()))]);
        assert_eq!(script.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_chunk_times_out_no_earlier_than_timeout_ms() {
        let script = Script::new();
        script.push(vec![Step::Hang]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            timeout_ms: 1_500,
            ..SessionOptions::default()
        };
        let started = Instant::now();
        let items = drain(session(&adapter, 16_000).streaming(silence(16_000), options)).await;

        assert!(started.elapsed() >= Duration::from_millis(1_500));
        assert_eq!(items, vec![Err(EngineError::Timeout(Duration::from_millis(1_500)))]);
        assert_eq!(adapter.state(), EngineState::Faulted);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_rearms_after_each_segment() {
        let script = Script::new();
        script.push(vec![
            wait_ms(800),
            line("[00:00:00.000 --> 00:00:01.000] a"),
            wait_ms(800),
            line("[00:00:01.000 --> 00:00:02.000] b"),
            wait_ms(800),
            Step::Complete,
        ]);
        let adapter = adapter(&script);

        let options = SessionOptions {
            timeout_ms: 1_000,
            ..SessionOptions::default()
        };
        let items = drain(session(&adapter, 16_000).streaming(silence(16_000), options)).await;
        assert_eq!(texts(&items), vec!["a", "b"]);
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_chunks_but_not_after_the_last() {
        let script = Script::new();
        let adapter = adapter(&script);
        let options = SessionOptions {
            sleep_ms_between_chunks: Some(250),
            ..SessionOptions::default()
        };

        let started = Instant::now();
        let items = drain(session(&adapter, 8_000).streaming(silence(24_000), options)).await;

        assert!(items.is_empty());
        assert_eq!(script.calls().len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_millis(750));
    }

    #[tokio::test]
    async fn second_concurrent_session_is_busy() {
        let script = Script::new();
        script.push(vec![
            line("[00:00:00.000 --> 00:00:01.000] first"),
            wait_ms(50),
            Step::Complete,
        ]);
        let adapter = adapter(&script);

        let mut a = session(&adapter, 16_000).streaming(silence(16_000), SessionOptions::default());
        assert_eq!(a.next().await.unwrap().unwrap().text, "first");

        let b = session(&adapter, 16_000).streaming(silence(16_000), SessionOptions::default());
        assert_eq!(drain(b).await, vec![Err(EngineError::Busy)]);
        assert!(a.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_stops_before_the_next_chunk() {
        let script = Script::new();
        script.push(vec![line("[00:00:00.000 --> 00:00:01.000] a"), wait_ms(20), Step::Complete]);
        let adapter = adapter(&script);

        let mut stream = session(&adapter, 16_000).streaming(silence(64_000), SessionOptions::default());
        assert!(stream.next().await.unwrap().is_ok());
        let summary = stream.cancel().await.unwrap();

        assert_eq!(summary.outcome, SessionOutcome::Cancelled);
        assert_eq!(script.calls().len(), 1);
        assert_eq!(adapter.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn works_as_a_futures_stream() {
        use futures_util::StreamExt;

        let script = Script::new();
        script.push(vec![line("[00:00:00.000 --> 00:00:01.000] x"), Step::Complete]);
        let adapter = adapter(&script);

        let stream = session(&adapter, 16_000).streaming(silence(16_000), SessionOptions::default());
        let items: Vec<SessionItem> = StreamExt::collect(stream).await;
        assert_eq!(texts(&items), vec!["x"]);
    }
}
