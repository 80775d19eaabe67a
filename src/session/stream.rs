//! Consumer side of a session.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::state::SessionSummary;
use crate::stt::{EngineError, Segment};

/// One item of a session: a segment, or the terminal error.
pub type SessionItem = Result<Segment, EngineError>;

/// Lazily produced, session-relative segments.
///
/// Segments arrive in chunk order with non-decreasing `time_start`. An error,
/// if any, is always the last item.
///
/// Dropping the stream stops delivery; the worker finishes the chunk it is
/// on and starts no new one. [`cancel`](Self::cancel) does the same and
/// waits for the worker to wind down.
#[derive(Debug)]
pub struct SegmentStream {
    rx: mpsc::Receiver<SessionItem>,
    worker: JoinHandle<SessionSummary>,
}

impl SegmentStream {
    pub(crate) fn new(rx: mpsc::Receiver<SessionItem>, worker: JoinHandle<SessionSummary>) -> Self {
        Self { rx, worker }
    }

    /// Wait for the next segment. `None` once the session has ended.
    pub async fn next(&mut self) -> Option<SessionItem> {
        self.rx.recv().await
    }

    /// Stop the session and wait for its worker to finish.
    ///
    /// Segments still buffered are discarded.
    pub async fn cancel(mut self) -> Result<SessionSummary, EngineError> {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        self.worker
            .await
            .map_err(|e| EngineError::Internal(format!("session worker: {e}")))
    }

    /// Drain the rest of the session and wait for the worker's summary.
    ///
    /// Collects every remaining segment; the terminal error, if any, is
    /// reported in the summary's outcome.
    pub async fn collect_all(mut self) -> Result<(Vec<Segment>, SessionSummary), EngineError> {
        let mut segments = Vec::new();
        while let Some(item) = self.rx.recv().await {
            if let Ok(segment) = item {
                segments.push(segment);
            }
        }
        let summary = self
            .worker
            .await
            .map_err(|e| EngineError::Internal(format!("session worker: {e}")))?;
        Ok((segments, summary))
    }
}

impl Stream for SegmentStream {
    type Item = SessionItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
