//! Where model bytes come from on a cache miss.
//!
//! [`ModelSource`] is the seam between the cache and the network.
//! [`HttpModelSource`] streams the response body through `reqwest` so the
//! cache can report progress while a large model downloads.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;

use super::store::StoreError;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Errors surfaced by the model cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The id is not in the model catalog.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The server answered with a non-success status.
    #[error("failed to fetch {url}: {status} {status_text}")]
    FetchFailed {
        url: String,
        status: u16,
        status_text: String,
    },

    /// The response body could not be streamed to the end.
    #[error("response body for {0} is not readable")]
    NotReadable(String),

    /// Transport failure before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The blob store failed on an operation that cannot be skipped.
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    /// Internal / unexpected error (e.g. a join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for CacheError {
    fn from(e: reqwest::Error) -> Self {
        CacheError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ModelSource trait
// ---------------------------------------------------------------------------

/// Body of a response, delivered in arbitrary-sized pieces.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, CacheError>>;

/// An opened response.
pub struct SourceResponse {
    pub status: u16,
    pub status_text: String,
    /// Total body length when the server announced it.
    pub content_length: Option<u64>,
    /// `None` when the body cannot be read.
    pub body: Option<ByteStream>,
}

impl std::fmt::Debug for SourceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("content_length", &self.content_length)
            .field("readable", &self.body.is_some())
            .finish()
    }
}

impl SourceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Opens a URL for reading.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ModelSource>`).
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<SourceResponse, CacheError>;
}

// ---------------------------------------------------------------------------
// HttpModelSource
// ---------------------------------------------------------------------------

/// Fetches models over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpModelSource {
    client: reqwest::Client,
}

impl HttpModelSource {
    /// A client with a connect timeout but no overall deadline; large models
    /// take minutes to download.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpModelSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelSource for HttpModelSource {
    async fn open(&self, url: &str) -> Result<SourceResponse, CacheError> {
        log::debug!("cache: GET {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(CacheError::from))
            .boxed();

        Ok(SourceResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            content_length,
            body: Some(body),
        })
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// A source serving canned responses from memory.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone)]
    pub enum Canned {
        Body {
            pieces: Vec<Vec<u8>>,
            announce_length: bool,
        },
        Status(u16, &'static str),
        Unreadable,
        /// Serves `pieces`, then fails the body stream with `error`.
        Broken {
            pieces: Vec<Vec<u8>>,
            error: &'static str,
        },
    }

    #[derive(Default)]
    pub struct MemorySource {
        responses: Mutex<HashMap<String, Canned>>,
        opens: AtomicUsize,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(self, url: &str, canned: Canned) -> Self {
            self.responses.lock().unwrap().insert(url.to_string(), canned);
            self
        }

        pub fn serve_bytes(self, url: &str, pieces: Vec<Vec<u8>>) -> Self {
            self.serve(
                url,
                Canned::Body {
                    pieces,
                    announce_length: true,
                },
            )
        }

        /// Number of times `open` was called.
        pub fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelSource for MemorySource {
        async fn open(&self, url: &str) -> Result<SourceResponse, CacheError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let canned = self
                .responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or(Canned::Status(404, "Not Found"));

            Ok(match canned {
                Canned::Body {
                    pieces,
                    announce_length,
                } => {
                    let total: usize = pieces.iter().map(Vec::len).sum();
                    SourceResponse {
                        status: 200,
                        status_text: "OK".into(),
                        content_length: announce_length.then_some(total as u64),
                        body: Some(futures_util::stream::iter(pieces.into_iter().map(Ok)).boxed()),
                    }
                }
                Canned::Status(status, text) => SourceResponse {
                    status,
                    status_text: text.into(),
                    content_length: None,
                    body: Some(futures_util::stream::empty().boxed()),
                },
                Canned::Broken { pieces, error } => {
                    let failure = CacheError::Request(error.to_string());
                    let items = pieces.into_iter().map(Ok).chain(std::iter::once(Err(failure)));
                    SourceResponse {
                        status: 200,
                        status_text: "OK".into(),
                        content_length: None,
                        body: Some(futures_util::stream::iter(items).boxed()),
                    }
                }
                Canned::Unreadable => SourceResponse {
                    status: 200,
                    status_text: "OK".into(),
                    content_length: None,
                    body: None,
                },
            })
        }
    }
}
