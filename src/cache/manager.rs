//! Model cache: fetch model bytes once, serve them from disk afterwards.
//!
//! # Flow
//!
//! ```text
//! load(id) ──▶ store.get(Models, id) ── hit ──▶ progress 1.0 ──▶ bytes
//!                     │ miss
//!                     ▼
//!              source.open(catalog url) ── stream body, progress ──▶ bytes
//!                     │
//!                     └─▶ store.put(Models, id)   (best effort)
//! ```
//!
//! `load_by_url` follows the same flow keyed by URL in the
//! [`Namespace::Urls`] namespace. Store reads and writes run on tokio's
//! blocking pool; a failed read is a miss and a failed write is logged and
//! ignored.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;

use super::source::{CacheError, HttpModelSource, ModelSource};
use super::store::{BlobStore, FsBlobStore, Namespace};
use crate::config::{AppConfig, AppPaths};
use crate::stt::{find_model, ModelDescriptor, MODELS};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of the `Models` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheInfo {
    pub count: usize,
    pub total_size_bytes: u64,
}

/// A catalog entry plus whether it is already cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableModel {
    #[serde(flatten)]
    pub descriptor: &'static ModelDescriptor,
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// ModelCache
// ---------------------------------------------------------------------------

/// Fetches and persists model bytes.
///
/// ```rust,no_run
/// use whisper_stream::cache::ModelCache;
/// use whisper_stream::config::{AppConfig, AppPaths};
///
/// # async fn run() -> Result<(), whisper_stream::cache::CacheError> {
/// let cache = ModelCache::from_config(&AppConfig::default(), &AppPaths::new());
/// let bytes = cache
///     .load("base.en", true, |p| println!("{:.0}%", p * 100.0))
///     .await?;
/// println!("{} bytes", bytes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ModelCache {
    source: Arc<dyn ModelSource>,
    store: Arc<dyn BlobStore>,
    cache_enabled: bool,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    pub fn new(source: Arc<dyn ModelSource>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            source,
            store,
            cache_enabled: true,
        }
    }

    /// HTTP source and an on-disk store at the configured cache directory.
    pub fn from_config(config: &AppConfig, paths: &AppPaths) -> Self {
        let store = FsBlobStore::new(config.cache_dir(paths));
        log::debug!("cache: blob store at {}", store.root().display());
        Self::new(Arc::new(HttpModelSource::new()), Arc::new(store))
            .with_cache_enabled(config.cache.enabled)
    }

    /// When disabled, nothing is read from or written to the store.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Bytes of catalog model `model_id`.
    ///
    /// `on_progress` receives fractions in `[0, 1]` while downloading, and
    /// always `1.0` last. With `use_cache`, a cached copy is returned without
    /// touching the network and a fresh download is stored.
    pub async fn load<F>(&self, model_id: &str, use_cache: bool, on_progress: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnMut(f64) + Send,
    {
        let descriptor =
            find_model(model_id).ok_or_else(|| CacheError::ModelNotFound(model_id.to_string()))?;
        self.load_keyed(
            Namespace::Models,
            model_id,
            descriptor.url,
            use_cache && self.cache_enabled,
            on_progress,
        )
        .await
    }

    /// Bytes at `url`, cached by URL.
    pub async fn load_by_url<F>(&self, url: &str, on_progress: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnMut(f64) + Send,
    {
        self.load_keyed(Namespace::Urls, url, url, self.cache_enabled, on_progress)
            .await
    }

    async fn load_keyed<F>(
        &self,
        namespace: Namespace,
        key: &str,
        url: &str,
        use_cache: bool,
        mut on_progress: F,
    ) -> Result<Vec<u8>, CacheError>
    where
        F: FnMut(f64) + Send,
    {
        if use_cache {
            if let Some(data) = self.read_cached(namespace, key).await {
                log::info!("cache: hit for {key:?} ({} bytes)", data.len());
                on_progress(1.0);
                return Ok(data);
            }
        }

        let mut data = self.fetch(url, &mut on_progress).await?;

        if use_cache {
            data = self.write_cached(namespace, key, data).await?;
        }

        on_progress(1.0);
        Ok(data)
    }

    async fn fetch<F>(&self, url: &str, on_progress: &mut F) -> Result<Vec<u8>, CacheError>
    where
        F: FnMut(f64) + Send,
    {
        log::info!("cache: downloading {url}");
        let response = self.source.open(url).await?;

        if !response.is_success() {
            log::error!("cache: {url} answered {} {}", response.status, response.status_text);
            return Err(CacheError::FetchFailed {
                url: url.to_string(),
                status: response.status,
                status_text: response.status_text,
            });
        }

        let total = response.content_length.filter(|n| *n > 0);
        let mut body = response
            .body
            .ok_or_else(|| CacheError::NotReadable(url.to_string()))?;

        let mut data = Vec::new();
        while let Some(piece) = body.next().await {
            let piece = piece.map_err(|e| {
                log::error!("cache: body of {url} failed after {} bytes: {e}", data.len());
                CacheError::NotReadable(url.to_string())
            })?;
            data.extend_from_slice(&piece);
            if let Some(total) = total {
                on_progress((data.len() as f64 / total as f64).min(1.0));
            }
        }

        log::info!("cache: downloaded {} bytes from {url}", data.len());
        Ok(data)
    }

    /// A non-empty cached payload, or `None`.
    async fn read_cached(&self, namespace: Namespace, key: &str) -> Option<Vec<u8>> {
        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let result = tokio::task::spawn_blocking(move || store.get(namespace, &owned_key)).await;

        match result {
            Ok(Ok(Some(entry))) if !entry.data.is_empty() => Some(entry.data),
            Ok(Ok(Some(_))) => {
                log::warn!("cache: empty payload for {key:?}; treating as a miss");
                None
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                log::error!("cache: read of {key:?} failed: {e}");
                None
            }
            Err(e) => {
                log::error!("cache: read task for {key:?} failed: {e}");
                None
            }
        }
    }

    /// Persist `data`, handing it back whether or not the write succeeded.
    async fn write_cached(&self, namespace: Namespace, key: &str, data: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let (data, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = store.put(namespace, &owned_key, &data);
            (data, outcome)
        })
        .await
        .map_err(|e| CacheError::Internal(format!("store task for {key:?}: {e}")))?;

        if let Err(e) = outcome {
            log::error!("cache: failed to store {key:?}: {e}");
        }
        Ok(data)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Remove every cached entry from both namespaces.
    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            for namespace in Namespace::ALL {
                store.clear(namespace)?;
            }
            Ok::<_, CacheError>(())
        })
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))??;
        log::info!("cache: cleared");
        Ok(())
    }

    /// Entry count and total size of the `Models` namespace.
    pub async fn cache_info(&self) -> Result<CacheInfo, CacheError> {
        let store = Arc::clone(&self.store);
        let entries = tokio::task::spawn_blocking(move || store.list(Namespace::Models))
            .await
            .map_err(|e| CacheError::Internal(e.to_string()))??;

        Ok(CacheInfo {
            count: entries.len(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        })
    }

    /// The whole catalog, flagging models already in the `Models` namespace.
    ///
    /// A store that cannot be listed reports every model as not cached.
    pub async fn available_models(&self) -> Vec<AvailableModel> {
        let store = Arc::clone(&self.store);
        let cached: Vec<String> = match tokio::task::spawn_blocking(move || store.list(Namespace::Models)).await {
            Ok(Ok(entries)) => entries.into_iter().filter(|e| e.size_bytes > 0).map(|e| e.key).collect(),
            Ok(Err(e)) => {
                log::error!("cache: listing models failed: {e}");
                Vec::new()
            }
            Err(e) => {
                log::error!("cache: listing task failed: {e}");
                Vec::new()
            }
        };

        MODELS
            .iter()
            .map(|descriptor| AvailableModel {
                descriptor,
                cached: self.cache_enabled && cached.iter().any(|k| k == descriptor.id),
            })
            .collect()
    }

    /// Catalog lookup.
    pub fn model_descriptor(&self, model_id: &str) -> Option<&'static ModelDescriptor> {
        find_model(model_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::cache::source::testing::{Canned, MemorySource};
    use crate::cache::store::{CacheEntry, EntryMeta, MemoryBlobStore, StoreError};

    const TINY_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.en.bin";

    fn cache_with(source: MemorySource) -> (ModelCache, Arc<MemorySource>, Arc<MemoryBlobStore>) {
        let source = Arc::new(source);
        let store = Arc::new(MemoryBlobStore::new());
        let cache = ModelCache::new(source.clone(), store.clone());
        (cache, source, store)
    }

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, impl FnMut(f64) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p| sink.lock().unwrap().push(p))
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let (cache, source, _) = cache_with(MemorySource::new().serve_bytes(TINY_URL, vec![b"ggml".to_vec()]));

        let first = cache.load("tiny.en", true, |_| {}).await.unwrap();
        let (progress, on_progress) = recorder();
        let second = cache.load("tiny.en", true, on_progress).await.unwrap();

        assert_eq!(first, b"ggml");
        assert_eq!(second, first);
        assert_eq!(source.opens(), 1);
        assert_eq!(*progress.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn progress_tracks_received_bytes() {
        let (cache, _, _) = cache_with(
            MemorySource::new().serve_bytes(TINY_URL, vec![vec![0; 4], vec![0; 4], vec![0; 2]]),
        );
        let (progress, on_progress) = recorder();
        cache.load("tiny.en", false, on_progress).await.unwrap();
        assert_eq!(*progress.lock().unwrap(), vec![0.4, 0.8, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn unknown_length_reports_only_completion() {
        let (cache, _, _) = cache_with(MemorySource::new().serve(
            TINY_URL,
            Canned::Body {
                pieces: vec![vec![1; 3], vec![2; 3]],
                announce_length: false,
            },
        ));
        let (progress, on_progress) = recorder();
        let bytes = cache.load("tiny.en", true, on_progress).await.unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(*progress.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn use_cache_false_neither_reads_nor_writes() {
        let (cache, source, store) = cache_with(MemorySource::new().serve_bytes(TINY_URL, vec![b"x".to_vec()]));
        cache.load("tiny.en", false, |_| {}).await.unwrap();
        cache.load("tiny.en", false, |_| {}).await.unwrap();
        assert_eq!(source.opens(), 2);
        assert!(store.list(Namespace::Models).unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_ignores_use_cache() {
        let (cache, source, _) = cache_with(MemorySource::new().serve_bytes(TINY_URL, vec![b"x".to_vec()]));
        let cache = cache.with_cache_enabled(false);
        cache.load("tiny.en", true, |_| {}).await.unwrap();
        cache.load("tiny.en", true, |_| {}).await.unwrap();
        assert_eq!(source.opens(), 2);
    }

    #[tokio::test]
    async fn id_and_url_namespaces_do_not_share_entries() {
        let (cache, source, store) = cache_with(MemorySource::new().serve_bytes(TINY_URL, vec![b"m".to_vec()]));

        cache.load("tiny.en", true, |_| {}).await.unwrap();
        cache.load_by_url(TINY_URL, |_| {}).await.unwrap();
        assert_eq!(source.opens(), 2);

        cache.load_by_url(TINY_URL, |_| {}).await.unwrap();
        assert_eq!(source.opens(), 2);
        assert!(store.get(Namespace::Urls, TINY_URL).unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_model_never_touches_the_network() {
        let (cache, source, _) = cache_with(MemorySource::new());
        let err = cache.load("gigantic", true, |_| {}).await.unwrap_err();
        assert!(matches!(err, CacheError::ModelNotFound(id) if id == "gigantic"));
        assert_eq!(source.opens(), 0);
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_failed() {
        let (cache, _, store) = cache_with(MemorySource::new().serve(TINY_URL, Canned::Status(503, "Service Unavailable")));
        let err = cache.load("tiny.en", true, |_| {}).await.unwrap_err();
        match err {
            CacheError::FetchFailed { status, status_text, url } => {
                assert_eq!(status, 503);
                assert_eq!(status_text, "Service Unavailable");
                assert_eq!(url, TINY_URL);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.list(Namespace::Models).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_body_is_not_readable() {
        let (cache, _, _) = cache_with(MemorySource::new().serve(TINY_URL, Canned::Unreadable));
        let err = cache.load("tiny.en", true, |_| {}).await.unwrap_err();
        assert!(matches!(err, CacheError::NotReadable(_)));
    }

    #[tokio::test]
    async fn body_failing_mid_download_is_not_readable_and_not_cached() {
        let url = "https://example.com/models/custom.bin";
        let (cache, _, store) = cache_with(MemorySource::new().serve(
            url,
            Canned::Broken {
                pieces: vec![vec![1, 2]],
                error: "connection reset",
            },
        ));
        let (progress, on_progress) = recorder();

        let err = cache.load_by_url(url, on_progress).await.unwrap_err();
        assert!(matches!(err, CacheError::NotReadable(ref u) if u == url));
        assert!(store.get(Namespace::Urls, url).unwrap().is_none());
        assert!(progress.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_cached_payload_is_a_miss() {
        let (cache, source, store) = cache_with(MemorySource::new().serve_bytes(TINY_URL, vec![b"fresh".to_vec()]));
        store.put(Namespace::Models, "tiny.en", b"").unwrap();

        let bytes = cache.load("tiny.en", true, |_| {}).await.unwrap();
        assert_eq!(bytes, b"fresh");
        assert_eq!(source.opens(), 1);
    }

    /// Reads always miss and writes always fail.
    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn get(&self, _: Namespace, _: &str) -> Result<Option<CacheEntry>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn put(&self, _: Namespace, _: &str, _: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        fn list(&self, _: Namespace) -> Result<Vec<EntryMeta>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn clear(&self, _: Namespace) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
    }

    #[tokio::test]
    async fn store_failures_do_not_fail_loads() {
        let source = Arc::new(MemorySource::new().serve_bytes(TINY_URL, vec![b"ok".to_vec()]));
        let cache = ModelCache::new(source.clone(), Arc::new(BrokenStore));

        assert_eq!(cache.load("tiny.en", true, |_| {}).await.unwrap(), b"ok");
        assert_eq!(source.opens(), 1);
        assert!(cache.available_models().await.iter().all(|m| !m.cached));
        assert!(matches!(cache.clear_cache().await, Err(CacheError::Store(_))));
    }

    #[tokio::test]
    async fn cache_info_counts_models_namespace_only() {
        let (cache, _, store) = cache_with(MemorySource::new());
        store.put(Namespace::Models, "tiny.en", &[0; 10]).unwrap();
        store.put(Namespace::Models, "base.en", &[0; 5]).unwrap();
        store.put(Namespace::Urls, TINY_URL, &[0; 100]).unwrap();

        let info = cache.cache_info().await.unwrap();
        assert_eq!(info, CacheInfo { count: 2, total_size_bytes: 15 });

        cache.clear_cache().await.unwrap();
        assert_eq!(cache.cache_info().await.unwrap(), CacheInfo::default());
        assert!(store.list(Namespace::Urls).unwrap().is_empty());
    }

    #[tokio::test]
    async fn available_models_flags_cached_entries() {
        let (cache, _, store) = cache_with(MemorySource::new());
        store.put(Namespace::Models, "base", b"weights").unwrap();

        let models = cache.available_models().await;
        assert_eq!(models.len(), MODELS.len());
        let cached: Vec<&str> = models.iter().filter(|m| m.cached).map(|m| m.descriptor.id).collect();
        assert_eq!(cached, vec!["base"]);
        assert_eq!(cache.model_descriptor("base").unwrap().size_mb, 142);
    }
}
