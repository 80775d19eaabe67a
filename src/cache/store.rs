//! Persistent key/value blob storage with two independent namespaces.
//!
//! # On-disk layout ([`FsBlobStore`])
//!
//! ```text
//! <root>/
//!   models/
//!     <sha256(key)>.bin     payload
//!     <sha256(key)>.json    {"key": "...", "size_bytes": N, "timestamp_ms": T}
//!   models_by_url/
//!     ...
//! ```
//!
//! Payloads and sidecars are written to a `.partial` file first and renamed
//! into place. An entry exists once its sidecar exists.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The two independent key spaces of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Keyed by catalog model id.
    Models,
    /// Keyed by source URL.
    Urls,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Models, Namespace::Urls];

    fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Models => "models",
            Namespace::Urls => "models_by_url",
        }
    }
}

/// Everything about an entry except its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub size_bytes: u64,
    /// Milliseconds since the Unix epoch at write time.
    pub timestamp_ms: u64,
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub data: Vec<u8>,
    pub size_bytes: u64,
    pub timestamp_ms: u64,
}

impl CacheEntry {
    fn new(key: &str, data: Vec<u8>) -> Self {
        Self {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            data,
            timestamp_ms: now_ms(),
        }
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            size_bytes: self.size_bytes,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt entry metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// BlobStore trait
// ---------------------------------------------------------------------------

/// Key/value contract the model cache persists through.
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait BlobStore: Send + Sync + 'static {
    /// Fetch an entry, `None` if the key is absent.
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Store `data` under `key`, replacing any existing entry.
    fn put(&self, namespace: Namespace, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Metadata of every entry, oldest first.
    fn list(&self, namespace: Namespace) -> Result<Vec<EntryMeta>, StoreError>;

    /// Metadata of every entry, smallest first.
    fn list_by_size(&self, namespace: Namespace) -> Result<Vec<EntryMeta>, StoreError> {
        let mut entries = self.list(namespace)?;
        entries.sort_by(|a, b| a.size_bytes.cmp(&b.size_bytes).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Remove every entry in `namespace`.
    fn clear(&self, namespace: Namespace) -> Result<(), StoreError>;
}

// Compile-time assertion: Box<dyn BlobStore> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn BlobStore>) {}
};

fn sort_by_timestamp(entries: &mut [EntryMeta]) {
    entries.sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then_with(|| a.key.cmp(&b.key)));
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Store rooted at `root`. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    fn entry_paths(&self, namespace: Namespace, key: &str) -> (PathBuf, PathBuf) {
        let stem = hex_digest(key);
        let dir = self.namespace_dir(namespace);
        (dir.join(format!("{stem}.bin")), dir.join(format!("{stem}.json")))
    }
}

fn hex_digest(key: &str) -> String {
    Sha256::digest(key.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Write `data` to `path` via a sibling `.partial` file.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    std::fs::write(&partial, data)?;
    std::fs::rename(&partial, path)
}

fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let (data_path, meta_path) = self.entry_paths(namespace, key);

        let Some(meta_bytes) = read_optional(&meta_path)? else {
            return Ok(None);
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_bytes)?;
        if meta.key != key {
            log::warn!("cache: digest collision or stale sidecar for {key:?}");
            return Ok(None);
        }

        let Some(data) = read_optional(&data_path)? else {
            log::warn!("cache: sidecar without payload for {key:?}");
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: meta.key,
            size_bytes: data.len() as u64,
            data,
            timestamp_ms: meta.timestamp_ms,
        }))
    }

    fn put(&self, namespace: Namespace, key: &str, data: &[u8]) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.namespace_dir(namespace))?;
        let (data_path, meta_path) = self.entry_paths(namespace, key);

        let meta = EntryMeta {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            timestamp_ms: now_ms(),
        };

        // Payload first: the sidecar is what makes the entry visible.
        write_atomic(&data_path, data)?;
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?)?;
        log::debug!("cache: stored {key:?} ({} bytes) in {}", data.len(), namespace.dir_name());
        Ok(())
    }

    fn list(&self, namespace: Namespace) -> Result<Vec<EntryMeta>, StoreError> {
        let dir = self.namespace_dir(namespace);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let path = item?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let bytes = std::fs::read(&path)?;
                entries.push(serde_json::from_slice::<EntryMeta>(&bytes)?);
            }
        }
        sort_by_timestamp(&mut entries);
        Ok(entries)
    }

    fn clear(&self, namespace: Namespace) -> Result<(), StoreError> {
        match std::fs::remove_dir_all(self.namespace_dir(namespace)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-process store; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<(Namespace, String), CacheEntry>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Namespace, String), CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.lock().get(&(namespace, key.to_string())).cloned())
    }

    fn put(&self, namespace: Namespace, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.lock()
            .insert((namespace, key.to_string()), CacheEntry::new(key, data.to_vec()));
        Ok(())
    }

    fn list(&self, namespace: Namespace) -> Result<Vec<EntryMeta>, StoreError> {
        let mut entries: Vec<EntryMeta> = self
            .lock()
            .iter()
            .filter(|((ns, _), _)| *ns == namespace)
            .map(|(_, entry)| entry.meta())
            .collect();
        sort_by_timestamp(&mut entries);
        Ok(entries)
    }

    fn clear(&self, namespace: Namespace) -> Result<(), StoreError> {
        self.lock().retain(|(ns, _), _| *ns != namespace);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
