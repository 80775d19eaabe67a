//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files. Every section is
//! `#[serde(default)]`, so a partial `settings.toml` fills the gaps with
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::session::SessionOptions;
use crate::stt::{AdapterConfig, TranscribeOptions};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings for the whisper engine and how audio is fed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Catalog id of the model to load (see [`crate::stt::MODELS`]).
    pub model: String,
    /// Sample rate of the input audio in Hz. Whisper expects 16 000.
    pub sample_rate: u32,
    /// Length of one chunk handed to the engine, in seconds.
    pub max_chunk_secs: u32,
    /// Recommended maximum audio per engine call. The engine timeout is
    /// twice this.
    pub max_transcribe_secs: u64,
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    pub threads: i32,
    pub translate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "base.en".into(),
            sample_rate: 16_000,
            max_chunk_secs: 100,
            max_transcribe_secs: 120,
            language: "auto".into(),
            threads: 4,
            translate: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeout and recovery policy for streaming sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_ms: u64,
    pub sleep_ms_between_chunks: Option<u64>,
    pub restart_model_on_error: bool,
    pub max_restarts_per_chunk: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            sleep_ms_between_chunks: None,
            restart_model_on_error: true,
            max_restarts_per_chunk: Some(3),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Model cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist downloaded models and reuse them.
    pub enabled: bool,
    /// Override for the blob store directory. `None` uses
    /// [`AppPaths::cache_dir`].
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use whisper_stream::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived runtime settings
    // -----------------------------------------------------------------------

    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig::with_max_transcribe_secs(self.engine.max_transcribe_secs)
    }

    pub fn transcribe_options(&self) -> TranscribeOptions {
        TranscribeOptions {
            language: self.engine.language.clone(),
            threads: self.engine.threads,
            translate: self.engine.translate,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            transcribe: self.transcribe_options(),
            timeout_ms: self.session.timeout_ms,
            sleep_ms_between_chunks: self.session.sleep_ms_between_chunks,
            restart_model_on_error: self.session.restart_model_on_error,
            max_restarts_per_chunk: self.session.max_restarts_per_chunk,
        }
    }

    /// Samples per chunk; at least one.
    pub fn max_chunk_samples(&self) -> usize {
        (self.engine.sample_rate as usize * self.engine.max_chunk_secs as usize).max(1)
    }

    /// Blob store directory: the configured override or the platform default.
    pub fn cache_dir(&self, paths: &AppPaths) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| paths.cache_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
