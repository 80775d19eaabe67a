//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\whisper-stream\
//!   macOS:   ~/Library/Application Support/whisper-stream/
//!   Linux:   ~/.config/whisper-stream/
//!
//! Cache dir (model blobs, engine staging):
//!   Windows: %LOCALAPPDATA%\whisper-stream\
//!   macOS:   ~/Library/Caches/whisper-stream/
//!   Linux:   ~/.cache/whisper-stream/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Root of the model blob store.
    pub cache_dir: PathBuf,
    /// Directory the engine stages its model file in.
    pub staging_dir: PathBuf,
}

impl AppPaths {
    pub const APP_NAME: &'static str = "whisper-stream";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            cache_dir: cache_root.join("models"),
            staging_dir: cache_root.join("staging"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
