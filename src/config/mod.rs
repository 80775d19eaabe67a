//! Configuration module for whisper-stream.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the engine,
//! sessions and the model cache, `AppPaths` for cross-platform directories,
//! and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, CacheConfig, EngineConfig, SessionConfig};
