use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "whisper-stream", about = "Stream whisper transcripts for long audio files")]
pub struct CliArgs {
    /// 16 kHz mono WAV file to transcribe
    pub input: Option<PathBuf>,

    /// Catalog model id (overrides settings.toml)
    #[arg(long)]
    pub model: Option<String>,

    /// Load the model from this URL instead of the catalog
    #[arg(long, conflicts_with = "model")]
    pub model_url: Option<String>,

    /// Language code, or "auto"
    #[arg(long)]
    pub language: Option<String>,

    /// Translate to English
    #[arg(long)]
    pub translate: bool,

    /// Do not read or write the model cache
    #[arg(long)]
    pub no_cache: bool,

    /// List catalog models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Empty the model cache and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Alternate settings file
    #[arg(long)]
    pub config: Option<PathBuf>,
}
