//! whisper-stream command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments and load [`AppConfig`] (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Fetch the model through the [`ModelCache`] (cached after first use).
//! 5. Load it into an [`EngineAdapter`] on the blocking pool.
//! 6. Stream the WAV file through a [`TranscriptionSession`], printing one cue
//!    line per segment. Ctrl-C stops after the current chunk.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use whisper_stream::{
    audio::load_wav,
    cache::ModelCache,
    cli::CliArgs,
    config::{AppConfig, AppPaths},
    session::{SessionOutcome, TranscriptionSession},
    stt::{render_cue_line, EngineAdapter, WhisperRsBackend},
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn list_models(cache: &ModelCache) {
    for model in cache.available_models().await {
        let d = model.descriptor;
        println!(
            "{:<16} {:<28} {:>5} MB  {:<5} {}",
            d.id,
            d.name,
            d.size_mb,
            d.language.code(),
            if model.cached { "cached" } else { "" }
        );
    }
}

/// Download-progress logger that reports every 10 %.
fn progress_logger(label: String) -> impl FnMut(f64) + Send {
    let mut last_decile = -1i64;
    move |fraction| {
        let decile = (fraction * 10.0).floor() as i64;
        if decile != last_decile {
            last_decile = decile;
            log::info!("{label}: {:.0}%", fraction * 100.0);
        }
    }
}

async fn transcribe(args: &CliArgs, config: &AppConfig, paths: &AppPaths, cache: &ModelCache) -> Result<()> {
    let input = args
        .input
        .as_ref()
        .context("no input file given (see --help)")?;
    let audio = load_wav(input, config.engine.sample_rate)?;

    // ── 1. Model bytes ───────────────────────────────────────────────────
    let model = match &args.model_url {
        Some(url) => cache.load_by_url(url, progress_logger(url.clone())).await?,
        None => {
            let id = &config.engine.model;
            cache.load(id, true, progress_logger(format!("model {id}"))).await?
        }
    };

    // ── 2. Engine ────────────────────────────────────────────────────────
    let adapter = Arc::new(EngineAdapter::new(
        WhisperRsBackend::new(&paths.staging_dir),
        config.adapter_config(),
    ));
    {
        let adapter = Arc::clone(&adapter);
        tokio::task::spawn_blocking(move || adapter.load_model(model))
            .await
            .context("model load task panicked")??;
    }

    // ── 3. Stream ────────────────────────────────────────────────────────
    let session = TranscriptionSession::new(Arc::clone(&adapter))
        .with_chunking(config.engine.sample_rate, config.max_chunk_samples());
    let mut stream = session.streaming(audio, config.session_options());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut interrupted = false;
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(segment)) => println!("{}", render_cue_line(&segment)),
                Some(Err(e)) => log::error!("transcription failed: {e}"),
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                log::warn!("interrupted; finishing the current chunk");
                interrupted = true;
                break;
            }
        }
    }

    let summary = stream.cancel().await?;
    log::info!(
        "{} chunk(s), {} segment(s), {} restart(s), {:.1}s transcribed",
        summary.chunks_completed,
        summary.segments_delivered,
        summary.restarts,
        summary.offset_ms as f64 / 1_000.0
    );

    match summary.outcome {
        SessionOutcome::Failed(e) => Err(e.into()),
        SessionOutcome::Completed | SessionOutcome::Cancelled => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments + configuration
    let args = CliArgs::parse();
    let paths = AppPaths::new();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };
    if let Some(model) = &args.model {
        config.engine.model = model.clone();
    }
    if let Some(language) = &args.language {
        config.engine.language = language.clone();
    }
    if args.translate {
        config.engine.translate = true;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async {
        let cache = ModelCache::from_config(&config, &paths);

        if args.list_models {
            list_models(&cache).await;
            return Ok(());
        }
        if args.clear_cache {
            cache.clear_cache().await?;
            println!("model cache cleared");
            return Ok(());
        }

        transcribe(&args, &config, &paths, &cache).await
    })
}
