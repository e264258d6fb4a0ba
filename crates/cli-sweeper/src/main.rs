//! CLI entry point for hevc-sweep
//!
//! Parses command line arguments, resolves configuration (defaults <
//! config.toml < environment < flags), installs the interrupt handler, and
//! runs the sweep.

use clap::Parser;
use hevc_sweep::pipeline::{self, TaskContext};
use hevc_sweep::{
    effective_limit, new_shared_stats, run_startup_checks, EncoderSettings, FileCandidate,
    LastLock, Walker,
};
use hevc_sweep_config::{Config, ConfigError};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// hevc-sweep - batch-convert a directory tree of videos to HEVC/MP4
#[derive(Parser, Debug)]
#[command(name = "hevc-sweep")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory to sweep
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Path to the configuration file (a missing file means defaults)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Visit directory entries in reverse lexicographic order
    #[arg(short, long)]
    reverse: bool,

    /// Re-encode audio to AAC even when it could be stream-copied
    #[arg(long)]
    force_audio_reencode: bool,

    /// x265 preset
    #[arg(long)]
    preset: Option<String>,

    /// Quality factor (CRF)
    #[arg(long)]
    crf: Option<u8>,

    /// Cap output height in pixels (scales down larger sources)
    #[arg(long)]
    max_height: Option<u32>,

    /// Concurrent conversions per chunk (1-10, 0 = auto from cores)
    #[arg(short = 'j', long)]
    concurrency: Option<u32>,

    /// Echo full encoder command lines
    #[arg(short, long)]
    verbose: bool,

    /// Write the final run statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Skip startup checks (ffmpeg, ffprobe). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

/// Resolves the effective configuration: defaults < file < env < CLI flags.
fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(preset) = &args.preset {
        config.encoder.preset = preset.clone();
    }
    if let Some(crf) = args.crf {
        config.encoder.crf = crf;
    }
    if let Some(max_height) = args.max_height {
        config.encoder.max_height = max_height;
    }
    if args.force_audio_reencode {
        config.encoder.force_audio_reencode = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    if args.reverse {
        config.run.reverse = true;
    }
    if args.verbose {
        config.run.verbose = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(LevelFilter::Info);
    }
    builder.init();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.skip_checks {
        info!("WARNING: skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks() {
        error!("startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    let root = match args.root.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            error!("cannot resolve root {}: {}", args.root.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let limit = effective_limit(config.run.concurrency);
    info!(
        "sweeping {} with {} concurrent conversion(s)",
        root.display(),
        limit
    );

    let last_lock = LastLock::new();
    {
        // On interrupt, release the most recently acquired lock and exit;
        // in-flight encoders die with the process and their partial outputs
        // are re-evaluated by the next run.
        let last_lock = last_lock.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                last_lock.release_last();
                std::process::exit(130);
            }
        });
    }

    let ctx = Arc::new(TaskContext {
        settings: EncoderSettings {
            preset: config.encoder.preset.clone(),
            crf: config.encoder.crf,
            max_height: config.encoder.max_height,
            verbose: config.run.verbose,
        },
        force_audio_reencode: config.encoder.force_audio_reencode,
        stats: new_shared_stats(),
        last_lock,
    });

    let worker = {
        let ctx = ctx.clone();
        move |candidate: FileCandidate| {
            let ctx = ctx.clone();
            async move {
                let _ = pipeline::process_file(&ctx, candidate).await;
            }
        }
    };
    let walker = Walker::new(worker, limit, config.run.reverse);

    if let Err(e) = walker.walk(&root).await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let snapshot = ctx.stats.snapshot();
    info!(
        "sweep complete: {} converted, {} skipped, {} failed; {:.2}MB in -> {:.2}MB out ({:.1}% saved)",
        snapshot.converted_files,
        snapshot.skipped_files,
        snapshot.failed_files,
        snapshot.total_input_bytes as f64 / 1024.0 / 1024.0,
        snapshot.total_output_bytes as f64 / 1024.0 / 1024.0,
        snapshot.percent_saved
    );

    if let Some(path) = &args.stats_json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    error!("failed to write stats to {}: {}", path.display(), e);
                }
            }
            Err(e) => error!("failed to serialize stats: {}", e),
        }
    }

    ExitCode::SUCCESS
}
