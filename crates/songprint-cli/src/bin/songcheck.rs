//! songcheck - Check an audio file against the song catalog
//!
//! Usage:
//!   songcheck <audio_path>                     # Uses songprint.toml if present
//!   songcheck --config <path> <audio_path>
//!   songcheck --no-store <audio_path>          # Evaluate only
//!
//! Prints the decision record as JSON on stdout; failures print
//! `{"error": ..., "kind": ...}` and exit with status 1.

use clap::Parser;
use songprint_cli::output::{exit_with_error, print_json, ErrorPayload};
use songprint_core::{open_store, Coordinator, DecisionOutcome, SongprintConfig};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "songcheck")]
#[command(about = "Detect whether an audio file duplicates a catalogued song", long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Defaults to songprint.toml, then built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluate without adding the song to the catalog
    #[arg(long)]
    no_store: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Audio file to check
    audio_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the JSON result
    let level = if args.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(&args).await {
        Ok(outcome) => print_json(&outcome),
        Err(e) => exit_with_error(ErrorPayload::from(&e)),
    }
}

async fn run(args: &Args) -> songprint_core::Result<DecisionOutcome> {
    let mut config = SongprintConfig::load_or_default(args.config.as_deref())?;
    config.apply_env_overrides()?;
    if let Some(conn) = config.connection_string() {
        log::info!("Catalog: {}", conn);
    }

    let audio_path: &Path = &args.audio_path;
    log::info!("Checking {}", audio_path.display());

    let store = open_store(&config.storage).await?;
    let mut coordinator = Coordinator::new(store, &config);
    if args.no_store {
        coordinator = coordinator.without_persistence();
    }

    coordinator.process(audio_path).await
}
