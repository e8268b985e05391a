//! Migration tool for transferring a filesystem catalog to PostgreSQL
//!
//! Usage:
//!   songmigrate --source-dir ./catalog --dest-config songprint.postgresql.toml
//!   songmigrate --source-dir ./catalog --dest-config songprint.postgresql.toml --dry-run
//!
//! Entries are copied in catalog order so the destination preserves the
//! source's scan order.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use songprint_cli::output::{exit_with_error, print_json, ErrorPayload};
use songprint_core::matching::decode_entry;
use songprint_core::storage_config::{FileFormat, StorageBackend as BackendType};
use songprint_core::{
    CatalogStore, FilesystemCatalog, NewCatalogEntry, PostgresCatalog, SongprintConfig,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "songmigrate")]
#[command(about = "Migrate a filesystem song catalog to PostgreSQL", long_about = None)]
struct Args {
    /// Source directory containing catalog entry files (JSON/BSON)
    #[arg(long)]
    source_dir: PathBuf,

    /// Destination configuration file (PostgreSQL backend)
    #[arg(long)]
    dest_config: PathBuf,

    /// Show what would be migrated without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Copy entries even if a song with the same name already exists
    #[arg(long)]
    allow_duplicates: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Serialize)]
struct MigrationSummary {
    total: usize,
    migrated: usize,
    skipped: usize,
    failed: usize,
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&args).await {
        Ok(summary) => {
            print_json(&summary);
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => exit_with_error(ErrorPayload::from(&e)),
    }
}

async fn run(args: &Args) -> Result<MigrationSummary> {
    log::info!("🚀 Starting catalog migration");

    if !args.source_dir.is_dir() {
        anyhow::bail!("Source directory not found: {}", args.source_dir.display());
    }
    log::info!("📂 Source: {}", args.source_dir.display());
    let source = FilesystemCatalog::from_path(&args.source_dir, FileFormat::Json);

    let dest = if args.dry_run {
        None
    } else {
        Some(create_dest(&args.dest_config).await?)
    };

    let entries = source
        .list_all()
        .await
        .context("Failed to load source catalog")?;

    let mut summary = MigrationSummary {
        total: entries.len(),
        dry_run: args.dry_run,
        ..Default::default()
    };
    log::info!("Found {} entries to migrate", summary.total);

    for stored in entries {
        // Re-validate on the way through; a bad entry must not reach the database
        let fingerprint = match decode_entry(&stored).and_then(|fp| fp.validate().map(|_| fp)) {
            Ok(fp) => fp,
            Err(e) => {
                log::error!("  ❌ Entry {} ('{}') is invalid: {}", stored.id, stored.song_name, e);
                summary.failed += 1;
                continue;
            }
        };

        let Some(dest) = &dest else {
            log::info!("  [DRY RUN] Would migrate entry {} ('{}')", stored.id, stored.song_name);
            summary.migrated += 1;
            continue;
        };

        if !args.allow_duplicates
            && dest.contains_song(&stored.song_name).await?
        {
            log::debug!("  ⏭️  Skipping '{}' (already exists)", stored.song_name);
            summary.skipped += 1;
            continue;
        }

        let entry = NewCatalogEntry::from_fingerprint(&fingerprint, &args.source_dir.join(&stored.song_name));
        match dest.insert(entry).await {
            Ok(id) => {
                log::info!("  ✅ Migrated '{}' as {}", stored.song_name, id);
                summary.migrated += 1;
            }
            Err(e) => {
                log::error!("  ❌ Failed to migrate '{}': {}", stored.song_name, e);
                summary.failed += 1;
            }
        }
    }

    log::info!(
        "Migration finished: {} migrated, {} skipped, {} failed",
        summary.migrated,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

async fn create_dest(dest_config: &Path) -> Result<PostgresCatalog> {
    log::info!("🗄️  Destination: PostgreSQL from '{}'", dest_config.display());

    let mut config =
        SongprintConfig::load(dest_config).context("Failed to load destination configuration")?;
    config.apply_env_overrides()?;

    match config.storage.backend {
        BackendType::Postgresql => PostgresCatalog::connect(&config.storage.postgresql)
            .await
            .context("Failed to connect to destination database"),
        other => anyhow::bail!("Destination backend must be PostgreSQL, not {:?}", other),
    }
}
