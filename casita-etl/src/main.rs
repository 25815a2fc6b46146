//! casita-etl - build the plant database from spreadsheet exports
//!
//! Reads an ingestion manifest, runs the pipeline, and replaces the database
//! snapshot. Safe to re-run: every run recomputes everything from scratch.

use anyhow::{Context, Result};
use casita_common::config::{database_path, load_toml_config, resolve_root_folder};
use casita_common::db::SqliteTableStore;
use casita_common::logging::init_tracing;
use casita_etl::loader::JsonWorkbookLoader;
use casita_etl::manifest::IngestManifest;
use casita_etl::resolver::DEFAULT_SIMILARITY_THRESHOLD;
use casita_etl::{persist_snapshot, Pipeline};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "casita-etl", version, about = "Build the Casita plant database")]
struct Args {
    /// Ingestion manifest (TOML)
    manifest: PathBuf,

    /// Root folder holding the database
    #[arg(long, env = "CASITA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root>/casita.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Config file (defaults to the platform config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build and report without writing the database
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_toml_config(args.config.as_deref());

    init_tracing(config.log_level());
    info!("Starting Casita ETL (casita-etl) v{}", env!("CARGO_PKG_VERSION"));

    let manifest = IngestManifest::load(&args.manifest)
        .with_context(|| format!("loading manifest {}", args.manifest.display()))?;
    let threshold = config
        .etl
        .similarity_threshold
        .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

    let mut pipeline = Pipeline::from_manifest(&manifest, threshold);
    let loader = JsonWorkbookLoader;
    for source in &manifest.sources {
        pipeline.add_workbook(&loader, source);
    }
    let snapshot = pipeline.run().context("building snapshot")?;

    println!("{}", serde_json::to_string_pretty(&snapshot.report)?);
    if args.dry_run {
        info!("Dry run: database left untouched");
        return Ok(());
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder, args.database.as_deref());
    info!("Database path: {}", db_path.display());

    let store = SqliteTableStore::open(&db_path)
        .await
        .context("opening database")?;
    persist_snapshot(&store, &snapshot)
        .await
        .context("writing snapshot")?;
    store.close().await;

    info!("✓ Ingestion complete");
    Ok(())
}
