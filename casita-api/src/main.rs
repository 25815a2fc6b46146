//! casita-api - read-only HTTP lookups over the plant database
//!
//! Opens the snapshot written by casita-etl read-only and serves canonical
//! plant identities, common-name resolution, and full records.

use anyhow::{Context, Result};
use casita_api::lookup::FederatedLookup;
use casita_api::{build_router, AppState};
use casita_common::config::{database_path, load_toml_config, resolve_root_folder};
use casita_common::db::{SqliteTableStore, TableStore};
use casita_common::logging::init_tracing;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5740;

#[derive(Debug, Parser)]
#[command(name = "casita-api", version, about = "Serve Casita plant lookups")]
struct Args {
    /// Root folder holding the database
    #[arg(long, env = "CASITA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root>/casita.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Config file (defaults to the platform config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_toml_config(args.config.as_deref());

    init_tracing(config.log_level());
    info!("Starting Casita API (casita-api) v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder, args.database.as_deref());
    info!("Database path: {}", db_path.display());

    let store = match SqliteTableStore::open_readonly(&db_path).await {
        Ok(store) => {
            info!("✓ Connected to database (read-only)");
            store
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e).context("run casita-etl first to create the database");
        }
    };

    let store: Arc<dyn TableStore> = Arc::new(store);
    let mut lookup = FederatedLookup::new(store);
    if let Some(ms) = config.api.lookup_timeout_ms {
        info!("Table discovery deadline: {} ms", ms);
        lookup = lookup.with_discovery_timeout(Duration::from_millis(ms));
    }

    let app = build_router(AppState::new(lookup));

    let bind = args
        .bind
        .or(config.api.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let port = args.port.or(config.api.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("casita-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
