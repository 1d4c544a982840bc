//! shelfstate Server Binary
//!
//! Starts the TCP server for shelfstate.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use shelfstate::catalog::{CatalogReader, MemoryCatalog};
use shelfstate::config::WalSyncStrategy;
use shelfstate::network::Server;
use shelfstate::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// shelfstate Server
#[derive(Parser, Debug)]
#[command(name = "shelfstate-server")]
#[command(about = "Per-user reading state over a shared book catalog")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./shelfstate_data")]
    data_dir: PathBuf,

    /// Catalog file (JSON array of books)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7480")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// WAL entries before a snapshot is written
    #[arg(short, long, default_value = "1024")]
    snapshot_threshold: usize,

    /// fsync the WAL after every write
    #[arg(long)]
    sync_every_write: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shelfstate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("shelfstate Server v{}", shelfstate::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());
    tracing::info!("Listen address: {}", args.listen);

    let catalog: Arc<dyn CatalogReader> = match &args.catalog {
        Some(path) => match MemoryCatalog::from_json_file(path) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                tracing::error!("Failed to load catalog: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No catalog given, serving an empty library");
            Arc::new(MemoryCatalog::default())
        }
    };

    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .snapshot_threshold(args.snapshot_threshold);
    if args.sync_every_write {
        builder = builder.wal_sync_strategy(WalSyncStrategy::EveryWrite);
    }
    let config = builder.build();

    // Open engine
    let engine = match Engine::open(config.clone(), catalog) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let mut server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.flush() {
        tracing::error!("Final snapshot failed: {}", e);
    }

    tracing::info!("Server stopped");
}
