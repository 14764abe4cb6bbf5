//! etagkv Server Binary
//!
//! Opens the versioned store and serves it over TCP.

use std::sync::Arc;

use clap::Parser;
use etagkv::config::WalSyncStrategy;
use etagkv::network::Server;
use etagkv::{Config, EngineKind, VersionedStore};
use tracing_subscriber::{fmt, EnvFilter};

/// etagkv Server
#[derive(Parser, Debug)]
#[command(name = "etagkv-server")]
#[command(about = "Versioned key-value document store with conditional operations")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./etagkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7379")]
    listen: String,

    /// Storage engine: "lsm" (durable) or "memory"
    #[arg(short, long, default_value = "lsm")]
    engine: EngineKind,

    /// Maximum queued connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Connection worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// MemTable size limit in MB before flush
    #[arg(long, default_value = "64")]
    memtable_mb: usize,

    /// fsync the WAL every N non-durable appends
    #[arg(long, default_value = "100")]
    wal_sync_every: usize,

    /// Number of per-key lock stripes
    #[arg(long, default_value = "64")]
    lock_stripes: usize,

    /// Serve reads only; every write is rejected
    #[arg(long)]
    read_only: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,etagkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("etagkv Server v{}", etagkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Engine: {:?}", args.engine);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .engine(args.engine)
        .read_only(args.read_only)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries {
            count: args.wal_sync_every,
        })
        .lock_stripes(args.lock_stripes)
        .build();

    let store = match VersionedStore::open(&config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store initialized successfully");

    let mut server = Server::new(config, Arc::clone(&store));
    let result = server.run();

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store cleanly: {}", e);
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
