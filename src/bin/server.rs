//! segdb Server Binary
//!
//! Recovers the working directory and starts the TCP server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use segdb::config::ConfigBuilder;
use segdb::network::Server;
use segdb::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// segdb Server
#[derive(Parser, Debug)]
#[command(name = "segdb-server")]
#[command(about = "Log-structured key-value store server")]
#[command(version)]
struct Args {
    /// Properties file (kvs.workingPath, kvs.host, kvs.port, ...)
    #[arg(short, long, default_value = "server.properties")]
    config: PathBuf,

    /// Working directory, overrides the properties file
    #[arg(short, long)]
    working_path: Option<PathBuf>,

    /// Listen address (host:port), overrides the properties file
    #[arg(short, long)]
    listen: Option<String>,

    /// Maximum concurrent connections
    #[arg(short, long)]
    max_connections: Option<usize>,

    /// Worker threads serving connections
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e.chain());
            std::process::exit(2);
        }
    };

    tracing::info!("segdb Server v{}", segdb::VERSION);
    tracing::info!("Working directory: {}", config.working_path.display());
    tracing::info!("Listen address: {}", config.listen_addr);

    let engine = match Engine::open(&config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e.chain());
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e.chain());
            std::process::exit(1);
        }
    };

    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handle.shutdown();
    }) {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e.chain());
        std::process::exit(1);
    }
}

/// Properties file first, then command line overrides
fn build_config(args: &Args) -> segdb::Result<Config> {
    let base = Config::from_properties_file(&args.config)?;
    let mut builder = ConfigBuilder::from_config(base);

    if let Some(path) = &args.working_path {
        builder = builder.working_path(path);
    }
    if let Some(listen) = &args.listen {
        builder = builder.listen_addr(listen);
    }
    if let Some(max) = args.max_connections {
        builder = builder.max_connections(max);
    }
    if let Some(workers) = args.workers {
        builder = builder.worker_threads(workers);
    }

    Ok(builder.build())
}
