//! tenantq server binary.
//!
//! Creates the logs, users and groups tables in an in-memory store, loads an
//! optional seed file, and serves them over a Unix domain socket.

use std::path::PathBuf;

use clap::Parser;
use tenantq_core::config::{EngineConfig, TableNaming};
use tenantq_core::store::MemoryStore;
use tenantq_server::{Service, TenantqServer, seed};
use tracing::info;

/// tenantq server: paged log and user queries over a Unix socket.
#[derive(Parser, Debug)]
#[command(name = "tenantq-server", version)]
struct Cli {
    /// Unix socket path to listen on (default: ~/.local/share/tenantq/server.sock).
    #[arg(short, long, env = "TENANTQ_SOCKET")]
    socket: Option<PathBuf>,

    /// JSON-lines file of `{"table": ..., "item": {...}}` records to load at startup.
    #[arg(long, env = "TENANTQ_SEED")]
    seed: Option<PathBuf>,

    /// Application name used in physical table names.
    #[arg(long, env = "TENANTQ_APP_NAME", default_value = "prototype-app")]
    app_name: String,

    /// Deployment environment; `local` maps to the `devel` tables.
    #[arg(long, env = "TENANTQ_ENVIRONMENT", default_value = "local")]
    environment: String,
}

fn default_socket_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tenantq")
        .join("server.sock")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = EngineConfig::from_env()?;
    let naming = TableNaming::new(cli.app_name, cli.environment);
    info!(socket = %socket_path.display(), ?config, ?naming, "starting");

    let store = MemoryStore::new();
    let service = Service::bootstrap(&store, &naming, config)?;
    if let Some(path) = &cli.seed {
        seed::load_file(&service, path)?;
    }

    let server = TenantqServer::new(service, socket_path);
    server.run().await?;

    Ok(())
}
