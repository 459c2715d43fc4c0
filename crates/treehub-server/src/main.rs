use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use treehub_server::{ServerConfig, TreehubServer};

/// TreeHub: OSTree object and ref server.
#[derive(Parser, Debug)]
#[command(name = "treehub", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(addr) = cli.bind {
        config.bind_addr = addr;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    config.log_summary();

    let server = TreehubServer::new(config)?;
    if let Some(path) = cli.config {
        watch_config(&server, path)?;
    }
    server.serve().await?;
    Ok(())
}

#[cfg(unix)]
fn watch_config(server: &TreehubServer, path: PathBuf) -> anyhow::Result<()> {
    treehub_server::server::reload_on_sighup(server.registry(), path)?;
    Ok(())
}

#[cfg(not(unix))]
fn watch_config(_server: &TreehubServer, _path: PathBuf) -> anyhow::Result<()> {
    Ok(())
}
