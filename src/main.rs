use std::path::PathBuf;

use clap::Parser;
use larder::config::Config;
use larder::server;
use tracing_subscriber::EnvFilter;

/// Caching forward HTTP proxy.
#[derive(Debug, Parser)]
#[command(name = "larder", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Cache root directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Telemetry log file (JSON lines)
    #[arg(long)]
    log_path: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut cfg = Config::load(self.config.as_deref())?;

        if let Some(host) = self.host {
            cfg.host = host;
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(cache_dir) = self.cache_dir {
            cfg.cache_dir = cache_dir;
        }
        if self.log_path.is_some() {
            cfg.log_path = self.log_path;
        }

        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Cli::parse().into_config()?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    server::listener::run(&cfg, shutdown).await
}
