use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vhost_proxy::app::App;
use vhost_proxy::config::AppConfig;
use vhost_proxy::hostmap::HostMap;
use vhost_proxy::logging;

#[derive(Debug, Parser)]
#[command(name = "vhost-proxy", version, about = "Host-based HTTP and TLS SNI reverse proxy")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "VHOST_PROXY_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Host map file, overrides `hosts.file`
    #[arg(long)]
    hosts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config first (before logging init) to get logging config
    let mut config = AppConfig::load_or_default(&cli.config);
    if let Some(hosts) = cli.hosts {
        config.hosts.file = hosts.display().to_string();
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    let _guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging system")?;

    info!("vhost proxy starting...");
    info!(
        "Logging initialized - level: {}, file: {:?}, json: {}",
        config.logging.level, config.logging.file, config.logging.json
    );

    // the host map is a hard startup dependency
    let hosts = HostMap::load(&config.hosts.file)
        .await
        .with_context(|| format!("Failed to load host map {}", config.hosts.file))?;

    let mut app = App::new(config, hosts);
    app.start().context("Failed to start vhost proxy")?;

    info!("vhost proxy started. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received, shutting down gracefully...");
    app.wait_for_shutdown().await;

    Ok(())
}
