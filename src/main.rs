use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use target_watch_lib::config::AppConfig;

#[derive(Parser)]
#[command(version, about = "Watchlist price refresh and target-hit logging service")]
struct Cli {
    /// Path to the config file (target_watch.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,

    /// Serve the API without the periodic refresh
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    target_watch_lib::init_tracing();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    target_watch_lib::run(config, !cli.no_scheduler).await?;
    Ok(())
}
