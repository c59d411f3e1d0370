use anyhow::{Context, Result};
use clap::Parser;
use salesboard::{config::DashboardConfig, logging, relay};
use std::path::PathBuf;
use tracing::info;

/// Same-origin relay for spreadsheet CSV exports.
#[derive(Parser, Debug)]
#[command(name = "relay", version)]
struct Args {
    /// YAML config; `PORT` and `RELAY_UPSTREAM` override it
    #[arg(long, env = "SALESBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the built front-end
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info,tower_http=info");
    let args = Args::parse();

    let mut cfg = DashboardConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(dir) = args.static_dir {
        cfg.relay.static_dir = dir;
    }

    info!("Starting sheet relay");
    info!("Health check: http://{}/health", cfg.relay.bind);
    relay::serve(&cfg.relay).await
}
