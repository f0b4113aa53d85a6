mod dispatch;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use axum::Router;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use calhook_core::AppConfig;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "calhook")]
#[command(about = "Receive calendar webhooks and write meeting links into event custom fields")]
struct Cli {
    /// Config file (defaults to ~/.config/calhook/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file (e.g., "0.0.0.0:8080")
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => {
            let path = AppConfig::config_path()?;
            if !path.exists() {
                AppConfig::create_sample_config(&path)?;
                bail!(
                    "No config found. A sample was written to {} - fill it in and restart.",
                    path.display()
                );
            }
            path
        }
    };

    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("Could not load config from {}", config_path.display()))?;

    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let addr = config.listen_addr;
    let links = config.links.len();
    let state = AppState::new(config)?;

    let app = Router::new()
        .merge(routes::webhook::router())
        .merge(routes::health::router())
        .with_state(state);

    info!(%addr, links, "calhook listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
