mod client;
mod config;
mod error;
mod models;
mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    init_logging();

    match dotenv {
        Ok(Some(path)) => tracing::debug!("loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(err) => tracing::warn!("ignoring malformed .env: {}", err),
    }

    match Cli::parse().command {
        Command::Serve(args) => server::run(args).await,
        Command::Push(args) => client::push(args).await,
    }
}
