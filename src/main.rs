//! tatamid - Tatami tournament server daemon

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tatamid::{Config, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tatami tournament server
#[derive(Parser, Debug)]
#[command(
    name = "tatamid",
    version,
    about = "Run a multi-mat judo team tournament server"
)]
struct Args {
    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// SQLite database file; in-memory when omitted
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tatamid=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = args.database {
        config.db_path = Some(path.to_string_lossy().into_owned());
    }

    if config.db_path.is_none() {
        tracing::warn!("No database file given; tournament data lives in memory only");
    }

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
