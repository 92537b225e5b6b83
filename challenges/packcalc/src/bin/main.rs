use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use packcalc::config::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // RUST_LOG overrides the default level; `log` records are bridged into the subscriber.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();

    let config = Config::parse();
    let listener = TcpListener::bind((config.bind, config.port)).await?;
    info!("listening on {}", listener.local_addr()?);
    packcalc::server::run(listener, config, signal::ctrl_c()).await;
    Ok(())
}
