use anyhow::{Context, Result};

use clap::Parser;
use stash::{
    cli,
    config::Settings,
    http::{ProxyState, make_server},
    utils::initialize_logger,
};
use tracing::info;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let mut settings =
        Settings::load_or_default(&args.config).with_context(|| "init config failed")?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    let _guard = initialize_logger(&settings)?;

    let state = ProxyState::new(&settings);
    info!("Access log: {}", state.access_log.path().display());

    let handle = make_server(&settings, state)
        .await
        .with_context(|| "Error starting proxy server")?;
    info!(
        "Proxy server is running on http://localhost:{}",
        handle.local_addr().port()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    handle.shutdown();
    handle.stopped().await;
    Ok(())
}
