//! modelgate binary.
//!
//! Entry point for the modelgate service: loads a trained inference artifact
//! and serves it over REST or gRPC until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use modelgate_core::config::{Args, Settings};
use modelgate_core::ServiceFactory;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modelgate=info,modelgate_core=info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args).context("failed to load configuration")?;

    info!("modelgate starting up");

    let drain = settings.server.drain();
    let service = ServiceFactory::new()
        .build(settings.service, settings)
        .await
        .context("failed to build service")?;

    service
        .run_until_interrupt(drain)
        .await
        .context("server error")?;

    info!("modelgate stopped");
    Ok(())
}
