//! The pipectl operator.

mod app;
mod config;
mod controller;
#[cfg(test)]
mod fixtures;
mod reconciler;
mod scenario;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use pipectl_core::client::ControlPlane;
use pipectl_core::memory::InMemoryControlPlane;
use tracing_subscriber::prelude::*;

use crate::app::App;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the RUST_LOG env var.
        .with(tracing_subscriber::EnvFilter::from_default_env())
        // Send a copy of all spans to stdout in compact form.
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
        )
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;

    let cfg = Arc::new(Config::new()?);
    tracing::info!(
        account = %cfg.account_name,
        scenario = %cfg.scenario,
        "starting pipectl operator",
    );

    // Only the local control plane is currently available.
    let client: Arc<dyn ControlPlane> = Arc::new(InMemoryControlPlane::default());
    let res = App::new(cfg, client).await?.spawn().await.context("error joining app task").and_then(|res| res);
    if let Err(err) = &res {
        tracing::error!(error = ?err);
    }

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    res
}
