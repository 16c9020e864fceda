//! MetalLB Operator
//!
//! Folds `AddressPool` CRDs into the MetalLB ConfigMap and validates the
//! singleton `MetalLB` resource.
//!
//! - AddressPool: every pool in a namespace is merged into ConfigMap `config`
//! - MetalLB: only the instance named `metallb` is honoured, any other is degraded

mod backoff;
mod codec;
mod config;
mod controller;
mod error;
mod health;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use anyhow::{anyhow, Context, Result};
use config::OperatorConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // kube talks to the API server over rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install the rustls ring crypto provider"))?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    info!("Starting MetalLB Operator");

    let config = OperatorConfig::from_env().context("invalid operator configuration")?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!("  Resync interval: {:?}", config.resync_interval);
    info!("  Max conflict retries: {}", config.max_conflict_retries);
    info!("  Backoff: {:?}..{:?}", config.backoff_min, config.backoff_max);
    info!("  Health probes: {}", config.health_probe_bind_address);

    let controller = Controller::new(config).await.context("failed to start controller")?;
    controller.run().await?;

    Ok(())
}
