//! AKS Cluster Controller
//!
//! Reconciles AKSClusterConfig resources against Azure Kubernetes Service:
//! creates or imports clusters, converges drift one change at a time, records
//! failures on the resource status and removes clusters it created when the
//! resource is deleted.

mod backoff;
mod builder;
mod config;
mod controller;
mod credentials;
mod drift;
mod error;
mod reconciler;
mod recorder;
mod store;
mod upstream;
mod validation;
mod watcher;
mod workspace;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube and reqwest both pull in rustls; pick the provider explicitly
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| ControllerError::InvalidConfig("failed to install rustls crypto provider".to_string()))?;

    tracing_subscriber::fmt::init();

    info!("Starting AKS Cluster Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Poll interval: {}s", config.poll_interval.as_secs());
    info!("  Resync interval: {}s", config.resync_interval.as_secs());
    info!("  Concurrency: {}", config.concurrency);
    info!(
        "  Error backoff: {}m..{}m",
        config.backoff_min_minutes, config.backoff_max_minutes
    );

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
