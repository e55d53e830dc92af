//! GCP Bastion Controller
//!
//! Reconciles Gardener `Bastion` extension resources of type `gcp`: an SSH
//! jump host VM with its boot disk and three firewall rules in the shoot's
//! VPC, reachable only from the bastion's ingress CIDRs.

mod backoff;
mod bastion;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod server;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // kube and reqwest both link rustls; pick one crypto provider for the process
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Bastion Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Concurrency: {}", config.concurrency);
    info!("  Credentials secret: {}", config.secret_name);
    info!("  Compute endpoint: {}", config.compute_endpoint);
    info!("  Metrics address: {}", config.metrics_bind_address);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
