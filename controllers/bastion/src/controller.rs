//! Main controller implementation.
//!
//! Wires the Kubernetes client, the compute client factory, the reconciler
//! and its watcher, and the health/metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{self, ServerState};
use crate::watcher::Watcher;
use crds::Bastion;
use gcp_client::{ComputeClientFactory, DefaultComputeClientFactory};
use kube::{Api, Client};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for GCP bastions.
pub struct Controller {
    bastion_watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates the controller and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Bastion Controller");

        let kube_client = Client::try_default().await?;
        let compute_factory: Arc<dyn ComputeClientFactory> = Arc::new(
            DefaultComputeClientFactory::new(config.compute_endpoint.clone()),
        );
        let metrics = Arc::new(Metrics::new()?);
        let ready = Arc::new(AtomicBool::new(false));

        let bastion_api: Api<Bastion> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            compute_factory,
            config.clone(),
            metrics.clone(),
        ));
        let watcher = Watcher::new(reconciler, bastion_api, config.concurrency, ready.clone());

        let bastion_watcher = tokio::spawn(async move { watcher.watch_bastions().await });

        let server_state = ServerState { metrics, ready };
        let address = config.metrics_bind_address;
        let server = tokio::spawn(async move { server::serve(address, server_state).await });

        Ok(Self {
            bastion_watcher,
            server,
        })
    }

    /// Runs until the watcher stops or the server fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Bastion Controller running");

        tokio::select! {
            result = &mut self.bastion_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Bastion watcher panicked: {}", e)))??;
            }
            result = &mut self.server => {
                result.map_err(|e| ControllerError::Watch(format!("Health server panicked: {}", e)))??;
            }
        }

        self.server.abort();
        Ok(())
    }
}
