//! Kubernetes resource watcher.
//!
//! Runs a `kube_runtime::Controller` over `Bastion` objects. The controller
//! handles reconnection, per-object serialization and requeueing; failed
//! reconciles are retried with a per-object Fibonacci backoff.

use crate::error::ControllerError;
use crate::reconciler::{Reconciler, object_key};
use crds::Bastion;
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as ControllerConfig},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Requeue with the object's next backoff delay
fn error_policy(bastion: Arc<Bastion>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let key = object_key(&bastion);
    let delay = reconciler.backoff.next_backoff(&key);
    warn!(
        "Reconciliation of bastion {} failed, retrying in {:?}: {}",
        key, delay, error
    );
    Action::requeue(delay)
}

/// Watches Bastion resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    bastion_api: Api<Bastion>,
    concurrency: u16,
    ready: Arc<AtomicBool>,
}

impl Watcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        bastion_api: Api<Bastion>,
        concurrency: u16,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reconciler,
            bastion_api,
            concurrency,
            ready,
        }
    }

    /// Starts watching Bastion resources. Returns when the controller stream ends.
    pub async fn watch_bastions(&self) -> Result<(), ControllerError> {
        info!(
            "Starting Bastion watcher (concurrency {})",
            self.concurrency
        );

        let reconcile = |bastion: Arc<Bastion>, reconciler: Arc<Reconciler>| async move {
            debug!("Reconciling bastion {}", object_key(&bastion));
            reconciler.reconcile(bastion).await
        };

        let controller_config = ControllerConfig::default().concurrency(self.concurrency);

        self.ready.store(true, Ordering::Relaxed);
        Controller::new(self.bastion_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((object, _)) => debug!("Reconciled bastion {}", object.name),
                    Err(e) => error!("Bastion controller error: {}", e),
                }
            })
            .await;
        self.ready.store(false, Ordering::Relaxed);

        info!("Bastion watcher stopped");
        Ok(())
    }
}
