//! Reconciliation of `Bastion` resources.
//!
//! Loads what a bastion is resolved against (cluster, infrastructure status,
//! cloud provider secret), drives the actuator and reports the outcome in
//! the bastion's status. Deletion runs through the finalizer.

pub mod status;

use crate::backoff::BackoffTracker;
use crate::bastion::actuator::{self, BastionEndpoints, ensure_zone};
use crate::bastion::firewall::ingress_permissions;
use crate::bastion::options::{ClusterInfo, Options, determine_options, provider_status};
use crate::bastion::resources::startup_script;
use crate::config::ControllerConfig;
use crate::error::{BastionError, ControllerError};
use crate::metrics::{Metrics, RESULT_ERROR, RESULT_REQUEUE, RESULT_SUCCESS};
use chrono::Utc;
use crds::{Bastion, Cluster, Infrastructure, OperationState, OperationType, PROVIDER_TYPE};
use gcp_client::{ComputeClientFactory, ComputeClientTrait, ServiceAccount};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{self, Event as FinalizerEvent, finalizer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Finalizer guarding the bastion's cloud resources
pub const BASTION_FINALIZER: &str = "extensions.gardener.cloud/gcp-bastion";

/// Retry delay while the infrastructure controller has not published its status
const INFRASTRUCTURE_REQUEUE_DELAY: Duration = Duration::from_secs(30);

/// Everything the actuator needs for one bastion
struct BastionContext {
    compute: Arc<dyn ComputeClientTrait>,
    opts: Options,
    shoot_name: String,
}

/// Reconciles GCP bastions.
pub struct Reconciler {
    client: Client,
    compute_factory: Arc<dyn ComputeClientFactory>,
    config: ControllerConfig,
    metrics: Arc<Metrics>,
    /// Per-object retry state for failed reconciles (namespace/name)
    pub(crate) backoff: BackoffTracker,
}

/// What the controller does after a failed reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureAction {
    /// Operation in progress, try again after the delay
    Requeue(Duration),
    /// Configuration problem, wait until the object changes
    AwaitChange,
    /// Hand the error to the error policy and its backoff
    Retry,
}

/// Classifies a reconcile error.
pub(crate) fn failure_action(error: &ControllerError) -> FailureAction {
    if let Some((_, delay)) = error.requeue_after() {
        FailureAction::Requeue(delay)
    } else if error.is_configuration() {
        FailureAction::AwaitChange
    } else {
        FailureAction::Retry
    }
}

/// `namespace/name` of a bastion
pub fn object_key(bastion: &Bastion) -> String {
    format!(
        "{}/{}",
        bastion.namespace().unwrap_or_default(),
        bastion.name_any()
    )
}

impl Reconciler {
    pub fn new(
        client: Client,
        compute_factory: Arc<dyn ComputeClientFactory>,
        config: ControllerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            compute_factory,
            config,
            metrics,
            backoff: BackoffTracker::default(),
        }
    }

    /// Entry point for the controller: dispatches to apply or cleanup.
    pub async fn reconcile(&self, bastion: Arc<Bastion>) -> Result<Action, ControllerError> {
        let key = object_key(&bastion);
        if bastion.spec.provider_type != PROVIDER_TYPE {
            debug!(
                "Ignoring bastion {} of type {:?}",
                key, bastion.spec.provider_type
            );
            return Ok(Action::await_change());
        }
        let Some(namespace) = bastion.namespace() else {
            return Err(ControllerError::InvalidConfig(format!(
                "bastion {key} has no namespace"
            )));
        };

        let api: Api<Bastion> = Api::namespaced(self.client.clone(), &namespace);
        let api_ref = &api;
        let ns = namespace.as_str();
        let result = finalizer(&api, BASTION_FINALIZER, bastion, |event| async move {
            match event {
                FinalizerEvent::Apply(bastion) => self.apply(api_ref, &bastion, ns).await,
                FinalizerEvent::Cleanup(bastion) => self.cleanup(api_ref, &bastion, ns).await,
            }
        })
        .await
        .map_err(|e| match e {
            finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e,
            other => ControllerError::Finalizer(Box::new(other)),
        });

        if result.is_ok() {
            self.backoff.reset(&key);
        }
        result
    }

    async fn apply(
        &self,
        api: &Api<Bastion>,
        bastion: &Bastion,
        namespace: &str,
    ) -> Result<Action, ControllerError> {
        let operation = status::operation_type(bastion);
        let started = Instant::now();
        let name = bastion.name_any();
        info!("Reconciling bastion {}/{}", namespace, name);

        let result = self.reconcile_cloud(api, bastion, namespace).await;
        self.observe(operation, &result, started);

        match result {
            Ok(endpoints) => {
                if !status::is_ready(bastion, operation, &endpoints) {
                    let patch = status::ready_patch(bastion, operation, &endpoints, Utc::now());
                    self.patch_status(api, &name, &patch).await?;
                }
                info!("Bastion {}/{} is ready", namespace, name);
                Ok(Action::await_change())
            }
            Err(e) => self.handle_failure(api, bastion, operation, e).await,
        }
    }

    async fn cleanup(
        &self,
        api: &Api<Bastion>,
        bastion: &Bastion,
        namespace: &str,
    ) -> Result<Action, ControllerError> {
        let operation = OperationType::Delete;
        let started = Instant::now();
        info!("Deleting bastion {}/{}", namespace, bastion.name_any());

        let result = self.delete_cloud(bastion, namespace).await;
        self.observe(operation, &result, started);

        match result {
            Ok(()) => {
                info!(
                    "Cloud resources of bastion {}/{} are gone",
                    namespace,
                    bastion.name_any()
                );
                Ok(Action::await_change())
            }
            Err(e) => self.handle_failure(api, bastion, operation, e).await,
        }
    }

    async fn reconcile_cloud(
        &self,
        api: &Api<Bastion>,
        bastion: &Bastion,
        namespace: &str,
    ) -> Result<BastionEndpoints, ControllerError> {
        let ingress_cidrs = ingress_permissions(&bastion.spec)?;
        let user_data = startup_script(&bastion.spec)?;

        let ctx = self.load_context(bastion, namespace).await?;
        self.persist_zone(api, bastion, &ctx.opts.zone).await?;

        let endpoints = actuator::reconcile(
            ctx.compute.as_ref(),
            &ctx.opts,
            &ingress_cidrs,
            &user_data,
            &ctx.shoot_name,
        )
        .await?;
        Ok(endpoints)
    }

    async fn delete_cloud(&self, bastion: &Bastion, namespace: &str) -> Result<(), ControllerError> {
        let ctx = self.load_context(bastion, namespace).await?;
        actuator::delete(ctx.compute.as_ref(), &ctx.opts).await?;
        Ok(())
    }

    /// Resolves cluster, network, credentials and zone of a bastion.
    async fn load_context(
        &self,
        bastion: &Bastion,
        namespace: &str,
    ) -> Result<BastionContext, ControllerError> {
        let cluster = Api::<Cluster>::all(self.client.clone()).get(namespace).await?;
        let cluster = ClusterInfo::from_cluster(&cluster)?;
        let shoot_name = cluster.shoot.metadata.name.clone();
        if shoot_name.is_empty() {
            return Err(BastionError::configuration(format!(
                "cluster {namespace} has no shoot name"
            ))
            .into());
        }

        let infrastructure = Api::<Infrastructure>::namespaced(self.client.clone(), namespace)
            .get(&shoot_name)
            .await?;
        let infra_status = infrastructure
            .gcp_status()
            .map_err(|e| {
                BastionError::configuration(format!(
                    "could not decode infrastructure status of {namespace}/{shoot_name}: {e}"
                ))
            })?
            .ok_or_else(|| {
                BastionError::requeue_after(
                    format!("infrastructure {namespace}/{shoot_name} has no provider status yet"),
                    INFRASTRUCTURE_REQUEUE_DELAY,
                )
            })?;
        let subnet = infra_status.nodes_subnet().ok_or_else(|| {
            BastionError::configuration(format!(
                "infrastructure {namespace}/{shoot_name} has no nodes subnet"
            ))
        })?;

        let secret = Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(&self.config.secret_name)
            .await?;
        let service_account = ServiceAccount::from_secret_data(&secret.data.unwrap_or_default())?;
        let compute = self.compute_factory.new_client(&service_account).await?;

        let opts = determine_options(
            bastion,
            &cluster,
            compute.project_id(),
            &infra_status.networks.vpc.name,
            &subnet.name,
        )?;
        let opts = ensure_zone(compute.as_ref(), &opts).await?;
        debug!(
            "Resolved bastion {}/{} to {} in zone {} (machine {}, image {})",
            namespace,
            bastion.name_any(),
            opts.bastion_instance_name,
            opts.zone,
            opts.machine_name,
            opts.image_path
        );

        Ok(BastionContext {
            compute,
            opts,
            shoot_name,
        })
    }

    /// Writes the zone to the provider status the first time it is known.
    async fn persist_zone(
        &self,
        api: &Api<Bastion>,
        bastion: &Bastion,
        zone: &str,
    ) -> Result<(), ControllerError> {
        let persisted = provider_status(bastion)?.map(|s| s.zone);
        if persisted.as_deref() == Some(zone) {
            return Ok(());
        }
        info!(
            "Pinning bastion {} to zone {}",
            object_key(bastion),
            zone
        );
        self.patch_status(api, &bastion.name_any(), &status::zone_patch(zone))
            .await
    }

    /// Maps a failed reconcile onto status and controller action.
    ///
    /// In-progress operations requeue after their delay, configuration
    /// problems wait for the object to change, everything else goes to the
    /// error policy.
    async fn handle_failure(
        &self,
        api: &Api<Bastion>,
        bastion: &Bastion,
        operation: OperationType,
        error: ControllerError,
    ) -> Result<Action, ControllerError> {
        let key = object_key(bastion);
        let name = bastion.name_any();
        let action = failure_action(&error);

        if let FailureAction::Requeue(delay) = action {
            let cause = error.requeue_after().map(|(c, _)| c).unwrap_or_default();
            info!("Bastion {} not done yet, requeue in {:?}: {}", key, delay, cause);
            if !status::last_operation_matches(bastion, operation, OperationState::Processing, cause)
            {
                let patch = status::processing_patch(operation, cause, Utc::now());
                if let Err(e) = self.patch_status(api, &name, &patch).await {
                    warn!("Failed to update status of bastion {}: {}", key, e);
                }
            }
            return Ok(Action::requeue(delay));
        }

        let description = error.to_string();
        let state = if action == FailureAction::AwaitChange {
            OperationState::Failed
        } else {
            OperationState::Error
        };
        if !status::last_operation_matches(bastion, operation, state, &description) {
            let patch = status::error_patch(bastion, operation, &error, Utc::now());
            if let Err(e) = self.patch_status(api, &name, &patch).await {
                warn!("Failed to update status of bastion {}: {}", key, e);
            }
        }

        match action {
            FailureAction::AwaitChange => {
                error!(
                    "Bastion {} has a configuration problem, waiting for changes: {}",
                    key, description
                );
                Ok(Action::await_change())
            }
            _ => Err(error),
        }
    }

    async fn patch_status(
        &self,
        api: &Api<Bastion>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    fn observe<T>(&self, operation: OperationType, result: &Result<T, ControllerError>, started: Instant) {
        let outcome = match result {
            Ok(_) => RESULT_SUCCESS,
            Err(e) if e.requeue_after().is_some() => RESULT_REQUEUE,
            Err(_) => RESULT_ERROR,
        };
        self.metrics
            .observe(status::operation_label(operation), outcome, started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use gcp_client::ComputeError;

    #[test]
    fn test_object_key() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        assert_eq!(object_key(&bastion), "shoot--dev--test/bastion1");
    }

    #[test]
    fn test_finalizer_name() {
        assert!(BASTION_FINALIZER.starts_with(crds::EXTENSIONS_GROUP));
    }

    #[test]
    fn test_in_progress_requeues_after_its_delay() {
        let err = ControllerError::from(BastionError::requeue_after(
            "bastion instance is still being deleted",
            Duration::from_secs(30),
        ));
        assert_eq!(
            failure_action(&err),
            FailureAction::Requeue(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_configuration_problem_awaits_change() {
        let err = ControllerError::from(BastionError::configuration("no suitable machine found"));
        assert_eq!(failure_action(&err), FailureAction::AwaitChange);

        let err = ControllerError::from(ComputeError::InvalidCredentials("bad key".to_string()));
        assert_eq!(failure_action(&err), FailureAction::AwaitChange);
    }

    #[test]
    fn test_api_failure_goes_to_error_policy() {
        let err = ControllerError::from(BastionError::compute(
            "insert",
            "firewall b-allow-ssh",
            ComputeError::Api {
                status: 500,
                message: "backend error".to_string(),
            },
        ));
        assert_eq!(failure_action(&err), FailureAction::Retry);
    }
}
