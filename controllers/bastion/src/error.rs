//! Controller-specific error types.
//!
//! `BastionError` covers the bastion logic itself (option resolution, builders,
//! actuator). `ControllerError` is what the kube-runtime reconcile loop sees.

use gcp_client::ComputeError;
use kube::Error as KubeError;
use std::time::Duration;
use thiserror::Error;

/// Error code Gardener uses for user-fixable configuration problems
pub const ERR_CONFIGURATION_PROBLEM: &str = "ERR_CONFIGURATION_PROBLEM";

/// Errors produced while resolving and applying a bastion.
#[derive(Debug, Error)]
pub enum BastionError {
    /// Cloud profile, shoot or bastion spec cannot be satisfied. Retrying does not help.
    #[error("{0}")]
    Configuration(String),

    /// Compute API call failed
    #[error("failed to {operation} {resource}: {source}")]
    Compute {
        operation: &'static str,
        resource: String,
        #[source]
        source: ComputeError,
    },

    /// Not a failure: the operation is in progress and should be retried after `delay`
    #[error("requeue in {delay:?}: {cause}")]
    RequeueAfter { cause: String, delay: Duration },
}

impl BastionError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn compute(
        operation: &'static str,
        resource: impl Into<String>,
        source: ComputeError,
    ) -> Self {
        Self::Compute {
            operation,
            resource: resource.into(),
            source,
        }
    }

    pub(crate) fn requeue_after(cause: impl Into<String>, delay: Duration) -> Self {
        Self::RequeueAfter {
            cause: cause.into(),
            delay,
        }
    }
}

/// Errors that can occur in the bastion controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Compute client construction or credentials error
    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    /// Bastion resolution or cloud operation error
    #[error(transparent)]
    Bastion(#[from] BastionError),

    /// Finalizer add/remove or wrapped reconcile failure
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ControllerError>>),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health/metrics server error
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the error is a permanent configuration problem.
    ///
    /// Such errors are reported with `ERR_CONFIGURATION_PROBLEM` and are not
    /// retried until the object changes.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Bastion(BastionError::Configuration(_)) | Self::InvalidConfig(_) => true,
            Self::Compute(ComputeError::InvalidCredentials(_)) => true,
            Self::Bastion(BastionError::Compute {
                source: ComputeError::InvalidCredentials(_),
                ..
            }) => true,
            _ => false,
        }
    }

    /// Delay requested by an in-progress operation, if any.
    pub fn requeue_after(&self) -> Option<(&str, Duration)> {
        match self {
            Self::Bastion(BastionError::RequeueAfter { cause, delay }) => Some((cause, *delay)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_permanent() {
        let err = ControllerError::from(BastionError::configuration("no suitable machine found"));
        assert!(err.is_configuration());
        assert!(err.requeue_after().is_none());

        let err = ControllerError::from(ComputeError::InvalidCredentials("bad key".to_string()));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_requeue_is_not_a_configuration_error() {
        let err = ControllerError::from(BastionError::requeue_after(
            "instance still exists",
            Duration::from_secs(30),
        ));
        assert!(!err.is_configuration());
        assert_eq!(
            err.requeue_after(),
            Some(("instance still exists", Duration::from_secs(30)))
        );
    }

    #[test]
    fn test_compute_error_carries_context() {
        let err = BastionError::compute(
            "insert",
            "firewall b-allow-ssh",
            ComputeError::Api {
                status: 500,
                message: "backend error".to_string(),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("failed to insert firewall b-allow-ssh"));
        assert!(!ControllerError::from(err).is_configuration());
    }
}
