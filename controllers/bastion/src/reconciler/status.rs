//! Bastion status patches.
//!
//! All patches are JSON merge patches against the status subresource.
//! `lastError: null` clears a previous error.

use crate::bastion::actuator::BastionEndpoints;
use crate::error::{ControllerError, ERR_CONFIGURATION_PROBLEM};
use chrono::{DateTime, Utc};
use crds::gcp::BastionProviderStatus;
use crds::{Bastion, LastError, LastOperation, OperationState, OperationType};
use serde_json::{Value, json};

/// `Create` until an operation has been recorded, `Reconcile` afterwards
pub fn operation_type(bastion: &Bastion) -> OperationType {
    let recorded = bastion
        .status
        .as_ref()
        .is_some_and(|s| s.last_operation.is_some());
    if recorded {
        OperationType::Reconcile
    } else {
        OperationType::Create
    }
}

/// Metric label of an operation type
pub fn operation_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::Create => "create",
        OperationType::Reconcile => "reconcile",
        OperationType::Delete => "delete",
    }
}

fn last_operation(
    operation: OperationType,
    state: OperationState,
    description: impl Into<String>,
    now: DateTime<Utc>,
) -> LastOperation {
    let progress = match state {
        OperationState::Succeeded => 100,
        _ => 0,
    };
    LastOperation {
        operation_type: operation,
        state,
        description: description.into(),
        progress,
        last_update_time: now,
    }
}

/// Description of a successful reconcile
pub const READY_DESCRIPTION: &str = "Bastion is ready";

/// Whether the recorded last operation already says this, ignoring the timestamp.
///
/// Every status write triggers a watch event, so unchanged statuses are not re-patched.
pub fn last_operation_matches(
    bastion: &Bastion,
    operation: OperationType,
    state: OperationState,
    description: &str,
) -> bool {
    bastion
        .status
        .as_ref()
        .and_then(|s| s.last_operation.as_ref())
        .is_some_and(|op| {
            op.operation_type == operation && op.state == state && op.description == description
        })
}

/// Whether the status already reports the bastion ready at `endpoints`.
pub fn is_ready(bastion: &Bastion, operation: OperationType, endpoints: &BastionEndpoints) -> bool {
    let Some(status) = bastion.status.as_ref() else {
        return false;
    };
    last_operation_matches(bastion, operation, OperationState::Succeeded, READY_DESCRIPTION)
        && status.last_error.is_none()
        && status.ingress.as_ref() == Some(&endpoints.public)
        && status.observed_generation == bastion.metadata.generation
}

/// Records the zone the bastion's resources live in.
pub fn zone_patch(zone: &str) -> Value {
    json!({
        "status": {
            "providerStatus": BastionProviderStatus { zone: zone.to_string() },
        }
    })
}

/// Bastion is ready: publish the public endpoint and clear errors.
pub fn ready_patch(
    bastion: &Bastion,
    operation: OperationType,
    endpoints: &BastionEndpoints,
    now: DateTime<Utc>,
) -> Value {
    json!({
        "status": {
            "ingress": endpoints.public,
            "lastOperation": last_operation(
                operation,
                OperationState::Succeeded,
                READY_DESCRIPTION,
                now,
            ),
            "lastError": Value::Null,
            "observedGeneration": bastion.metadata.generation,
        }
    })
}

/// Cloud work is still in progress.
pub fn processing_patch(
    operation: OperationType,
    cause: &str,
    now: DateTime<Utc>,
) -> Value {
    json!({
        "status": {
            "lastOperation": last_operation(operation, OperationState::Processing, cause, now),
        }
    })
}

/// Reconcile failed. Configuration problems are marked `Failed` and carry
/// `ERR_CONFIGURATION_PROBLEM`; everything else is a retriable `Error`.
pub fn error_patch(
    bastion: &Bastion,
    operation: OperationType,
    error: &ControllerError,
    now: DateTime<Utc>,
) -> Value {
    let description = error.to_string();
    let (state, codes) = if error.is_configuration() {
        (OperationState::Failed, vec![ERR_CONFIGURATION_PROBLEM.to_string()])
    } else {
        (OperationState::Error, Vec::new())
    };
    json!({
        "status": {
            "lastOperation": last_operation(operation, state, description.clone(), now),
            "lastError": LastError {
                description,
                codes,
                last_update_time: now,
            },
            "observedGeneration": bastion.metadata.generation,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BastionError;
    use crate::test_utils::*;
    use crds::{BastionIngress, BastionStatus};
    use gcp_client::ComputeError;

    fn endpoints() -> BastionEndpoints {
        BastionEndpoints {
            private: BastionIngress {
                ip: Some("10.250.0.2".to_string()),
                hostname: None,
            },
            public: BastionIngress {
                ip: Some("34.90.0.2".to_string()),
                hostname: None,
            },
        }
    }

    #[test]
    fn test_operation_type() {
        let mut bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        assert_eq!(operation_type(&bastion), OperationType::Create);

        bastion.status = Some(BastionStatus {
            last_operation: Some(last_operation(
                OperationType::Create,
                OperationState::Succeeded,
                "done",
                Utc::now(),
            )),
            ..Default::default()
        });
        assert_eq!(operation_type(&bastion), OperationType::Reconcile);
    }

    #[test]
    fn test_ready_patch() {
        let mut bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        bastion.metadata.generation = Some(3);
        let patch = ready_patch(&bastion, OperationType::Create, &endpoints(), Utc::now());

        let status = &patch["status"];
        assert_eq!(status["ingress"], json!({"ip": "34.90.0.2"}));
        assert_eq!(status["lastOperation"]["type"], "Create");
        assert_eq!(status["lastOperation"]["state"], "Succeeded");
        assert_eq!(status["lastOperation"]["progress"], 100);
        assert!(status["lastError"].is_null());
        assert_eq!(status["observedGeneration"], 3);
    }

    #[test]
    fn test_is_ready_ignores_timestamps() {
        let mut bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        bastion.metadata.generation = Some(1);
        assert!(!is_ready(&bastion, OperationType::Create, &endpoints()));

        let patch = ready_patch(&bastion, OperationType::Create, &endpoints(), Utc::now());
        bastion.status = Some(serde_json::from_value(patch["status"].clone()).unwrap());
        assert!(is_ready(&bastion, OperationType::Create, &endpoints()));

        // A spec change bumps the generation
        bastion.metadata.generation = Some(2);
        assert!(!is_ready(&bastion, OperationType::Create, &endpoints()));
    }

    #[test]
    fn test_last_operation_matches() {
        let mut bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let patch = processing_patch(OperationType::Delete, "instance still exists", Utc::now());
        bastion.status = Some(serde_json::from_value(patch["status"].clone()).unwrap());

        assert!(last_operation_matches(
            &bastion,
            OperationType::Delete,
            OperationState::Processing,
            "instance still exists"
        ));
        assert!(!last_operation_matches(
            &bastion,
            OperationType::Delete,
            OperationState::Processing,
            "disk still exists"
        ));
    }

    #[test]
    fn test_zone_patch() {
        assert_eq!(
            zone_patch(TEST_ZONE),
            json!({"status": {"providerStatus": {"zone": "europe-west1-b"}}})
        );
    }

    #[test]
    fn test_processing_patch_keeps_error() {
        let patch = processing_patch(OperationType::Delete, "instance still exists", Utc::now());
        assert_eq!(patch["status"]["lastOperation"]["state"], "Processing");
        assert_eq!(patch["status"]["lastOperation"]["type"], "Delete");
        assert!(patch["status"].get("lastError").is_none());
    }

    #[test]
    fn test_configuration_error_patch() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let err = ControllerError::from(BastionError::configuration("no suitable machine found"));
        let patch = error_patch(&bastion, OperationType::Create, &err, Utc::now());

        assert_eq!(patch["status"]["lastOperation"]["state"], "Failed");
        assert_eq!(
            patch["status"]["lastError"]["description"],
            "no suitable machine found"
        );
        assert_eq!(
            patch["status"]["lastError"]["codes"],
            json!([ERR_CONFIGURATION_PROBLEM])
        );
    }

    #[test]
    fn test_transient_error_patch() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let err = ControllerError::from(BastionError::compute(
            "insert",
            "disk europe-west1-b/d",
            ComputeError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            },
        ));
        let patch = error_patch(&bastion, OperationType::Reconcile, &err, Utc::now());

        assert_eq!(patch["status"]["lastOperation"]["state"], "Error");
        // Empty code lists are omitted
        assert!(patch["status"]["lastError"].get("codes").is_none());
        assert!(err.requeue_after().is_none());
    }

    #[test]
    fn test_operation_labels() {
        assert_eq!(operation_label(OperationType::Create), "create");
        assert_eq!(operation_label(OperationType::Reconcile), "reconcile");
        assert_eq!(operation_label(OperationType::Delete), "delete");
    }
}
