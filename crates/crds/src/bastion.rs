//! Bastion CRD
//!
//! Requests a short-lived SSH jump host for a shoot cluster.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Bastion",
    namespaced,
    status = "BastionStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"IP","type":"string","jsonPath":".status.ingress.ip"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.lastOperation.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    /// Provider type (e.g. "gcp")
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Provider-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::raw_extension")]
    pub provider_config: Option<serde_json::Value>,

    /// Base64 encoded startup script for the bastion host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    /// Source ranges allowed to reach the bastion via SSH
    #[serde(default)]
    pub ingress: Vec<BastionIngressPolicy>,
}

/// Ingress permission for the bastion host
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BastionIngressPolicy {
    /// Allowed IP block
    pub ip_block: IpBlock,
}

/// CIDR block (mirrors `networking.k8s.io/v1 IPBlock`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpBlock {
    /// CIDR notation, e.g. "213.69.151.0/24"
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct BastionStatus {
    /// Public endpoint of the bastion host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<BastionIngress>,

    /// Provider-specific state persisted across reconciles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::raw_extension")]
    pub provider_status: Option<serde_json::Value>,

    /// Last operation performed on the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Last error that occurred, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    /// Generation observed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Address of a bastion endpoint (mirrors `core/v1 LoadBalancerIngress`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BastionIngress {
    /// IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// DNS name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl BastionIngress {
    /// Builds an ingress from optional address parts, `None` when both are blank.
    pub fn from_parts(ip: Option<&str>, hostname: Option<&str>) -> Option<Self> {
        let ip = ip.filter(|s| !s.is_empty()).map(str::to_string);
        let hostname = hostname.filter(|s| !s.is_empty()).map(str::to_string);
        if ip.is_none() && hostname.is_none() {
            return None;
        }
        Some(Self { ip, hostname })
    }

    /// An endpoint is ready once it carries an IP or a hostname.
    pub fn is_ready(&self) -> bool {
        self.ip.as_deref().is_some_and(|s| !s.is_empty())
            || self.hostname.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Operation type
    #[serde(rename = "type")]
    pub operation_type: OperationType,

    /// Operation state
    pub state: OperationState,

    /// Human readable description
    pub description: String,

    /// Progress in percent
    pub progress: i32,

    /// Time of the last update
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Error description
    pub description: String,

    /// Well-known error codes (e.g. "ERR_CONFIGURATION_PROBLEM")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,

    /// Time of the last update
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Reconcile,
    Delete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum OperationState {
    Processing,
    Succeeded,
    Error,
    Failed,
}
