//! Infrastructure CRD
//!
//! Only read by the bastion controller to find the shoot's VPC and nodes subnet.

use crate::gcp::InfrastructureStatus as GcpInfrastructureStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Infrastructure",
    namespaced,
    status = "InfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Region of the shoot
    pub region: String,

    /// Provider-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::raw_extension")]
    pub provider_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Provider-specific status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::raw_extension")]
    pub provider_status: Option<serde_json::Value>,
}

impl Infrastructure {
    /// Decodes the GCP provider status, `None` until the infrastructure
    /// controller has written one.
    pub fn gcp_status(&self) -> Result<Option<GcpInfrastructureStatus>, serde_json::Error> {
        self.status
            .as_ref()
            .and_then(|s| s.provider_status.clone())
            .map(serde_json::from_value)
            .transpose()
    }
}
