//! GCP provider API types (`gcp.provider.extensions.gardener.cloud/v1alpha1`)
//!
//! Decoded from the raw `providerConfig` / `providerStatus` fields of the
//! Gardener resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider section of the cloud profile: maps machine image versions to GCP images
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileConfig {
    #[serde(default)]
    pub machine_images: Vec<MachineImages>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineImages {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<MachineImageVersion>,
}

/// A machine image version in either the legacy format (one `image` and
/// an optional `architecture`) or the capability format (`capabilityFlavors`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_flavors: Vec<MachineImageFlavor>,
}

/// Image variant for a set of capabilities
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageFlavor {
    pub image: String,
    /// Capability name -> supported values, e.g. `architecture: [arm64]`
    #[serde(default)]
    pub capabilities: BTreeMap<String, Vec<String>>,
}

/// Capability key carrying the CPU architecture
pub const CAPABILITY_ARCHITECTURE: &str = "architecture";

impl MachineImageFlavor {
    /// Whether the flavor lists the architecture among its capabilities.
    pub fn supports_architecture(&self, arch: &str) -> bool {
        self.capabilities
            .get(CAPABILITY_ARCHITECTURE)
            .is_some_and(|archs| archs.iter().any(|a| a == arch))
    }
}

/// Shoot-level infrastructure configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfig {
    #[serde(default)]
    pub networks: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Workers subnet CIDR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<String>,
    /// Deprecated spelling of `workers`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

impl InfrastructureConfig {
    /// Workers CIDR, preferring `workers` over the deprecated `worker`.
    pub fn workers_cidr(&self) -> Option<&str> {
        self.networks
            .workers
            .as_deref()
            .or(self.networks.worker.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Status written by the infrastructure controller
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    #[serde(default)]
    pub networks: NetworkStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(default)]
    pub vpc: Vpc,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Vpc {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub name: String,
    pub purpose: String,
}

/// Subnet purpose of the worker nodes subnet
pub const PURPOSE_NODES: &str = "nodes";

impl InfrastructureStatus {
    /// Name of the subnet the worker nodes live in.
    pub fn nodes_subnet(&self) -> Option<&Subnet> {
        self.networks.subnets.iter().find(|s| s.purpose == PURPOSE_NODES)
    }
}

/// State persisted in `Bastion.status.providerStatus`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BastionProviderStatus {
    pub zone: String,
}
