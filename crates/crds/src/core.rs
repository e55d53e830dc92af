//! Gardener core API subsets
//!
//! Only the fields the bastion controller reads from `CloudProfile` and
//! `Shoot` objects. Unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cloud profile as embedded in the `Cluster` resource
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfile {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CloudProfileSpec,
}

/// Catalog of machine types, images and regions offered by a provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    #[serde(default)]
    pub machine_types: Vec<MachineType>,
    #[serde(default)]
    pub machine_images: Vec<MachineImage>,
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Bastion machine overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bastion: Option<Bastion>,
    /// Provider specific configuration (`CloudProfileConfig` for GCP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineType {
    pub name: String,
    /// CPU quantity, e.g. "4" or "500m"
    pub cpu: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

impl MachineType {
    /// Architecture of the machine type, `amd64` when unset.
    pub fn architecture(&self) -> &str {
        self.architecture.as_deref().unwrap_or(DEFAULT_ARCHITECTURE)
    }

    /// CPU quantity in millicores.
    pub fn cpu_millis(&self) -> Result<i64, QuantityError> {
        parse_cpu_millis(&self.cpu)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<MachineImageVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<VersionClassification>,
    #[serde(default)]
    pub architectures: Vec<String>,
}

impl MachineImageVersion {
    /// Whether the version is classified as `supported`.
    ///
    /// Versions without classification are not considered supported.
    pub fn is_supported(&self) -> bool {
        self.classification == Some(VersionClassification::Supported)
    }

    /// Whether the version is available for the given architecture.
    pub fn supports_architecture(&self, arch: &str) -> bool {
        self.architectures.iter().any(|a| a == arch)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionClassification {
    Preview,
    Supported,
    Deprecated,
    #[serde(other)]
    Unknown,
}

/// Bastion overrides in the cloud profile
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bastion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<BastionMachineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_image: Option<BastionMachineImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BastionMachineType {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BastionMachineImage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub zones: Vec<AvailabilityZone>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityZone {
    pub name: String,
}

/// Shoot as embedded in the `Cluster` resource
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Shoot {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ShootSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub provider: ShootProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShootProvider {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    /// `InfrastructureConfig` for GCP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_config: Option<serde_json::Value>,
}

/// Name/namespace pair of an embedded object
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Architecture assumed when none is declared
pub const DEFAULT_ARCHITECTURE: &str = "amd64";

/// Invalid Kubernetes CPU quantity
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid CPU quantity {0:?}")]
pub struct QuantityError(pub String);

/// Parses a CPU quantity ("4", "0.5", "500m") into millicores.
pub fn parse_cpu_millis(quantity: &str) -> Result<i64, QuantityError> {
    let err = || QuantityError(quantity.to_string());
    let q = quantity.trim();
    if q.is_empty() {
        return Err(err());
    }

    if let Some(millis) = q.strip_suffix('m') {
        return millis.parse::<i64>().map_err(|_| err());
    }

    match q.split_once('.') {
        None => q
            .parse::<i64>()
            .ok()
            .and_then(|cores| cores.checked_mul(1000))
            .ok_or_else(err),
        Some((whole, frac)) => {
            if frac.is_empty() || frac.len() > 3 || !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(err());
            }
            let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| err())? };
            let frac_millis: i64 = format!("{frac:0<3}").parse().map_err(|_| err())?;
            whole
                .checked_mul(1000)
                .and_then(|w| w.checked_add(frac_millis))
                .ok_or_else(err)
        }
    }
}
