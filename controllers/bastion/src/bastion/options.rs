//! Bastion options.
//!
//! Everything the builders and the actuator need, derived once per reconcile
//! from the bastion, its cluster and the infrastructure state. No I/O.

use crate::bastion::vm_details::{VmDetails, determine_vm_details};
use crate::error::BastionError;
use crds::Bastion;
use crds::Cluster;
use crds::core::{CloudProfileSpec, Shoot};
use crds::gcp::{BastionProviderStatus, CloudProfileConfig, InfrastructureConfig};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Length of the human-readable part of the base name
const MAX_LENGTH_FOR_BASE_NAME: usize = 33;

/// Cloud resource names are limited to 63 characters
pub const MAX_RESOURCE_NAME_LENGTH: usize = 63;

/// Cluster data a bastion is resolved against
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    /// Name of the `Cluster` object (the shoot's seed namespace)
    pub name: String,
    pub shoot: Shoot,
    pub cloud_profile: CloudProfileSpec,
}

impl ClusterInfo {
    /// Decodes the embedded shoot and cloud profile of a `Cluster`.
    pub fn from_cluster(cluster: &Cluster) -> Result<Self, BastionError> {
        let name = cluster.name_any();
        let shoot = cluster.shoot().map_err(|e| {
            BastionError::configuration(format!("could not decode shoot of cluster {name}: {e}"))
        })?;
        let cloud_profile = cluster.cloud_profile().map_err(|e| {
            BastionError::configuration(format!(
                "could not decode cloud profile of cluster {name}: {e}"
            ))
        })?;
        Ok(Self {
            name,
            shoot,
            cloud_profile: cloud_profile.spec,
        })
    }
}

/// Resolved bastion provisioning parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Base name; also the instance name and the firewall target tag
    pub bastion_instance_name: String,
    pub disk_name: String,
    /// Empty when it still has to be looked up from the region
    pub zone: String,
    pub region: String,
    /// `regions/<region>/subnetworks/<subnet>`
    pub subnetwork: String,
    pub project_id: String,
    /// `projects/<project>/global/networks/<vpc>`
    pub network: String,
    pub workers_cidr: String,
    pub image_path: String,
    pub machine_name: String,
}

impl Options {
    /// Same options pinned to `zone`
    pub fn with_zone(&self, zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            ..self.clone()
        }
    }
}

/// Stable base name for all cloud resources of a bastion.
///
/// `<first 33 chars of "cluster-bastion">-bastion-<first 5 hex chars of its SHA-256>`
pub fn generate_bastion_base_resource_name(
    cluster_name: &str,
    bastion_name: &str,
) -> Result<String, BastionError> {
    if cluster_name.is_empty() {
        return Err(BastionError::configuration("cluster name can't be empty"));
    }
    if bastion_name.is_empty() {
        return Err(BastionError::configuration("bastion name can't be empty"));
    }

    let static_name = format!("{cluster_name}-{bastion_name}");
    let hash = hex::encode(Sha256::digest(static_name.as_bytes()));
    let prefix: String = static_name.chars().take(MAX_LENGTH_FOR_BASE_NAME).collect();

    Ok(format!("{prefix}-bastion-{}", &hash[..5]))
}

/// Resolves the options for a bastion.
///
/// `project_id` comes from the credentials, `vpc_name` and `subnet_name`
/// from the infrastructure status.
pub fn determine_options(
    bastion: &Bastion,
    cluster: &ClusterInfo,
    project_id: &str,
    vpc_name: &str,
    subnet_name: &str,
) -> Result<Options, BastionError> {
    let provider_status = provider_status(bastion)?;
    let base_name = generate_bastion_base_resource_name(&cluster.name, &bastion.name_any())?;
    let region = cluster.shoot.spec.region.clone();

    let workers_cidr = workers_cidr(&cluster.shoot)?;
    let vm_details = determine_vm_details(&cluster.cloud_profile)?;
    let image_path = find_image_path(&cluster.cloud_profile, &vm_details)?;
    let zone = zone(&cluster.cloud_profile, &region, provider_status.as_ref());

    debug!(
        "Resolved bastion {} to machine {} with image {} in zone {:?}",
        base_name, vm_details.machine_name, image_path, zone
    );

    Ok(Options {
        disk_name: disk_resource_name(&base_name),
        subnetwork: format!("regions/{region}/subnetworks/{subnet_name}"),
        network: format!("projects/{project_id}/global/networks/{vpc_name}"),
        project_id: project_id.to_string(),
        machine_name: vm_details.machine_name,
        bastion_instance_name: base_name,
        zone,
        region,
        workers_cidr,
        image_path,
    })
}

/// Name of the bastion's boot disk
pub fn disk_resource_name(base_name: &str) -> String {
    format!("{base_name}-disk")
}

/// Decodes the persisted provider status, `None` before the first successful reconcile.
pub fn provider_status(bastion: &Bastion) -> Result<Option<BastionProviderStatus>, BastionError> {
    let Some(raw) = bastion
        .status
        .as_ref()
        .and_then(|s| s.provider_status.as_ref())
        .filter(|raw| !raw.is_null())
    else {
        return Ok(None);
    };
    serde_json::from_value(raw.clone())
        .map(Some)
        .map_err(|e| BastionError::configuration(format!("could not decode provider status: {e}")))
}

fn workers_cidr(shoot: &Shoot) -> Result<String, BastionError> {
    let raw = shoot
        .spec
        .provider
        .infrastructure_config
        .as_ref()
        .ok_or_else(|| BastionError::configuration("shoot has no infrastructure config"))?;
    let config: InfrastructureConfig = serde_json::from_value(raw.clone()).map_err(|e| {
        BastionError::configuration(format!("could not decode infrastructure config: {e}"))
    })?;
    config
        .workers_cidr()
        .map(str::to_string)
        .ok_or_else(|| BastionError::configuration("infrastructure config has no workers CIDR"))
}

/// Provider image reference for the resolved machine image version.
pub fn find_image_path(
    cloud_profile: &CloudProfileSpec,
    vm: &VmDetails,
) -> Result<String, BastionError> {
    let not_found = || {
        BastionError::configuration(format!(
            "no image found for machine image {:?} version {:?} and architecture {:?}",
            vm.image_base_name, vm.image_version, vm.architecture
        ))
    };

    let raw = cloud_profile.provider_config.as_ref().ok_or_else(not_found)?;
    let config: CloudProfileConfig = serde_json::from_value(raw.clone()).map_err(|e| {
        BastionError::configuration(format!("could not decode cloud profile config: {e}"))
    })?;

    config
        .machine_images
        .iter()
        .filter(|img| img.name == vm.image_base_name)
        .flat_map(|img| img.versions.iter())
        .filter(|v| v.version == vm.image_version)
        .find_map(|v| {
            if v.capability_flavors.is_empty() {
                let arch = v
                    .architecture
                    .as_deref()
                    .unwrap_or(crds::core::DEFAULT_ARCHITECTURE);
                return v
                    .image
                    .clone()
                    .filter(|image| arch == vm.architecture && !image.is_empty());
            }
            v.capability_flavors
                .iter()
                .find(|flavor| flavor.supports_architecture(&vm.architecture))
                .map(|flavor| flavor.image.clone())
        })
        .ok_or_else(not_found)
}

fn zone(
    cloud_profile: &CloudProfileSpec,
    region: &str,
    provider_status: Option<&BastionProviderStatus>,
) -> String {
    if let Some(status) = provider_status.filter(|s| !s.zone.is_empty()) {
        return status.zone.clone();
    }
    cloud_profile
        .regions
        .iter()
        .find(|r| r.name == region)
        .and_then(|r| r.zones.first())
        .map(|z| z.name.clone())
        .unwrap_or_default()
}
