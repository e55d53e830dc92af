//! Test utilities for unit testing the bastion logic
//!
//! This module provides helpers for creating cloud profiles, clusters and
//! bastions shaped like the ones Gardener hands to the controller.

use crate::bastion::options::{ClusterInfo, Options, determine_options};
use crds::core::{
    AvailabilityZone, CloudProfileSpec, MachineImage, MachineImageVersion, MachineType, ObjectMeta,
    Region, Shoot, ShootProvider, ShootSpec, VersionClassification,
};
use crds::{Bastion, BastionIngressPolicy, BastionSpec, IpBlock};

pub const TEST_PROJECT: &str = "test-project";
pub const TEST_REGION: &str = "europe-west1";
pub const TEST_ZONE: &str = "europe-west1-b";
pub const TEST_CLUSTER: &str = "shoot--dev--test";
pub const TEST_BASTION: &str = "bastion1";
pub const TEST_WORKERS_CIDR: &str = "10.250.0.0/16";
pub const TEST_IMAGE_PATH: &str = "projects/gardenlinux-cloud/global/images/gardenlinux-gcp-1-2-3";

/// Helper to create a machine type
pub fn machine_type(name: &str, cpu: &str, architecture: &str) -> MachineType {
    MachineType {
        name: name.to_string(),
        cpu: cpu.to_string(),
        architecture: Some(architecture.to_string()),
    }
}

/// Helper to create a machine image version
pub fn image_version(
    version: &str,
    classification: VersionClassification,
    architectures: &[&str],
) -> MachineImageVersion {
    MachineImageVersion {
        version: version.to_string(),
        classification: Some(classification),
        architectures: architectures.iter().map(|a| a.to_string()).collect(),
    }
}

/// Cloud profile with one supported gardenlinux 1.2.3 (amd64) image and one
/// 4 CPU amd64 machine type
pub fn create_test_cloud_profile_spec() -> CloudProfileSpec {
    CloudProfileSpec {
        machine_types: vec![machine_type("small_machine", "4", "amd64")],
        machine_images: vec![MachineImage {
            name: "gardenlinux".to_string(),
            versions: vec![image_version("1.2.3", VersionClassification::Supported, &["amd64"])],
        }],
        regions: vec![Region {
            name: TEST_REGION.to_string(),
            zones: vec![
                AvailabilityZone {
                    name: TEST_ZONE.to_string(),
                },
                AvailabilityZone {
                    name: "europe-west1-c".to_string(),
                },
            ],
        }],
        bastion: None,
        provider_config: Some(serde_json::json!({
            "apiVersion": "gcp.provider.extensions.gardener.cloud/v1alpha1",
            "kind": "CloudProfileConfig",
            "machineImages": [{
                "name": "gardenlinux",
                "versions": [
                    {"version": "1.2.3", "image": TEST_IMAGE_PATH},
                    {
                        "version": "1.2.4",
                        "capabilityFlavors": [
                            {
                                "image": "projects/gardenlinux-cloud/global/images/gardenlinux-gcp-1-2-4",
                                "capabilities": {"architecture": ["amd64"]}
                            },
                            {
                                "image": "projects/gardenlinux-cloud/global/images/gardenlinux-gcp-arm-1-2-4",
                                "capabilities": {"architecture": ["arm64"]}
                            }
                        ]
                    }
                ]
            }]
        })),
    }
}

/// Helper to create the shoot of the test cluster
pub fn create_test_shoot() -> Shoot {
    Shoot {
        metadata: ObjectMeta {
            name: "test".to_string(),
            namespace: Some("garden-dev".to_string()),
        },
        spec: ShootSpec {
            region: TEST_REGION.to_string(),
            provider: ShootProvider {
                provider_type: "gcp".to_string(),
                infrastructure_config: Some(serde_json::json!({
                    "apiVersion": "gcp.provider.extensions.gardener.cloud/v1alpha1",
                    "kind": "InfrastructureConfig",
                    "networks": {"workers": TEST_WORKERS_CIDR}
                })),
            },
        },
    }
}

/// Helper to create the decoded test cluster
pub fn create_test_cluster_info() -> ClusterInfo {
    ClusterInfo {
        name: TEST_CLUSTER.to_string(),
        shoot: create_test_shoot(),
        cloud_profile: create_test_cloud_profile_spec(),
    }
}

/// Helper to create a test Bastion CRD without status
pub fn create_test_bastion(name: &str, namespace: &str, cidrs: &[&str]) -> Bastion {
    let mut bastion = Bastion::new(
        name,
        BastionSpec {
            provider_type: "gcp".to_string(),
            provider_config: None,
            user_data: Some("ZWNobyBoZWxsbw==".to_string()),
            ingress: cidrs
                .iter()
                .map(|cidr| BastionIngressPolicy {
                    ip_block: IpBlock {
                        cidr: cidr.to_string(),
                    },
                })
                .collect(),
        },
    );
    bastion.metadata.namespace = Some(namespace.to_string());
    bastion
}

/// Options of the default test bastion
pub fn create_test_options() -> Options {
    let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &["213.69.151.0/24"]);
    determine_options(
        &bastion,
        &create_test_cluster_info(),
        TEST_PROJECT,
        "shoot--dev--test",
        "shoot--dev--test-nodes",
    )
    .unwrap()
}
