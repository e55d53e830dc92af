//! Cluster CRD
//!
//! Cluster-scoped resource named after the shoot's seed namespace
//! (`shoot--<project>--<name>`). Carries the shoot, seed and cloud profile
//! as raw objects.

use crate::core::{CloudProfile, Shoot};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Cluster"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Raw `CloudProfile` object
    #[schemars(schema_with = "crate::raw_extension")]
    pub cloud_profile: serde_json::Value,

    /// Raw `Seed` object
    #[schemars(schema_with = "crate::raw_extension")]
    pub seed: serde_json::Value,

    /// Raw `Shoot` object
    #[schemars(schema_with = "crate::raw_extension")]
    pub shoot: serde_json::Value,
}

impl Cluster {
    /// Decodes the embedded shoot.
    pub fn shoot(&self) -> Result<Shoot, serde_json::Error> {
        serde_json::from_value(self.spec.shoot.clone())
    }

    /// Decodes the embedded cloud profile.
    pub fn cloud_profile(&self) -> Result<CloudProfile, serde_json::Error> {
        serde_json::from_value(self.spec.cloud_profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_embedded_objects() {
        let cluster = Cluster::new(
            "shoot--dev--foo",
            ClusterSpec {
                cloud_profile: serde_json::json!({
                    "metadata": {"name": "gcp"},
                    "spec": {"regions": [{"name": "europe-west1"}]}
                }),
                seed: serde_json::json!({}),
                shoot: serde_json::json!({
                    "metadata": {"name": "foo", "namespace": "garden-dev"},
                    "spec": {
                        "region": "europe-west1",
                        "provider": {"type": "gcp", "infrastructureConfig": {"networks": {"workers": "10.250.0.0/16"}}}
                    }
                }),
            },
        );

        let shoot = cluster.shoot().unwrap();
        assert_eq!(shoot.metadata.name, "foo");
        assert_eq!(shoot.spec.region, "europe-west1");
        assert_eq!(shoot.spec.provider.provider_type, "gcp");
        assert!(shoot.spec.provider.infrastructure_config.is_some());

        let profile = cluster.cloud_profile().unwrap();
        assert_eq!(profile.metadata.name, "gcp");
        assert_eq!(profile.spec.regions[0].name, "europe-west1");
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let cluster = Cluster::new(
            "shoot--dev--foo",
            ClusterSpec {
                shoot: serde_json::json!({"spec": {"region": 42}}),
                ..Default::default()
            },
        );
        assert!(cluster.shoot().is_err());
    }
}
