//! Instance and disk request bodies.

use crate::bastion::options::Options;
use crate::error::BastionError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::BastionSpec;
use gcp_client::{AccessConfig, AttachedDisk, Disk, Instance, Metadata, MetadataItem, NetworkInterface, Tags};
use std::collections::BTreeMap;

/// Boot disk size in GB
pub const DISK_SIZE_GB: u32 = 10;

const DISK_TYPE: &str = "pd-balanced";

/// Decodes the base64 user data of a bastion into its startup script.
pub fn startup_script(spec: &BastionSpec) -> Result<String, BastionError> {
    let Some(encoded) = spec.user_data.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(String::new());
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| BastionError::configuration(format!("bastion user data is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| BastionError::configuration(format!("bastion user data is not valid UTF-8: {e}")))
}

fn name_labels(opts: &Options) -> BTreeMap<String, String> {
    BTreeMap::from([("name".to_string(), opts.bastion_instance_name.clone())])
}

/// URL of the bastion's boot disk, as referenced by the instance
pub fn disk_url(opts: &Options) -> String {
    format!(
        "projects/{}/zones/{}/disks/{}",
        opts.project_id, opts.zone, opts.disk_name
    )
}

/// Bastion VM with a public NAT address, booting from the bastion disk.
pub fn instance_spec(opts: &Options, user_data: &str, shoot_name: &str) -> Instance {
    Instance {
        name: opts.bastion_instance_name.clone(),
        description: Some(format!("Bastion for {shoot_name}")),
        zone: Some(opts.zone.clone()),
        machine_type: Some(format!("zones/{}/machineTypes/{}", opts.zone, opts.machine_name)),
        disks: vec![AttachedDisk {
            auto_delete: Some(false),
            boot: Some(true),
            device_name: Some(opts.disk_name.clone()),
            source: Some(disk_url(opts)),
        }],
        network_interfaces: vec![NetworkInterface {
            network: Some(opts.network.clone()),
            subnetwork: Some(opts.subnetwork.clone()),
            access_configs: vec![AccessConfig {
                name: Some("External NAT".to_string()),
                access_type: Some("ONE_TO_ONE_NAT".to_string()),
                nat_ip: None,
            }],
            network_ip: None,
        }],
        tags: Some(Tags {
            items: vec![opts.bastion_instance_name.clone()],
        }),
        metadata: Some(Metadata {
            items: vec![
                MetadataItem {
                    key: "startup-script".to_string(),
                    value: Some(user_data.to_string()),
                },
                MetadataItem {
                    key: "block-project-ssh-keys".to_string(),
                    value: Some("TRUE".to_string()),
                },
            ],
        }),
        labels: name_labels(opts),
        deletion_protection: Some(false),
        ..Default::default()
    }
}

/// Boot disk created from the resolved machine image.
pub fn disk_spec(opts: &Options) -> Disk {
    Disk {
        name: opts.disk_name.clone(),
        size_gb: Some(DISK_SIZE_GB.to_string()),
        source_image: Some(opts.image_path.clone()),
        zone: Some(opts.zone.clone()),
        disk_type: Some(format!(
            "projects/{}/zones/{}/diskTypes/{DISK_TYPE}",
            opts.project_id, opts.zone
        )),
        labels: name_labels(opts),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_options;

    #[test]
    fn test_instance_spec() {
        let opts = create_test_options();
        let instance = instance_spec(&opts, "#!/bin/bash\necho hi", "my-shoot");

        assert_eq!(instance.name, opts.bastion_instance_name);
        assert_eq!(instance.description.as_deref(), Some("Bastion for my-shoot"));
        assert_eq!(
            instance.machine_type.as_deref(),
            Some("zones/europe-west1-b/machineTypes/small_machine")
        );
        assert_eq!(
            instance.disks[0].source,
            Some(format!("projects/test-project/zones/europe-west1-b/disks/{}", opts.disk_name))
        );
        assert_eq!(instance.disks[0].auto_delete, Some(false));
        assert_eq!(
            instance.network_interfaces[0].access_configs[0].access_type.as_deref(),
            Some("ONE_TO_ONE_NAT")
        );
        assert_eq!(instance.tags.unwrap().items, vec![opts.bastion_instance_name.clone()]);

        let metadata = instance.metadata.unwrap().items;
        assert_eq!(metadata[0].key, "startup-script");
        assert_eq!(metadata[0].value.as_deref(), Some("#!/bin/bash\necho hi"));
        assert_eq!(metadata[1].key, "block-project-ssh-keys");
        assert_eq!(metadata[1].value.as_deref(), Some("TRUE"));
    }

    #[test]
    fn test_disk_spec() {
        let opts = create_test_options();
        let disk = disk_spec(&opts);

        assert_eq!(disk.name, opts.disk_name);
        assert_eq!(disk.size_gb.as_deref(), Some("10"));
        assert_eq!(
            disk.disk_type.as_deref(),
            Some("projects/test-project/zones/europe-west1-b/diskTypes/pd-balanced")
        );
        assert_eq!(disk.source_image.as_deref(), Some(opts.image_path.as_str()));
        assert_eq!(disk.labels.get("name"), Some(&opts.bastion_instance_name));
    }

    #[test]
    fn test_builders_are_deterministic() {
        let opts = create_test_options();
        let a = serde_json::to_string(&instance_spec(&opts, "x", "s")).unwrap();
        let b = serde_json::to_string(&instance_spec(&opts, "x", "s")).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&disk_spec(&opts)).unwrap(),
            serde_json::to_string(&disk_spec(&opts)).unwrap()
        );
    }

    #[test]
    fn test_startup_script() {
        let mut spec = BastionSpec::default();
        assert_eq!(startup_script(&spec).unwrap(), "");

        spec.user_data = Some("ZWNobyBoZWxsbw==".to_string());
        assert_eq!(startup_script(&spec).unwrap(), "echo hello");

        spec.user_data = Some("not base64!".to_string());
        assert!(matches!(startup_script(&spec), Err(BastionError::Configuration(_))));
    }
}
