//! Unit tests for machine type and image selection

#[cfg(test)]
mod tests {
    use crate::bastion::vm_details::*;
    use crate::error::BastionError;
    use crate::test_utils::*;
    use crds::core::{
        Bastion, BastionMachineImage, BastionMachineType, MachineImage, VersionClassification,
    };

    fn details(machine: &str, arch: &str, image: &str, version: &str) -> VmDetails {
        VmDetails {
            machine_name: machine.to_string(),
            architecture: arch.to_string(),
            image_base_name: image.to_string(),
            image_version: version.to_string(),
        }
    }

    fn add_version(
        spec: &mut crds::core::CloudProfileSpec,
        version: &str,
        classification: VersionClassification,
        archs: &[&str],
    ) {
        spec.machine_images[0]
            .versions
            .push(image_version(version, classification, archs));
    }

    fn bastion_image(name: &str, version: Option<&str>) -> Option<Bastion> {
        Some(Bastion {
            machine_type: None,
            machine_image: Some(BastionMachineImage {
                name: name.to_string(),
                version: version.map(str::to_string),
            }),
        })
    }

    #[test]
    fn test_single_supported_image_and_machine() {
        let spec = create_test_cloud_profile_spec();
        assert_eq!(
            determine_vm_details(&spec).unwrap(),
            details("small_machine", "amd64", "gardenlinux", "1.2.3")
        );
    }

    #[test]
    fn test_greatest_supported_version_wins() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "1.2.4", VersionClassification::Supported, &["amd64"]);
        assert_eq!(determine_vm_details(&spec).unwrap().image_version, "1.2.4");
    }

    #[test]
    fn test_explicit_version_overrides_greatest() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "1.2.4", VersionClassification::Supported, &["amd64"]);
        spec.bastion = bastion_image("gardenlinux", Some("1.2.3"));
        assert_eq!(determine_vm_details(&spec).unwrap().image_version, "1.2.3");
    }

    #[test]
    fn test_versions_compare_semantically() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "1.10.0", VersionClassification::Supported, &["amd64"]);
        add_version(&mut spec, "1.9.9", VersionClassification::Supported, &["amd64"]);
        assert_eq!(determine_vm_details(&spec).unwrap().image_version, "1.10.0");
    }

    #[test]
    fn test_short_versions_are_padded() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "2", VersionClassification::Supported, &["amd64"]);
        assert_eq!(determine_vm_details(&spec).unwrap().image_version, "2");
        assert_eq!(parse_version("1.2").unwrap(), semver::Version::new(1, 2, 0));
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn test_preview_and_deprecated_are_skipped() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "2.0.0", VersionClassification::Preview, &["amd64"]);
        add_version(&mut spec, "3.0.0", VersionClassification::Deprecated, &["amd64"]);
        assert_eq!(determine_vm_details(&spec).unwrap().image_version, "1.2.3");
    }

    #[test]
    fn test_explicit_preview_version_is_trusted() {
        let mut spec = create_test_cloud_profile_spec();
        add_version(&mut spec, "2.0.0", VersionClassification::Preview, &["arm64"]);
        spec.machine_types.push(machine_type("arm_machine", "2", "arm64"));
        spec.bastion = bastion_image("gardenlinux", Some("2.0.0"));

        assert_eq!(
            determine_vm_details(&spec).unwrap(),
            details("arm_machine", "arm64", "gardenlinux", "2.0.0")
        );
    }

    #[test]
    fn test_cheapest_machine_with_supported_architecture() {
        let mut spec = create_test_cloud_profile_spec();
        // No supported image for arm64, so the cheaper arm machine is ignored
        spec.machine_types = vec![
            machine_type("big", "8", "amd64"),
            machine_type("tiny_arm", "1", "arm64"),
            machine_type("medium", "2", "amd64"),
            machine_type("half", "500m", "amd64"),
        ];
        assert_eq!(determine_vm_details(&spec).unwrap().machine_name, "half");
    }

    #[test]
    fn test_first_machine_wins_cpu_ties() {
        let mut spec = create_test_cloud_profile_spec();
        spec.machine_types = vec![
            machine_type("second_listed_first", "2", "amd64"),
            machine_type("alphabetically_first", "2", "amd64"),
        ];
        assert_eq!(
            determine_vm_details(&spec).unwrap().machine_name,
            "second_listed_first"
        );
    }

    #[test]
    fn test_explicit_machine_type() {
        let mut spec = create_test_cloud_profile_spec();
        spec.machine_types.push(machine_type("large", "16", "amd64"));
        spec.bastion = Some(Bastion {
            machine_type: Some(BastionMachineType {
                name: "large".to_string(),
            }),
            machine_image: None,
        });
        assert_eq!(determine_vm_details(&spec).unwrap().machine_name, "large");
    }

    #[test]
    fn test_unknown_machine_type_fails() {
        let mut spec = create_test_cloud_profile_spec();
        spec.bastion = Some(Bastion {
            machine_type: Some(BastionMachineType {
                name: "unknown".to_string(),
            }),
            machine_image: None,
        });
        assert!(matches!(
            determine_vm_details(&spec),
            Err(BastionError::Configuration(_))
        ));
    }

    #[test]
    fn test_no_machine_for_architecture_fails() {
        let mut spec = create_test_cloud_profile_spec();
        spec.machine_types = vec![machine_type("arm", "2", "arm64")];
        let err = determine_vm_details(&spec).unwrap_err();
        assert_eq!(err.to_string(), "no suitable machine found");
    }

    #[test]
    fn test_unknown_image_and_version_fail() {
        let mut spec = create_test_cloud_profile_spec();
        spec.bastion = bastion_image("ubuntu", None);
        assert!(matches!(
            determine_vm_details(&spec),
            Err(BastionError::Configuration(_))
        ));

        spec.bastion = bastion_image("gardenlinux", Some("9.9.9"));
        assert!(matches!(
            determine_vm_details(&spec),
            Err(BastionError::Configuration(_))
        ));
    }

    #[test]
    fn test_first_image_with_matching_architecture() {
        let mut spec = create_test_cloud_profile_spec();
        spec.machine_images.insert(
            0,
            MachineImage {
                name: "arm-only".to_string(),
                versions: vec![image_version("5.0.0", VersionClassification::Supported, &["arm64"])],
            },
        );
        spec.machine_images.push(MachineImage {
            name: "ubuntu".to_string(),
            versions: vec![image_version("22.4.0", VersionClassification::Supported, &["amd64"])],
        });

        let vm = determine_vm_details(&spec).unwrap();
        assert_eq!(vm.architecture, "amd64");
        assert_eq!(vm.image_base_name, "gardenlinux");
    }

    #[test]
    fn test_result_is_architecture_consistent() {
        let mut spec = create_test_cloud_profile_spec();
        spec.machine_types = vec![
            machine_type("arm", "1", "arm64"),
            machine_type("amd", "2", "amd64"),
        ];
        add_version(&mut spec, "1.3.0", VersionClassification::Supported, &["arm64"]);

        let vm = determine_vm_details(&spec).unwrap();
        let chosen = spec.machine_images[0]
            .versions
            .iter()
            .find(|v| v.version == vm.image_version)
            .unwrap();
        assert_eq!(vm.machine_name, "arm");
        assert!(chosen.supports_architecture(&vm.architecture));
    }
}
