//! Unit tests for bastion options

#[cfg(test)]
mod tests {
    use crate::bastion::options::*;
    use crate::bastion::vm_details::VmDetails;
    use crate::error::BastionError;
    use crate::test_utils::*;
    use crds::BastionStatus;

    fn options_for(bastion: &crds::Bastion, cluster: &ClusterInfo) -> Result<Options, BastionError> {
        determine_options(bastion, cluster, TEST_PROJECT, "vpc-1", "nodes-1")
    }

    #[test]
    fn test_base_name_is_idempotent() {
        let first = generate_bastion_base_resource_name("clusterName", "shortName").unwrap();
        let second = generate_bastion_base_resource_name("clusterName", "shortName").unwrap();
        assert_eq!(first, "clusterName-shortName-bastion-79641");
        assert_eq!(first, second);
    }

    #[test]
    fn test_base_name_does_not_exceed_limit() {
        let name = generate_bastion_base_resource_name(
            "clusterName",
            "LetsExceed63LenLimit012345678901234567890123456789012345678901234567890123456789",
        )
        .unwrap();
        assert_eq!(name, "clusterName-LetsExceed63LenLimit0-bastion-139c4");
        assert!(name.len() <= MAX_RESOURCE_NAME_LENGTH);
    }

    #[test]
    fn test_base_name_differs_for_different_inputs() {
        let a = generate_bastion_base_resource_name("cluster", "bastion-a").unwrap();
        let b = generate_bastion_base_resource_name("cluster", "bastion-b").unwrap();
        assert_ne!(a, b);

        // Same truncated prefix, different hash
        let long = "x".repeat(40);
        let c = generate_bastion_base_resource_name("cluster", &format!("{long}1")).unwrap();
        let d = generate_bastion_base_resource_name("cluster", &format!("{long}2")).unwrap();
        assert_ne!(c, d);
        assert!(c.len() <= MAX_RESOURCE_NAME_LENGTH);
    }

    #[test]
    fn test_base_name_requires_names() {
        assert!(matches!(
            generate_bastion_base_resource_name("", "bastion"),
            Err(BastionError::Configuration(_))
        ));
        assert!(matches!(
            generate_bastion_base_resource_name("cluster", ""),
            Err(BastionError::Configuration(_))
        ));
    }

    #[test]
    fn test_determine_options() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &["213.69.151.0/24"]);
        let opts = options_for(&bastion, &create_test_cluster_info()).unwrap();

        assert_eq!(opts.bastion_instance_name, "shoot--dev--test-bastion1-bastion-7675f");
        assert_eq!(opts.disk_name, "shoot--dev--test-bastion1-bastion-7675f-disk");
        assert_eq!(opts.zone, TEST_ZONE);
        assert_eq!(opts.region, TEST_REGION);
        assert_eq!(opts.subnetwork, "regions/europe-west1/subnetworks/nodes-1");
        assert_eq!(opts.network, "projects/test-project/global/networks/vpc-1");
        assert_eq!(opts.project_id, TEST_PROJECT);
        assert_eq!(opts.workers_cidr, TEST_WORKERS_CIDR);
        assert_eq!(opts.image_path, TEST_IMAGE_PATH);
        assert_eq!(opts.machine_name, "small_machine");
    }

    #[test]
    fn test_persisted_zone_wins() {
        let mut bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        bastion.status = Some(BastionStatus {
            provider_status: Some(serde_json::json!({"zone": "europe-west1-d"})),
            ..Default::default()
        });
        let opts = options_for(&bastion, &create_test_cluster_info()).unwrap();
        assert_eq!(opts.zone, "europe-west1-d");
    }

    #[test]
    fn test_zone_left_empty_for_unknown_region() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let mut cluster = create_test_cluster_info();
        cluster.shoot.spec.region = "us-east1".to_string();
        let opts = options_for(&bastion, &cluster).unwrap();
        assert_eq!(opts.zone, "");
        assert_eq!(opts.with_zone("us-east1-b").zone, "us-east1-b");
    }

    #[test]
    fn test_deprecated_worker_field() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let mut cluster = create_test_cluster_info();
        cluster.shoot.spec.provider.infrastructure_config =
            Some(serde_json::json!({"networks": {"worker": "10.1.0.0/16"}}));
        assert_eq!(options_for(&bastion, &cluster).unwrap().workers_cidr, "10.1.0.0/16");
    }

    #[test]
    fn test_missing_workers_cidr_fails() {
        let bastion = create_test_bastion(TEST_BASTION, TEST_CLUSTER, &[]);
        let mut cluster = create_test_cluster_info();
        cluster.shoot.spec.provider.infrastructure_config = Some(serde_json::json!({"networks": {}}));
        assert!(matches!(
            options_for(&bastion, &cluster),
            Err(BastionError::Configuration(_))
        ));

        cluster.shoot.spec.provider.infrastructure_config = None;
        assert!(matches!(
            options_for(&bastion, &cluster),
            Err(BastionError::Configuration(_))
        ));
    }

    #[test]
    fn test_image_path_from_capability_flavors() {
        let profile = create_test_cloud_profile_spec();
        let vm = VmDetails {
            machine_name: "arm_machine".to_string(),
            architecture: "arm64".to_string(),
            image_base_name: "gardenlinux".to_string(),
            image_version: "1.2.4".to_string(),
        };
        assert_eq!(
            find_image_path(&profile, &vm).unwrap(),
            "projects/gardenlinux-cloud/global/images/gardenlinux-gcp-arm-1-2-4"
        );
    }

    #[test]
    fn test_image_path_requires_matching_architecture() {
        let profile = create_test_cloud_profile_spec();
        // Legacy entry without architecture means amd64
        let vm = VmDetails {
            machine_name: "arm_machine".to_string(),
            architecture: "arm64".to_string(),
            image_base_name: "gardenlinux".to_string(),
            image_version: "1.2.3".to_string(),
        };
        assert!(matches!(
            find_image_path(&profile, &vm),
            Err(BastionError::Configuration(_))
        ));
    }

    #[test]
    fn test_cluster_info_from_cluster() {
        let cluster = crds::Cluster::new(
            TEST_CLUSTER,
            crds::ClusterSpec {
                cloud_profile: serde_json::json!({
                    "metadata": {"name": "gcp"},
                    "spec": serde_json::to_value(create_test_cloud_profile_spec()).unwrap()
                }),
                seed: serde_json::json!({}),
                shoot: serde_json::to_value(create_test_shoot()).unwrap(),
            },
        );
        let info = ClusterInfo::from_cluster(&cluster).unwrap();
        assert_eq!(info.name, TEST_CLUSTER);
        assert_eq!(info.shoot.spec.region, TEST_REGION);
        assert_eq!(info.cloud_profile.machine_types.len(), 1);
    }
}
