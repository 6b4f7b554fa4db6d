//! Unit tests for the teardown pipeline

#[cfg(test)]
mod tests {
    use crate::error::ProvisionError;
    use crate::teardown::{TeardownPipeline, resource_for};
    use crate::wait::WaitConfig;
    use aws_client::{
        CloudProvider, MockCall, MockCloudProvider, PolicyDocument, ResourceKind, ResourceRef,
        ResourceSpec,
    };
    use crds::{InventorySpec, ResourceRole};
    use std::time::Duration;

    fn termination() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create a full set of resources directly on the mock
    async fn provisioned(mock: &MockCloudProvider) -> InventorySpec {
        let mut inv = InventorySpec::for_region(mock.region());
        let vpc = mock
            .create(&ResourceSpec::Vpc {
                cidr: "10.0.0.0/16".to_string(),
            })
            .await
            .unwrap();
        inv.set(ResourceRole::Vpc, vpc.id());
        let rtb = mock
            .lookup(&ResourceSpec::RouteTable {
                vpc_id: inv.vpc_id.clone(),
            })
            .await
            .unwrap();
        inv.set(ResourceRole::RouteTable, rtb.id());

        let specs = vec![
            (
                ResourceRole::Subnet,
                ResourceSpec::Subnet {
                    vpc_id: inv.vpc_id.clone(),
                    cidr: "10.0.0.0/18".to_string(),
                },
            ),
            (
                ResourceRole::InternetGateway,
                ResourceSpec::InternetGateway {
                    vpc_id: inv.vpc_id.clone(),
                    route_table_id: inv.route_table_id.clone(),
                },
            ),
            (
                ResourceRole::SecurityGroup,
                ResourceSpec::SecurityGroup {
                    vpc_id: inv.vpc_id.clone(),
                    name: "demo-security-group".to_string(),
                    description: "test".to_string(),
                    ingress_ports: vec![22],
                },
            ),
            (
                ResourceRole::ArtifactBucket,
                ResourceSpec::Bucket {
                    name: "demo-artifacts".to_string(),
                },
            ),
            (
                ResourceRole::NodePolicy,
                ResourceSpec::IamPolicy {
                    name: "demo-node-policy".to_string(),
                    document: PolicyDocument::NodeArtifacts,
                },
            ),
            (
                ResourceRole::NodeRole,
                ResourceSpec::IamRole {
                    name: "demo-node-role".to_string(),
                    policy_arn: "arn:aws:iam::000000000000:policy/demo-node-policy".to_string(),
                },
            ),
            (
                ResourceRole::InstanceProfile,
                ResourceSpec::InstanceProfile {
                    name: "demo-profile".to_string(),
                    role_name: "demo-node-role".to_string(),
                },
            ),
            (
                ResourceRole::ControllerPolicy,
                ResourceSpec::IamPolicy {
                    name: "demo-infra-policy".to_string(),
                    document: PolicyDocument::ControllerAdmin,
                },
            ),
            (
                ResourceRole::ControllerGroup,
                ResourceSpec::IamGroup {
                    name: "demo-infra-group".to_string(),
                    policy_arn: "arn:aws:iam::000000000000:policy/demo-infra-policy".to_string(),
                },
            ),
            (
                ResourceRole::ControllerUser,
                ResourceSpec::IamUser {
                    name: "demo-infra-user".to_string(),
                    group_name: "demo-infra-group".to_string(),
                },
            ),
        ];
        for (role, spec) in specs {
            let created = mock.create(&spec).await.unwrap();
            inv.set(role, created.id());
            if let Some(key) = created.credentials {
                inv.access_key_id = key.access_key_id;
            }
        }

        let instance = mock
            .create(&ResourceSpec::Instance(Box::new(aws_client::InstanceSpec {
                cluster: "demo".to_string(),
                machine_type: "boot-master".to_string(),
                image_id: "ami-1".to_string(),
                key_name: "ops".to_string(),
                instance_type: "t2.medium".to_string(),
                subnet_id: inv.subnet_id.clone(),
                security_group_id: inv.security_group_id.clone(),
                instance_profile: inv.instance_profile_id.clone(),
                user_data: String::new(),
            })))
            .await
            .unwrap();
        inv.set(ResourceRole::Instance, instance.id());
        inv
    }

    /// Launch a pool instance into the inventory's subnet and security group
    async fn launch_worker(mock: &MockCloudProvider, inventory: &InventorySpec, cluster: &str) -> ResourceRef {
        mock.create(&ResourceSpec::Instance(Box::new(aws_client::InstanceSpec {
            cluster: cluster.to_string(),
            machine_type: "worker".to_string(),
            image_id: "ami-1".to_string(),
            key_name: "ops".to_string(),
            instance_type: "t2.medium".to_string(),
            subnet_id: inventory.subnet_id.clone(),
            security_group_id: inventory.security_group_id.clone(),
            instance_profile: inventory.instance_profile_id.clone(),
            user_data: String::new(),
        })))
        .await
        .unwrap()
        .resource
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_in_exact_reverse_order() {
        let mock = MockCloudProvider::new("us-east-2").terminate_after_polls(3);
        let inventory = provisioned(&mock).await;

        let report = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        let expected: Vec<ResourceRole> = ResourceRole::ALL
            .into_iter()
            .rev()
            .filter(|role| *role != ResourceRole::RouteTable)
            .collect();
        let roles: Vec<ResourceRole> = report.deleted.iter().map(|(role, _)| *role).collect();
        assert_eq!(roles, expected);
        assert!(report.already_gone.is_empty());

        let kinds: Vec<ResourceKind> = mock.deleted().iter().map(ResourceRef::kind).collect();
        assert_eq!(kinds.first(), Some(&ResourceKind::Instance));
        assert_eq!(kinds.last(), Some(&ResourceKind::Vpc));
        assert_eq!(mock.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_on_termination_before_network_deletes() {
        let mock = MockCloudProvider::new("us-east-2").terminate_after_polls(2);
        let inventory = provisioned(&mock).await;

        TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        let calls = mock.calls();
        let terminated_at = calls
            .iter()
            .rposition(|c| matches!(c, MockCall::Describe(ResourceRef::Instance { .. })))
            .unwrap();
        let first_network_delete = calls
            .iter()
            .position(|c| {
                matches!(
                    c,
                    MockCall::Delete(
                        ResourceRef::SecurityGroup { .. }
                            | ResourceRef::Subnet { .. }
                            | ResourceRef::InternetGateway { .. }
                            | ResourceRef::Vpc { .. }
                    )
                )
            })
            .unwrap();
        assert!(terminated_at < first_network_delete);
        let polls = calls
            .iter()
            .filter(|c| matches!(c, MockCall::Describe(ResourceRef::Instance { .. })))
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_gone_is_not_fatal() {
        let mock = MockCloudProvider::new("us-east-2");
        let mut inventory = provisioned(&mock).await;
        mock.delete(&ResourceRef::Bucket {
            name: inventory.bucket_id.clone(),
        })
        .await
        .unwrap();
        inventory.set(ResourceRole::ControllerUser, "user-gone");

        let report = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        let gone: Vec<ResourceRole> = report.already_gone.iter().map(|(role, _)| *role).collect();
        assert_eq!(gone, vec![ResourceRole::ControllerUser, ResourceRole::ArtifactBucket]);
        assert_eq!(report.deleted.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_aborts() {
        let mock = MockCloudProvider::new("us-east-2").fail_delete_of(ResourceKind::IamRole);
        let inventory = provisioned(&mock).await;

        let err = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap_err();

        match err {
            ProvisionError::Teardown { role, resource, .. } => {
                assert_eq!(role, ResourceRole::NodeRole);
                assert_eq!(resource, "iam-role demo-node-role");
            }
            other => panic!("unexpected {other:?}"),
        }
        let kinds: Vec<ResourceKind> = mock.deleted().iter().map(ResourceRef::kind).collect();
        assert_eq!(kinds.last(), Some(&ResourceKind::IamRole));
        assert_eq!(kinds.len(), 6);
        assert!(!kinds.contains(&ResourceKind::Vpc));
    }

    #[tokio::test]
    async fn test_partial_inventory_deletes_only_recorded_roles() {
        let mock = MockCloudProvider::new("us-east-2");
        let vpc = mock
            .create(&ResourceSpec::Vpc {
                cidr: "10.0.0.0/16".to_string(),
            })
            .await
            .unwrap();
        let mut inventory = InventorySpec::for_region("us-east-2");
        inventory.set(ResourceRole::Vpc, vpc.id());

        let report = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        assert_eq!(report.deleted, vec![(ResourceRole::Vpc, vpc.resource)]);
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_termination_wait_is_bounded() {
        let mock = MockCloudProvider::new("us-east-2").terminate_after_polls(1000);
        let inventory = provisioned(&mock).await;

        let err = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Timeout { .. }));
        assert!(!mock.deleted().iter().any(|r| matches!(r, ResourceRef::Vpc { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_instances_are_terminated_before_the_inventory() {
        let mock = MockCloudProvider::new("us-east-2").terminate_after_polls(1);
        let mut inventory = provisioned(&mock).await;
        inventory.cluster = "demo".to_string();
        let first = launch_worker(&mock, &inventory, "demo").await;
        let second = launch_worker(&mock, &inventory, "demo").await;

        let report = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        assert_eq!(report.drained, vec![first.clone(), second.clone()]);
        assert_eq!(report.deleted[0].0, ResourceRole::Instance);
        assert_eq!(report.deleted.len(), 12);
        let deleted = mock.deleted();
        assert_eq!(&deleted[..3], &[
            first,
            second,
            ResourceRef::Instance {
                id: inventory.instance_id.clone(),
            },
        ]);
        assert_eq!(mock.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_clusters_are_not_drained() {
        let mock = MockCloudProvider::new("us-east-2");
        let mut inventory = provisioned(&mock).await;
        inventory.cluster = "demo".to_string();
        mock.seed_instance(&aws_client::PoolSelector::new("other", "worker"), aws_client::InstanceState::Running);

        let report = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap();

        assert!(report.drained.is_empty());
        assert_eq!(mock.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_in_use_aborts_without_cluster_name() {
        let mock = MockCloudProvider::new("us-east-2");
        let inventory = provisioned(&mock).await;
        launch_worker(&mock, &inventory, "demo").await;

        let err = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap_err();

        match err {
            ProvisionError::Teardown { role, source, .. } => {
                assert_eq!(role, ResourceRole::SecurityGroup);
                assert!(matches!(source, aws_client::CloudError::DependencyViolation { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!mock.deleted().iter().any(|r| matches!(r, ResourceRef::Vpc { .. })));
    }

    #[tokio::test]
    async fn test_drain_listing_failure_deletes_nothing() {
        let mock = MockCloudProvider::new("us-east-2").fail_listing();
        let mut inventory = provisioned(&mock).await;
        inventory.cluster = "demo".to_string();

        let err = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Drain { ref cluster, .. } if cluster == "demo"));
        assert!(mock.deleted().is_empty());
    }

    #[test]
    fn test_route_table_is_never_deleted() {
        let mut inventory = InventorySpec::for_region("us-east-2");
        inventory.set(ResourceRole::RouteTable, "rtb-1");
        assert_eq!(resource_for(ResourceRole::RouteTable, &inventory), None);
    }

    #[test]
    fn test_user_handle_carries_access_key() {
        let mut inventory = InventorySpec::for_region("us-east-2");
        inventory.set(ResourceRole::ControllerGroup, "demo-infra-group");
        inventory.set(ResourceRole::ControllerUser, "demo-infra-user");
        inventory.access_key_id = "AKIA1".to_string();
        assert_eq!(
            resource_for(ResourceRole::ControllerUser, &inventory),
            Some(ResourceRef::IamUser {
                name: "demo-infra-user".to_string(),
                group_name: "demo-infra-group".to_string(),
                access_key_id: Some("AKIA1".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_region_mismatch_is_rejected() {
        let mock = MockCloudProvider::new("us-east-2");
        let inventory = InventorySpec::for_region("eu-west-1");
        let err = TeardownPipeline::new(termination())
            .run(&mock, &inventory)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfig(_)));
    }
}
