//! Unit tests for the create pipeline

#[cfg(test)]
mod tests {
    use crate::error::ProvisionError;
    use crate::pipeline::{CreatePipeline, PipelineState, Step};
    use crate::wait::WaitConfig;
    use aws_client::{
        InstanceSpec, MockCall, MockCloudProvider, PolicyDocument, ResourceKind, ResourceRef,
        ResourceSpec,
    };
    use crds::ResourceRole;
    use std::time::Duration;

    fn termination() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }

    fn vpc_step(role: ResourceRole) -> Step {
        Step::create(role, |_| {
            Ok(ResourceSpec::Vpc {
                cidr: "10.0.0.0/16".to_string(),
            })
        })
    }

    fn subnet_step() -> Step {
        Step::create(ResourceRole::Subnet, |state| {
            Ok(ResourceSpec::Subnet {
                vpc_id: state.id(ResourceRole::Vpc)?,
                cidr: "10.0.0.0/18".to_string(),
            })
        })
    }

    fn bucket_step() -> Step {
        Step::create(ResourceRole::ArtifactBucket, |_| {
            Ok(ResourceSpec::Bucket {
                name: "demo-artifacts".to_string(),
            })
        })
    }

    fn policy_step() -> Step {
        Step::create(ResourceRole::NodePolicy, |_| {
            Ok(ResourceSpec::IamPolicy {
                name: "demo-node-policy".to_string(),
                document: PolicyDocument::NodeArtifacts,
            })
        })
    }

    fn instance_step() -> Step {
        Step::create(ResourceRole::Instance, |state| {
            let credentials = state
                .credentials
                .as_ref()
                .map(|key| key.access_key_id.clone())
                .unwrap_or_default();
            Ok(ResourceSpec::Instance(Box::new(InstanceSpec {
                cluster: "demo".to_string(),
                machine_type: "boot-master".to_string(),
                image_id: "ami-1".to_string(),
                key_name: "ops".to_string(),
                instance_type: "t2.medium".to_string(),
                subnet_id: state.inventory.subnet_id.clone(),
                security_group_id: String::new(),
                instance_profile: String::new(),
                user_data: credentials,
            })))
        })
    }

    #[tokio::test]
    async fn test_failure_at_step_k_rolls_back_prior_steps_in_reverse() {
        for n in 1..=6usize {
            for k in 1..=n {
                let mock = MockCloudProvider::new("us-east-2").fail_nth_create(k);
                let mut pipeline = CreatePipeline::new(termination());
                for i in 0..n {
                    pipeline = pipeline.step(vpc_step(ResourceRole::ALL[i]));
                }

                let err = pipeline
                    .run(&mock, PipelineState::for_region("us-east-2"))
                    .await
                    .unwrap_err();

                match err {
                    ProvisionError::Create {
                        role,
                        rolled_back,
                        rollback_failures,
                        ..
                    } => {
                        assert_eq!(role, ResourceRole::ALL[k - 1], "n={n} k={k}");
                        assert_eq!(rolled_back, k - 1, "n={n} k={k}");
                        assert_eq!(rollback_failures, 0);
                    }
                    other => panic!("unexpected {other:?}"),
                }

                let expected: Vec<ResourceRef> = (1..k)
                    .rev()
                    .map(|i| ResourceRef::Vpc {
                        id: format!("vpc-{i:08x}"),
                    })
                    .collect();
                assert_eq!(mock.deleted(), expected, "n={n} k={k}");
                assert_eq!(mock.created_kinds().len(), k, "no step after the failure runs");
                assert_eq!(mock.live_count(), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_rollback_continues_past_failed_delete() {
        let mock = MockCloudProvider::new("us-east-2")
            .fail_create_of(ResourceKind::IamPolicy)
            .fail_delete_of(ResourceKind::Bucket);
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(bucket_step())
            .step(policy_step());

        let err = pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Create {
                role: ResourceRole::NodePolicy,
                rolled_back: 1,
                rollback_failures: 1,
                ..
            }
        ));
        let deleted: Vec<ResourceKind> = mock.deleted().iter().map(ResourceRef::kind).collect();
        assert_eq!(deleted, vec![ResourceKind::Bucket, ResourceKind::Vpc]);
    }

    #[tokio::test]
    async fn test_lookup_is_recorded_but_never_rolled_back() {
        let mock = MockCloudProvider::new("us-east-2").fail_create_of(ResourceKind::Bucket);
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(Step::lookup(ResourceRole::RouteTable, |state| {
                Ok(ResourceSpec::RouteTable {
                    vpc_id: state.id(ResourceRole::Vpc)?,
                })
            }))
            .step(subnet_step())
            .step(bucket_step());

        pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap_err();

        let deleted: Vec<ResourceKind> = mock.deleted().iter().map(ResourceRef::kind).collect();
        assert_eq!(deleted, vec![ResourceKind::Subnet, ResourceKind::Vpc]);
        assert!(mock.calls().contains(&MockCall::Lookup(ResourceKind::RouteTable)));
    }

    #[tokio::test]
    async fn test_builder_failure_compensates() {
        let mock = MockCloudProvider::new("us-east-2");
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(Step::create(ResourceRole::InstanceProfile, |state| {
                Ok(ResourceSpec::InstanceProfile {
                    name: "demo-profile".to_string(),
                    role_name: state.id(ResourceRole::NodeRole)?,
                })
            }));

        let err = pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Build {
                role: ResourceRole::InstanceProfile,
                rolled_back: 1,
                ..
            }
        ));
        assert_eq!(mock.created_kinds(), vec![ResourceKind::Vpc]);
        assert_eq!(mock.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_credentials_reach_later_steps_but_not_inventory() {
        let mock = MockCloudProvider::new("us-east-2");
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(subnet_step())
            .step(Step::create(ResourceRole::ControllerUser, |_| {
                Ok(ResourceSpec::IamUser {
                    name: "demo-infra-user".to_string(),
                    group_name: "demo-infra-group".to_string(),
                })
            }))
            .step(instance_step());

        let provisioned = pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap();

        let credentials = provisioned.credentials.expect("credentials issued");
        let inventory = &provisioned.inventory;
        assert_eq!(inventory.iam_user_id, "demo-infra-user");
        assert_eq!(inventory.access_key_id, credentials.access_key_id);
        assert!(!serde_json::to_string(inventory).unwrap().contains(&credentials.secret_access_key));

        let instance_id = inventory.get(ResourceRole::Instance).unwrap();
        let spec = mock.instance_spec(instance_id).unwrap();
        assert_eq!(spec.user_data, credentials.access_key_id);
        assert_eq!(spec.subnet_id, inventory.subnet_id);
        assert_eq!(provisioned.created.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_step_delays_dependents() {
        let mock = MockCloudProvider::new("us-east-2");
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(Step::wait("settle", Duration::from_secs(15)))
            .step(subnet_step());

        let start = tokio::time::Instant::now();
        pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(15));
        assert_eq!(mock.created_kinds(), vec![ResourceKind::Vpc, ResourceKind::Subnet]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instance_rollback_waits_for_termination() {
        let mock = MockCloudProvider::new("us-east-2")
            .terminate_after_polls(2)
            .fail_create_of(ResourceKind::Bucket);
        let pipeline = CreatePipeline::new(termination())
            .step(vpc_step(ResourceRole::Vpc))
            .step(subnet_step())
            .step(instance_step())
            .step(bucket_step());

        pipeline
            .run(&mock, PipelineState::for_region("us-east-2"))
            .await
            .unwrap_err();

        let calls = mock.calls();
        let instance_delete = calls
            .iter()
            .position(|c| matches!(c, MockCall::Delete(ResourceRef::Instance { .. })))
            .unwrap();
        let subnet_delete = calls
            .iter()
            .position(|c| matches!(c, MockCall::Delete(ResourceRef::Subnet { .. })))
            .unwrap();
        let describes = calls[instance_delete..subnet_delete]
            .iter()
            .filter(|c| matches!(c, MockCall::Describe(_)))
            .count();
        assert_eq!(describes, 3);
    }
}
