//! Helper functions for the mock provider

use super::MockState;
use crate::error::CloudError;
use crate::models::{InstanceSpec, InstanceState, PoolSelector, ResourceKind, ResourceRef};

/// Sequential id with a provider-style prefix
pub(crate) fn next_id(state: &mut MockState, prefix: &str) -> String {
    state.next_id += 1;
    format!("{prefix}-{:08x}", state.next_id)
}

pub(crate) fn require_live(state: &MockState, id: &str) -> Result<(), CloudError> {
    if state.live.contains_key(id) {
        Ok(())
    } else {
        Err(CloudError::NotFound {
            operation: "create",
            code: "InvalidVpcID.NotFound".to_string(),
            message: format!("{id} does not exist"),
        })
    }
}

pub(crate) fn not_found(operation: &'static str, resource: &ResourceRef) -> CloudError {
    CloudError::NotFound {
        operation,
        code: "NotFound".to_string(),
        message: resource.to_string(),
    }
}

/// Id of a live resource that still depends on `resource`, as AWS reports
/// for subnets and security groups in use by an instance, and for VPCs with
/// live subnets, gateways or security groups.
pub(crate) fn dependent_of(state: &MockState, resource: &ResourceRef) -> Option<String> {
    match resource {
        ResourceRef::Subnet { id } | ResourceRef::SecurityGroup { id } => state
            .instances
            .iter()
            .filter(|(_, instance)| {
                instance.state != InstanceState::Terminated
                    && (instance.spec.subnet_id == *id || instance.spec.security_group_id == *id)
            })
            .map(|(instance_id, _)| instance_id.clone())
            .min(),
        ResourceRef::Vpc { id } => state
            .parents
            .iter()
            .filter(|(child, vpc)| *vpc == id && state.live.contains_key(*child))
            .map(|(child, _)| child.clone())
            .min(),
        _ => None,
    }
}

pub(crate) fn dependency_violation(resource: &ResourceRef, dependent: &str) -> CloudError {
    CloudError::DependencyViolation {
        operation: "delete",
        message: format!("{resource} has a dependent object {dependent}"),
    }
}

pub(crate) fn injected_failure(operation: &'static str, kind: ResourceKind) -> CloudError {
    CloudError::Provider {
        operation,
        code: Some("InjectedFailure".to_string()),
        message: format!("injected {operation} failure for {kind}"),
    }
}

pub(crate) fn seeded_instance_spec(selector: &PoolSelector) -> InstanceSpec {
    InstanceSpec {
        cluster: selector.cluster.clone(),
        machine_type: selector.machine_type.clone(),
        image_id: "ami-seeded".to_string(),
        key_name: "seeded".to_string(),
        instance_type: "t2.medium".to_string(),
        subnet_id: String::new(),
        security_group_id: String::new(),
        instance_profile: String::new(),
        user_data: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceSpec, ResourceStatus};
    use crate::mock::{MockCall, MockCloudProvider};
    use crate::provider_trait::CloudProvider;

    #[tokio::test]
    async fn test_subnet_requires_live_vpc() {
        let mock = MockCloudProvider::new("us-east-2");
        let err = mock
            .create(&ResourceSpec::Subnet {
                vpc_id: "vpc-missing".to_string(),
                cidr: "10.0.0.0/18".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_terminated_after_configured_polls() {
        let mock = MockCloudProvider::new("us-east-2").terminate_after_polls(2);
        let id = mock.seed_instance(&PoolSelector::new("c", "worker"), InstanceState::Running);
        let instance = ResourceRef::Instance { id };
        mock.delete(&instance).await.unwrap();

        let states: Vec<ResourceStatus> = vec![
            mock.describe(&instance).await.unwrap(),
            mock.describe(&instance).await.unwrap(),
            mock.describe(&instance).await.unwrap(),
        ];
        assert_eq!(
            states,
            vec![
                ResourceStatus::Instance(InstanceState::ShuttingDown),
                ResourceStatus::Instance(InstanceState::ShuttingDown),
                ResourceStatus::Instance(InstanceState::Terminated),
            ]
        );
    }

    #[tokio::test]
    async fn test_network_in_use_cannot_be_deleted() {
        let mock = MockCloudProvider::new("us-east-2");
        let vpc = mock
            .create(&ResourceSpec::Vpc {
                cidr: "10.0.0.0/16".to_string(),
            })
            .await
            .unwrap();
        let subnet = mock
            .create(&ResourceSpec::Subnet {
                vpc_id: vpc.id().to_string(),
                cidr: "10.0.0.0/18".to_string(),
            })
            .await
            .unwrap();
        let mut spec = seeded_instance_spec(&PoolSelector::new("c", "worker"));
        spec.subnet_id = subnet.id().to_string();
        let instance = mock
            .create(&ResourceSpec::Instance(Box::new(spec)))
            .await
            .unwrap();

        let err = mock.delete(&subnet.resource).await.unwrap_err();
        assert!(matches!(err, CloudError::DependencyViolation { .. }));
        let err = mock.delete(&vpc.resource).await.unwrap_err();
        assert!(matches!(err, CloudError::DependencyViolation { .. }));

        mock.delete(&instance.resource).await.unwrap();
        assert_eq!(
            mock.describe(&instance.resource).await.unwrap(),
            ResourceStatus::Instance(InstanceState::Terminated)
        );
        mock.delete(&subnet.resource).await.unwrap();
        mock.delete(&vpc.resource).await.unwrap();
        assert_eq!(mock.live_count(), 0);
    }

    #[tokio::test]
    async fn test_cluster_listing_spans_every_pool() {
        let mock = MockCloudProvider::new("us-east-2");
        let master = mock.seed_instance(&PoolSelector::new("c", "boot-master"), InstanceState::Running);
        let worker = mock.seed_instance(&PoolSelector::new("c", "worker"), InstanceState::Running);
        mock.seed_instance(&PoolSelector::new("other", "worker"), InstanceState::Running);

        let ids: Vec<String> = mock
            .list_cluster_instances("c")
            .await
            .unwrap()
            .into_iter()
            .map(|instance| instance.id)
            .collect();
        assert_eq!(ids, vec![master, worker]);
    }

    #[tokio::test]
    async fn test_second_delete_reports_not_found() {
        let mock = MockCloudProvider::new("us-east-2");
        let vpc = mock
            .create(&ResourceSpec::Vpc {
                cidr: "10.0.0.0/16".to_string(),
            })
            .await
            .unwrap();
        mock.delete(&vpc.resource).await.unwrap();
        assert!(mock.delete(&vpc.resource).await.unwrap_err().is_not_found());
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Create(ResourceKind::Vpc),
                MockCall::Delete(vpc.resource.clone()),
                MockCall::Delete(vpc.resource),
            ]
        );
    }
}
