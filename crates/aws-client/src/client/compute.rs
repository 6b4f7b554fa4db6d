//! EC2 instance lifecycle

use super::AwsProvider;
use crate::error::{CloudError, from_sdk};
use crate::models::{InstanceSpec, InstanceState, InstanceSummary, PoolSelector, ResourceRef};
use crate::tags::{TAG_CLUSTER, TAG_MACHINE_TYPE, TAG_NAME, instance_name, tag_filter_name};
use aws_sdk_ec2::types::{
    Filter, IamInstanceProfileSpecification, InstanceNetworkInterfaceSpecification, InstanceType,
    ResourceType, Tag, TagSpecification,
};
use tracing::debug;

fn tag(key: &str, value: &str) -> Tag {
    Tag::builder().key(key).value(value).build()
}

fn summarize(instance: &aws_sdk_ec2::types::Instance) -> Option<InstanceSummary> {
    let id = instance.instance_id()?;
    let code = instance.state().and_then(|state| state.code()).unwrap_or(-1);
    Some(InstanceSummary {
        id: id.to_string(),
        state: InstanceState::from_code(code),
    })
}

impl AwsProvider {
    /// Launch one instance with a public address, tagged into its pool
    pub(super) async fn run_instance(&self, spec: &InstanceSpec) -> Result<ResourceRef, CloudError> {
        let tags = TagSpecification::builder()
            .resource_type(ResourceType::Instance)
            .tags(tag(TAG_NAME, &instance_name(&spec.cluster, &spec.machine_type)))
            .tags(tag(TAG_CLUSTER, &spec.cluster))
            .tags(tag(TAG_MACHINE_TYPE, &spec.machine_type))
            .build();

        let output = self
            .ec2
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .key_name(&spec.key_name)
            .min_count(1)
            .max_count(1)
            .user_data(&spec.user_data)
            .iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .name(&spec.instance_profile)
                    .build(),
            )
            .network_interfaces(
                InstanceNetworkInterfaceSpecification::builder()
                    .device_index(0)
                    .associate_public_ip_address(true)
                    .delete_on_termination(true)
                    .subnet_id(&spec.subnet_id)
                    .groups(&spec.security_group_id)
                    .build(),
            )
            .tag_specifications(tags)
            .send()
            .await
            .map_err(|e| from_sdk("RunInstances", &e))?;

        let id = output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .ok_or(CloudError::MissingField {
                operation: "RunInstances",
                field: "InstanceId",
            })?;
        Ok(ResourceRef::Instance { id: id.to_string() })
    }

    pub(super) async fn terminate_instance(&self, id: &str) -> Result<(), CloudError> {
        self.ec2
            .terminate_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| from_sdk("TerminateInstances", &e))?;
        Ok(())
    }

    pub(super) async fn instance_state(&self, id: &str) -> Result<InstanceState, CloudError> {
        let output = self
            .ec2
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeInstances", &e))?;

        output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .find_map(summarize)
            .map(|summary| summary.state)
            .ok_or_else(|| CloudError::NotFound {
                operation: "DescribeInstances",
                code: "InvalidInstanceID.NotFound".to_string(),
                message: format!("instance {id} not found"),
            })
    }

    /// Every instance tagged into the pool, across all result pages
    pub(super) async fn describe_pool(&self, selector: &PoolSelector) -> Result<Vec<InstanceSummary>, CloudError> {
        let instances = self
            .describe_tagged(&[
                (TAG_CLUSTER, selector.cluster.as_str()),
                (TAG_MACHINE_TYPE, selector.machine_type.as_str()),
            ])
            .await?;
        debug!(pool = %selector, count = instances.len(), "Listed pool instances");
        Ok(instances)
    }

    /// Every instance tagged with the cluster, whatever its machine type
    pub(super) async fn describe_cluster(&self, cluster: &str) -> Result<Vec<InstanceSummary>, CloudError> {
        let instances = self.describe_tagged(&[(TAG_CLUSTER, cluster)]).await?;
        debug!(cluster = %cluster, count = instances.len(), "Listed cluster instances");
        Ok(instances)
    }

    async fn describe_tagged(&self, tags: &[(&str, &str)]) -> Result<Vec<InstanceSummary>, CloudError> {
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self.ec2.describe_instances();
            for (key, value) in tags {
                request = request.filters(Filter::builder().name(tag_filter_name(key)).values(*value).build());
            }
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let output = request
                .send()
                .await
                .map_err(|e| from_sdk("DescribeInstances", &e))?;

            instances.extend(
                output
                    .reservations()
                    .iter()
                    .flat_map(|reservation| reservation.instances())
                    .filter_map(summarize),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(instances)
    }
}
