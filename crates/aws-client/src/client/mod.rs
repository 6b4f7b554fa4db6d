//! AWS-backed cloud provider
//!
//! Dispatches each resource kind to the service that owns it:
//! - `network.rs` - VPC, route table, subnet, internet gateway, security group
//! - `identity.rs` - IAM policies, roles, instance profiles, groups, users
//! - `storage.rs` - artifact buckets and objects
//! - `compute.rs` - EC2 instances

mod compute;
mod identity;
mod network;
mod storage;

use crate::context::AwsContext;
use crate::error::CloudError;
use crate::models::{Created, InstanceSummary, PoolSelector, ResourceRef, ResourceSpec, ResourceStatus};
use crate::provider_trait::{ArtifactStore, CloudProvider};
use tracing::{debug, info, warn};

/// Cloud provider talking to EC2, IAM and S3 in one region
#[derive(Debug, Clone)]
pub struct AwsProvider {
    region: String,
    ec2: aws_sdk_ec2::Client,
    iam: aws_sdk_iam::Client,
    s3: aws_sdk_s3::Client,
}

impl AwsProvider {
    /// Load AWS configuration for `region` and build the service clients
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    /// Build a provider from a pre-loaded AWS context
    #[must_use]
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            region: ctx.region().to_string(),
            ec2: ctx.ec2_client(),
            iam: ctx.iam_client(),
            s3: ctx.s3_client(),
        }
    }

    /// Best-effort removal of a half-created resource after a later call in
    /// the same `create` failed
    async fn discard(&self, resource: ResourceRef) {
        warn!(resource = %resource, "Removing partially created resource");
        if let Err(e) = self.delete(&resource).await {
            warn!(resource = %resource, error = %e, "Failed to remove partially created resource");
        }
    }
}

/// Treat "already gone" as success for detach-style sub-steps of a delete
fn ignore_missing(result: Result<(), CloudError>) -> Result<(), CloudError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(error = %e, "Ignoring missing dependency during delete");
            Ok(())
        }
        other => other,
    }
}

#[async_trait::async_trait]
impl CloudProvider for AwsProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Created, CloudError> {
        info!(kind = %spec.kind(), region = %self.region, "Creating resource");
        let created = match spec {
            ResourceSpec::Vpc { cidr } => Created::new(self.create_vpc(cidr).await?),
            ResourceSpec::RouteTable { .. } => {
                return Err(CloudError::Unsupported {
                    operation: "create",
                    kind: spec.kind(),
                });
            }
            ResourceSpec::Subnet { vpc_id, cidr } => {
                Created::new(self.create_subnet(vpc_id, cidr).await?)
            }
            ResourceSpec::InternetGateway {
                vpc_id,
                route_table_id,
            } => Created::new(self.create_internet_gateway(vpc_id, route_table_id).await?),
            ResourceSpec::SecurityGroup {
                vpc_id,
                name,
                description,
                ingress_ports,
            } => Created::new(
                self.create_security_group(vpc_id, name, description, ingress_ports)
                    .await?,
            ),
            ResourceSpec::Bucket { name } => Created::new(self.create_bucket(name).await?),
            ResourceSpec::IamPolicy { name, document } => {
                Created::new(self.create_policy(name, *document).await?)
            }
            ResourceSpec::IamRole { name, policy_arn } => {
                Created::new(self.create_role(name, policy_arn).await?)
            }
            ResourceSpec::InstanceProfile { name, role_name } => {
                Created::new(self.create_instance_profile(name, role_name).await?)
            }
            ResourceSpec::IamGroup { name, policy_arn } => {
                Created::new(self.create_group(name, policy_arn).await?)
            }
            ResourceSpec::IamUser { name, group_name } => {
                self.create_user(name, group_name).await?
            }
            ResourceSpec::Instance(instance) => Created::new(self.run_instance(instance).await?),
        };
        info!(resource = %created.resource, "Resource created");
        Ok(created)
    }

    async fn lookup(&self, spec: &ResourceSpec) -> Result<ResourceRef, CloudError> {
        match spec {
            ResourceSpec::RouteTable { vpc_id } => self.lookup_route_table(vpc_id).await,
            _ => Err(CloudError::Unsupported {
                operation: "lookup",
                kind: spec.kind(),
            }),
        }
    }

    async fn describe(&self, resource: &ResourceRef) -> Result<ResourceStatus, CloudError> {
        match resource {
            ResourceRef::Instance { id } => {
                Ok(ResourceStatus::Instance(self.instance_state(id).await?))
            }
            _ => Err(CloudError::Unsupported {
                operation: "describe",
                kind: resource.kind(),
            }),
        }
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), CloudError> {
        info!(resource = %resource, "Deleting resource");
        match resource {
            ResourceRef::Vpc { id } => self.delete_vpc(id).await,
            // The main route table is owned by its VPC
            ResourceRef::RouteTable { .. } => Ok(()),
            ResourceRef::Subnet { id } => self.delete_subnet(id).await,
            ResourceRef::InternetGateway { id, vpc_id } => {
                self.delete_internet_gateway(id, vpc_id).await
            }
            ResourceRef::SecurityGroup { id } => self.delete_security_group(id).await,
            ResourceRef::Bucket { name } => self.delete_bucket(name).await,
            ResourceRef::IamPolicy { arn } => self.delete_policy(arn).await,
            ResourceRef::IamRole { name, policy_arn } => self.delete_role(name, policy_arn).await,
            ResourceRef::InstanceProfile { name, role_name } => {
                self.delete_instance_profile(name, role_name).await
            }
            ResourceRef::IamGroup { name, policy_arn } => {
                self.delete_group(name, policy_arn).await
            }
            ResourceRef::IamUser {
                name,
                group_name,
                access_key_id,
            } => {
                self.delete_user(name, group_name, access_key_id.as_deref())
                    .await
            }
            ResourceRef::Instance { id } => self.terminate_instance(id).await,
        }
    }

    async fn list_instances(&self, selector: &PoolSelector) -> Result<Vec<InstanceSummary>, CloudError> {
        self.describe_pool(selector).await
    }

    async fn list_cluster_instances(&self, cluster: &str) -> Result<Vec<InstanceSummary>, CloudError> {
        self.describe_cluster(cluster).await
    }
}

#[async_trait::async_trait]
impl ArtifactStore for AwsProvider {
    async fn put_artifact(&self, bucket: &str, key: &str, body: &str) -> Result<(), CloudError> {
        self.put_object(bucket, key, body).await
    }

    async fn get_artifact(&self, bucket: &str, key: &str) -> Result<String, CloudError> {
        self.get_object(bucket, key).await
    }
}
