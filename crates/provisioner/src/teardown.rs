//! Teardown pipeline
//!
//! Replays an inventory in exact reverse dependency order. The instance is
//! terminated first and polled until it reports terminated before any
//! network or identity resource is touched. The first failure aborts the
//! run and leaves the remaining resources in place.
//!
//! Worker instances launched by the machine controller are not recorded in
//! the inventory but still sit in its subnet and security group. When the
//! inventory names its cluster, every live instance tagged into that cluster
//! is terminated and awaited before the replay starts.

use crate::error::ProvisionError;
use crate::wait::{WaitConfig, wait_until_terminated};
use aws_client::{CloudProvider, ResourceRef};
use crds::{InventorySpec, ResourceRole};
use tracing::{info, warn};

/// Resource handle needed to delete the resource recorded for `role`.
///
/// Returns `None` when nothing was recorded, and for the route table, which
/// belongs to the VPC and goes away with it.
#[must_use]
pub fn resource_for(role: ResourceRole, inventory: &InventorySpec) -> Option<ResourceRef> {
    let id = inventory.get(role)?.to_string();
    let other = |role| inventory.get(role).unwrap_or_default().to_string();
    Some(match role {
        ResourceRole::Vpc => ResourceRef::Vpc { id },
        ResourceRole::RouteTable => return None,
        ResourceRole::Subnet => ResourceRef::Subnet { id },
        ResourceRole::InternetGateway => ResourceRef::InternetGateway {
            id,
            vpc_id: other(ResourceRole::Vpc),
        },
        ResourceRole::SecurityGroup => ResourceRef::SecurityGroup { id },
        ResourceRole::ArtifactBucket => ResourceRef::Bucket { name: id },
        ResourceRole::NodePolicy | ResourceRole::ControllerPolicy => ResourceRef::IamPolicy { arn: id },
        ResourceRole::NodeRole => ResourceRef::IamRole {
            name: id,
            policy_arn: other(ResourceRole::NodePolicy),
        },
        ResourceRole::InstanceProfile => ResourceRef::InstanceProfile {
            name: id,
            role_name: other(ResourceRole::NodeRole),
        },
        ResourceRole::ControllerGroup => ResourceRef::IamGroup {
            name: id,
            policy_arn: other(ResourceRole::ControllerPolicy),
        },
        ResourceRole::ControllerUser => ResourceRef::IamUser {
            name: id,
            group_name: other(ResourceRole::ControllerGroup),
            access_key_id: (!inventory.access_key_id.is_empty()).then(|| inventory.access_key_id.clone()),
        },
        ResourceRole::Instance => ResourceRef::Instance { id },
    })
}

/// What a teardown run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Pool instances terminated before the inventory replay
    pub drained: Vec<ResourceRef>,
    /// Resources deleted, in deletion order
    pub deleted: Vec<(ResourceRole, ResourceRef)>,
    /// Resources the provider no longer knew about
    pub already_gone: Vec<(ResourceRole, ResourceRef)>,
}

/// Reverse-order, fail-fast deletion of an inventory
#[derive(Debug, Clone, Copy, Default)]
pub struct TeardownPipeline {
    termination: WaitConfig,
}

impl TeardownPipeline {
    /// `termination` bounds the wait for the instance to terminate
    #[must_use]
    pub fn new(termination: WaitConfig) -> Self {
        Self { termination }
    }

    /// Delete every resource recorded in `inventory`
    pub async fn run<P>(&self, provider: &P, inventory: &InventorySpec) -> Result<TeardownReport, ProvisionError>
    where
        P: CloudProvider + ?Sized,
    {
        if !inventory.region.is_empty() && inventory.region != provider.region() {
            return Err(ProvisionError::InvalidConfig(format!(
                "inventory region {} does not match provider region {}",
                inventory.region,
                provider.region()
            )));
        }

        let drained = self.drain_pools(provider, inventory).await?;
        let mut report = TeardownReport {
            drained,
            ..TeardownReport::default()
        };

        for role in ResourceRole::ALL.into_iter().rev() {
            let Some(resource) = resource_for(role, inventory) else {
                continue;
            };

            info!(role = %role, resource = %resource, "Deleting");
            match provider.delete(&resource).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!(role = %role, resource = %resource, "Already gone, continuing");
                    report.already_gone.push((role, resource));
                    continue;
                }
                Err(source) => {
                    return Err(ProvisionError::Teardown {
                        role,
                        resource: resource.to_string(),
                        source,
                    });
                }
            }

            if role == ResourceRole::Instance {
                info!(resource = %resource, "Waiting for instance to terminate");
                wait_until_terminated(provider, &resource, self.termination).await?;
            }
            info!(role = %role, resource = %resource, "Deleted");
            report.deleted.push((role, resource));
        }

        Ok(report)
    }

    /// Terminate every live instance tagged into the inventory's cluster
    /// other than the recorded master, and wait until each is gone.
    async fn drain_pools<P>(&self, provider: &P, inventory: &InventorySpec) -> Result<Vec<ResourceRef>, ProvisionError>
    where
        P: CloudProvider + ?Sized,
    {
        if inventory.cluster.is_empty() {
            return Ok(Vec::new());
        }
        let drain_error = |source| ProvisionError::Drain {
            cluster: inventory.cluster.clone(),
            source,
        };

        let instances = provider
            .list_cluster_instances(&inventory.cluster)
            .await
            .map_err(drain_error)?;
        let pool: Vec<ResourceRef> = instances
            .into_iter()
            .filter(|instance| instance.state.is_live() && instance.id != inventory.instance_id)
            .map(|instance| ResourceRef::Instance { id: instance.id })
            .collect();
        if pool.is_empty() {
            return Ok(pool);
        }

        info!(cluster = %inventory.cluster, count = pool.len(), "Terminating pool instances");
        for instance in &pool {
            match provider.delete(instance).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!(resource = %instance, "Already gone, continuing");
                }
                Err(source) => return Err(drain_error(source)),
            }
        }
        for instance in &pool {
            wait_until_terminated(provider, instance, self.termination).await?;
        }
        info!(cluster = %inventory.cluster, count = pool.len(), "Pool instances terminated");
        Ok(pool)
    }
}

#[path = "teardown_test.rs"]
mod teardown_test;
