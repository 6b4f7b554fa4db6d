//! Worker pool reconciliation
//!
//! One level-triggered pass over a (cluster, machine type) pool: count the
//! live instances carrying the pool's tags, then launch the missing ones.
//! The count is taken from the provider on every pass so instances created
//! by an earlier pass are always seen. Scale-down is not performed.

use crate::bootstrap::{encode_user_data, worker_join_script};
use crate::error::ProvisionError;
use crate::pipeline::{CreatePipeline, PipelineState, Step};
use crate::wait::WaitConfig;
use aws_client::{
    ArtifactStore, CloudError, CloudProvider, InstanceSpec, JOIN_ARTIFACT_KEY, PoolSelector,
    ResourceSpec,
};
use crds::{InventorySpec, MachineSpec, PoolState, ResourceRole};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Desired state of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTarget {
    /// Cluster and machine-type tags identifying the pool
    pub selector: PoolSelector,
    /// Desired replica count
    pub desired: u32,
    /// AMI the workers boot from
    pub image_id: String,
    /// EC2 key pair name
    pub key_name: String,
    /// EC2 instance type
    pub instance_type: String,
}

impl PoolTarget {
    /// Target for a Machine spec in `cluster`
    #[must_use]
    pub fn from_machine(cluster: &str, spec: &MachineSpec) -> Self {
        Self {
            selector: PoolSelector::new(cluster, &spec.machine_type),
            desired: spec.replicas,
            image_id: spec.ami.clone(),
            key_name: spec.key_name.clone(),
            instance_type: spec.instance_type().to_string(),
        }
    }
}

/// Live instance count of a pool at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPool {
    /// Pool that was listed
    pub selector: PoolSelector,
    /// Pending or running instances
    pub live: u32,
}

/// Count the live instances of a pool
pub async fn observe_pool<P>(provider: &P, selector: &PoolSelector) -> Result<ObservedPool, CloudError>
where
    P: CloudProvider + ?Sized,
{
    let instances = provider.list_instances(selector).await?;
    let live = instances.iter().filter(|i| i.state.is_live()).count();
    Ok(ObservedPool {
        selector: selector.clone(),
        live: u32::try_from(live).unwrap_or(u32::MAX),
    })
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome {
    /// Desired equals actual; nothing was done
    InSync { actual: u32 },
    /// Missing instances were launched
    ScaledUp { actual_before: u32, created: Vec<String> },
    /// More instances than desired; none were removed
    ScaleDownUnsupported { desired: u32, actual: u32 },
    /// A provider error ended the pass. Instances launched before the error stay
    /// and are counted on the next pass.
    Dropped {
        error: String,
        actual: Option<u32>,
        created: Vec<String>,
    },
}

impl PoolOutcome {
    /// Pool state to report for this outcome
    #[must_use]
    pub fn state(&self) -> PoolState {
        match self {
            PoolOutcome::InSync { .. } => PoolState::Reconciled,
            PoolOutcome::ScaledUp { .. } => PoolState::ScalingUp,
            PoolOutcome::ScaleDownUnsupported { .. } => PoolState::ScaleDownUnsupported,
            PoolOutcome::Dropped { .. } => PoolState::Failed,
        }
    }

    /// Live instance count after the pass, when it is known
    #[must_use]
    pub fn observed_replicas(&self) -> Option<u32> {
        match self {
            PoolOutcome::InSync { actual } | PoolOutcome::ScaleDownUnsupported { actual, .. } => Some(*actual),
            PoolOutcome::ScaledUp { actual_before, created } => {
                Some(actual_before.saturating_add(u32::try_from(created.len()).unwrap_or(u32::MAX)))
            }
            PoolOutcome::Dropped { actual, created, .. } => {
                actual.map(|a| a.saturating_add(u32::try_from(created.len()).unwrap_or(u32::MAX)))
            }
        }
    }

    /// Error message of a dropped pass
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            PoolOutcome::Dropped { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Everything a worker launch needs from the cluster inventory
struct WorkerLaunch {
    bucket: String,
    region: String,
    subnet_id: String,
    security_group_id: String,
    instance_profile: String,
}

impl WorkerLaunch {
    fn from_inventory(inventory: &InventorySpec) -> Result<Self, ProvisionError> {
        Ok(Self {
            bucket: inventory.require(ResourceRole::ArtifactBucket)?.to_string(),
            region: inventory.region.clone(),
            subnet_id: inventory.require(ResourceRole::Subnet)?.to_string(),
            security_group_id: inventory.require(ResourceRole::SecurityGroup)?.to_string(),
            instance_profile: inventory.require(ResourceRole::InstanceProfile)?.to_string(),
        })
    }
}

/// Run one reconciliation pass for a worker pool.
///
/// Provider errors are logged and reported as [`PoolOutcome::Dropped`]; no
/// retry is scheduled here.
pub async fn reconcile_pool<P, A>(
    provider: &P,
    artifacts: &A,
    inventory: &InventorySpec,
    target: &PoolTarget,
    termination: WaitConfig,
) -> PoolOutcome
where
    P: CloudProvider + ?Sized,
    A: ArtifactStore + ?Sized,
{
    let pool = &target.selector;
    let observed = match observe_pool(provider, pool).await {
        Ok(observed) => observed,
        Err(e) => {
            error!(pool = %pool, error = %e, "Failed to list pool instances");
            return PoolOutcome::Dropped {
                error: e.to_string(),
                actual: None,
                created: Vec::new(),
            };
        }
    };
    let actual = observed.live;

    if target.desired == actual {
        info!(pool = %pool, replicas = actual, "Pool in sync");
        return PoolOutcome::InSync { actual };
    }
    if target.desired < actual {
        warn!(
            pool = %pool,
            desired = target.desired,
            actual,
            "Pool has more instances than desired; scale-down is not supported, leaving it unchanged"
        );
        return PoolOutcome::ScaleDownUnsupported {
            desired: target.desired,
            actual,
        };
    }

    let delta = target.desired - actual;
    info!(pool = %pool, desired = target.desired, actual, delta, "Scaling up pool");

    let dropped = |error: String, created: Vec<String>| PoolOutcome::Dropped {
        error,
        actual: Some(actual),
        created,
    };

    let launch = match WorkerLaunch::from_inventory(inventory) {
        Ok(launch) => launch,
        Err(e) => {
            error!(pool = %pool, error = %e, "Inventory is missing resources needed to launch workers");
            return dropped(e.to_string(), Vec::new());
        }
    };

    let join_command = match artifacts.get_artifact(&launch.bucket, JOIN_ARTIFACT_KEY).await {
        Ok(command) => command,
        Err(e) => {
            error!(pool = %pool, bucket = %launch.bucket, error = %e, "Failed to fetch join command");
            return dropped(e.to_string(), Vec::new());
        }
    };

    let spec = Arc::new(InstanceSpec {
        cluster: pool.cluster.clone(),
        machine_type: pool.machine_type.clone(),
        image_id: target.image_id.clone(),
        key_name: target.key_name.clone(),
        instance_type: target.instance_type.clone(),
        subnet_id: launch.subnet_id,
        security_group_id: launch.security_group_id,
        instance_profile: launch.instance_profile,
        user_data: encode_user_data(&worker_join_script(&launch.bucket, &launch.region, &join_command)),
    });
    let pipeline = CreatePipeline::new(termination).step(Step::create(ResourceRole::Instance, move |_| {
        Ok(ResourceSpec::Instance(Box::new((*spec).clone())))
    }));

    let mut created = Vec::new();
    for n in 1..=delta {
        match pipeline
            .run(provider, PipelineState::from_inventory(inventory.clone()))
            .await
        {
            Ok(provisioned) => {
                info!(pool = %pool, instance = %provisioned.inventory.instance_id, n, delta, "Launched worker");
                created.push(provisioned.inventory.instance_id);
            }
            Err(e) => {
                error!(pool = %pool, error = %e, launched = created.len(), "Failed to launch worker");
                return dropped(e.to_string(), created);
            }
        }
    }

    PoolOutcome::ScaledUp {
        actual_before: actual,
        created,
    }
}

#[path = "pool_test.rs"]
mod pool_test;
