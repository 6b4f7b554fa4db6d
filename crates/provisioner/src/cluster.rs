//! Cluster bootstrap plan
//!
//! Builds the ordered create pipeline for a single-master cluster: network,
//! security, artifact bucket, node and controller identities, then the
//! master instance whose boot script carries everything the in-cluster
//! controller needs.

use crate::bootstrap::{MasterBoot, encode_user_data, master_boot_script};
use crate::error::ProvisionError;
use crate::pipeline::{CreatePipeline, PipelineState, Provisioned, Step};
use crate::settings::ProvisionSettings;
use aws_client::{CloudProvider, InstanceSpec, PolicyDocument, ResourceSpec};
use crds::{Cluster, CrdError, Inventory, Machine, ResourceRole};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const SECURITY_GROUP_DESCRIPTION: &str = "Kubernetes bootstrap master security group";

/// S3 bucket names are 3 to 63 characters
const BUCKET_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=63;

/// Desired cluster and master machine, as decoded from the operator's manifests
#[derive(Debug, Clone)]
pub struct ClusterRequest {
    /// Cluster name and region
    pub cluster: Cluster,
    /// Master machine
    pub machine: Machine,
}

impl ClusterRequest {
    /// Decode the cluster and machine YAML manifests
    pub fn from_manifests(cluster_yaml: &str, machine_yaml: &str) -> Result<Self, ProvisionError> {
        Ok(Self {
            cluster: serde_yaml::from_str(cluster_yaml)?,
            machine: serde_yaml::from_str(machine_yaml)?,
        })
    }

    /// Read and decode the manifests from disk
    pub fn load(cluster_path: &Path, machine_path: &Path) -> Result<Self, ProvisionError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        Self::from_manifests(&read(cluster_path)?, &read(machine_path)?)
    }

    /// Cluster name
    #[must_use]
    pub fn name(&self) -> &str {
        self.cluster.cluster_name()
    }

    /// Region from the cluster spec
    #[must_use]
    pub fn region(&self) -> &str {
        &self.cluster.spec.region
    }
}

/// Names of every named resource of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNames {
    /// Cluster name every other name derives from
    pub cluster: String,
    /// `<cluster>-security-group`
    pub security_group: String,
    /// `<cluster>-artifacts-<uuid>`
    pub bucket: String,
    /// `<cluster>-node-policy`
    pub node_policy: String,
    /// `<cluster>-node-role`
    pub node_role: String,
    /// `<cluster>-profile`
    pub instance_profile: String,
    /// `<cluster>-infra-policy`
    pub controller_policy: String,
    /// `<cluster>-infra-group`
    pub controller_group: String,
    /// `<cluster>-infra-user`
    pub controller_user: String,
}

impl ClusterNames {
    /// Names for `cluster`; `bucket_suffix` keeps the bucket name globally unique
    #[must_use]
    pub fn new(cluster: &str, bucket_suffix: Uuid) -> Self {
        Self {
            cluster: cluster.to_string(),
            security_group: format!("{cluster}-security-group"),
            bucket: format!("{cluster}-artifacts-{bucket_suffix}"),
            node_policy: format!("{cluster}-node-policy"),
            node_role: format!("{cluster}-node-role"),
            instance_profile: format!("{cluster}-profile"),
            controller_policy: format!("{cluster}-infra-policy"),
            controller_group: format!("{cluster}-infra-group"),
            controller_user: format!("{cluster}-infra-user"),
        }
    }
}

/// Reject a bucket name S3 would refuse, so a run fails before creating anything.
///
/// Names are lowercase letters, digits, dots and hyphens, beginning and ending
/// with a letter or digit.
fn validate_bucket_name(name: &str) -> Result<(), ProvisionError> {
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if BUCKET_NAME_LEN.contains(&name.len()) && allowed && name.starts_with(alnum) && name.ends_with(alnum) {
        Ok(())
    } else {
        Err(ProvisionError::InvalidConfig(format!(
            "artifact bucket name {name} is not a valid S3 bucket name; cluster names must be lowercase and at most 16 characters"
        )))
    }
}

/// Ordered pipeline creating every resource of the cluster
#[must_use]
pub fn cluster_pipeline(
    request: &ClusterRequest,
    names: &ClusterNames,
    settings: &ProvisionSettings,
) -> CreatePipeline {
    let request = Arc::new(request.clone());
    let names = Arc::new(names.clone());

    let vpc_cidr = settings.vpc_cidr.clone();
    let subnet_cidr = settings.subnet_cidr.clone();
    let ingress_ports = settings.ingress_ports.clone();
    let sg_name = names.security_group.clone();
    let bucket = names.bucket.clone();
    let node_policy = names.node_policy.clone();
    let node_role = names.node_role.clone();
    let profile = names.instance_profile.clone();
    let controller_policy = names.controller_policy.clone();
    let controller_group = names.controller_group.clone();
    let controller_user = names.controller_user.clone();

    CreatePipeline::new(settings.termination)
        .step(Step::create(ResourceRole::Vpc, move |_| {
            Ok(ResourceSpec::Vpc {
                cidr: vpc_cidr.clone(),
            })
        }))
        .step(Step::lookup(ResourceRole::RouteTable, |state| {
            Ok(ResourceSpec::RouteTable {
                vpc_id: state.id(ResourceRole::Vpc)?,
            })
        }))
        .step(Step::create(ResourceRole::Subnet, move |state| {
            Ok(ResourceSpec::Subnet {
                vpc_id: state.id(ResourceRole::Vpc)?,
                cidr: subnet_cidr.clone(),
            })
        }))
        .step(Step::create(ResourceRole::InternetGateway, |state| {
            Ok(ResourceSpec::InternetGateway {
                vpc_id: state.id(ResourceRole::Vpc)?,
                route_table_id: state.id(ResourceRole::RouteTable)?,
            })
        }))
        .step(Step::create(ResourceRole::SecurityGroup, move |state| {
            Ok(ResourceSpec::SecurityGroup {
                vpc_id: state.id(ResourceRole::Vpc)?,
                name: sg_name.clone(),
                description: SECURITY_GROUP_DESCRIPTION.to_string(),
                ingress_ports: ingress_ports.clone(),
            })
        }))
        .step(Step::create(ResourceRole::ArtifactBucket, move |_| {
            Ok(ResourceSpec::Bucket { name: bucket.clone() })
        }))
        .step(Step::create(ResourceRole::NodePolicy, move |_| {
            Ok(ResourceSpec::IamPolicy {
                name: node_policy.clone(),
                document: PolicyDocument::NodeArtifacts,
            })
        }))
        .step(Step::create(ResourceRole::NodeRole, move |state| {
            Ok(ResourceSpec::IamRole {
                name: node_role.clone(),
                policy_arn: state.id(ResourceRole::NodePolicy)?,
            })
        }))
        .step(Step::create(ResourceRole::InstanceProfile, move |state| {
            Ok(ResourceSpec::InstanceProfile {
                name: profile.clone(),
                role_name: state.id(ResourceRole::NodeRole)?,
            })
        }))
        .step(Step::create(ResourceRole::ControllerPolicy, move |_| {
            Ok(ResourceSpec::IamPolicy {
                name: controller_policy.clone(),
                document: PolicyDocument::ControllerAdmin,
            })
        }))
        .step(Step::create(ResourceRole::ControllerGroup, move |state| {
            Ok(ResourceSpec::IamGroup {
                name: controller_group.clone(),
                policy_arn: state.id(ResourceRole::ControllerPolicy)?,
            })
        }))
        .step(Step::create(ResourceRole::ControllerUser, move |state| {
            Ok(ResourceSpec::IamUser {
                name: controller_user.clone(),
                group_name: state.id(ResourceRole::ControllerGroup)?,
            })
        }))
        .step(Step::wait("instance-profile-propagation", settings.profile_settle))
        .step(Step::create(ResourceRole::Instance, move |state| {
            master_instance(&request, &names, state)
        }))
}

fn master_instance(
    request: &ClusterRequest,
    names: &ClusterNames,
    state: &PipelineState,
) -> Result<ResourceSpec, ProvisionError> {
    let credentials = state
        .credentials
        .as_ref()
        .ok_or(CrdError::MissingField("controller-user credentials"))?;
    let bucket = state.id(ResourceRole::ArtifactBucket)?;
    let inventory = Inventory::for_cluster(&names.cluster, state.inventory.clone());
    let script = master_boot_script(&MasterBoot {
        bucket: &bucket,
        region: &state.inventory.region,
        cluster: &request.cluster,
        machine: &request.machine,
        credentials,
        inventory: &inventory,
    })?;

    let machine = &request.machine.spec;
    Ok(ResourceSpec::Instance(Box::new(InstanceSpec {
        cluster: names.cluster.clone(),
        machine_type: machine.machine_type.clone(),
        image_id: machine.ami.clone(),
        key_name: machine.key_name.clone(),
        instance_type: machine.instance_type().to_string(),
        subnet_id: state.id(ResourceRole::Subnet)?,
        security_group_id: state.id(ResourceRole::SecurityGroup)?,
        instance_profile: state.id(ResourceRole::InstanceProfile)?,
        user_data: encode_user_data(&script),
    })))
}

/// Create every resource of the cluster and return the populated inventory
pub async fn provision_cluster<P>(
    provider: &P,
    request: &ClusterRequest,
    settings: &ProvisionSettings,
) -> Result<Provisioned, ProvisionError>
where
    P: CloudProvider + ?Sized,
{
    if request.name().is_empty() {
        return Err(ProvisionError::InvalidConfig("cluster has no name".to_string()));
    }
    if request.region() != provider.region() {
        return Err(ProvisionError::InvalidConfig(format!(
            "cluster region {} does not match provider region {}",
            request.region(),
            provider.region()
        )));
    }
    if !request.machine.spec.is_master() {
        warn!(
            machine_type = %request.machine.spec.machine_type,
            "Master machine does not use the boot-master type; the machine controller will treat it as a worker pool"
        );
    }

    let names = ClusterNames::new(request.name(), Uuid::new_v4());
    validate_bucket_name(&names.bucket)?;
    info!(cluster = %names.cluster, region = %request.region(), bucket = %names.bucket, "Provisioning cluster");

    let mut state = PipelineState::for_region(request.region());
    state.inventory.cluster = names.cluster.clone();
    let provisioned = cluster_pipeline(request, &names, settings)
        .run(provider, state)
        .await?;

    info!(
        cluster = %names.cluster,
        instance = %provisioned.inventory.instance_id,
        "Cluster provisioned"
    );
    Ok(provisioned)
}
