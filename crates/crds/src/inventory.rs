//! Inventory CRD
//!
//! The durable record linking each logical resource role of a cluster to the
//! provider-assigned identifier of the live resource. The same spec type is
//! written to the inventory file by `bootctl create`, read back by
//! `bootctl destroy`, and stored in-cluster for the machine controller.

use crate::error::CrdError;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "infra.bootctl.io",
    version = "v1alpha1",
    kind = "Inventory",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpec {
    /// Region every recorded resource lives in
    #[serde(default)]
    pub region: String,
    /// Cluster name every instance of the cluster is tagged with
    #[serde(default)]
    pub cluster: String,
    /// VPC id
    #[serde(default)]
    pub vpc_id: String,
    /// Main route table of the VPC
    #[serde(default)]
    pub route_table_id: String,
    /// Subnet id
    #[serde(default)]
    pub subnet_id: String,
    /// Internet gateway id
    #[serde(default)]
    pub internet_gateway_id: String,
    /// Security group id
    #[serde(default)]
    pub security_group_id: String,
    /// Artifact bucket name
    #[serde(default)]
    pub bucket_id: String,
    /// Node policy ARN
    #[serde(default)]
    pub master_node_iam_policy_id: String,
    /// Node role name
    #[serde(default)]
    pub iam_role_id: String,
    /// Instance profile name
    #[serde(default)]
    pub instance_profile_id: String,
    /// Controller policy ARN
    #[serde(default)]
    pub infra_controller_iam_policy_id: String,
    /// Controller group name
    #[serde(default)]
    pub iam_group_id: String,
    /// Controller user name
    #[serde(default)]
    pub iam_user_id: String,
    /// Access key id of the controller user (the secret is never recorded)
    #[serde(default)]
    pub access_key_id: String,
    /// Master instance id
    #[serde(default)]
    pub instance_id: String,
}

/// Logical role of a provisioned resource, in creation dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    Vpc,
    RouteTable,
    Subnet,
    InternetGateway,
    SecurityGroup,
    ArtifactBucket,
    NodePolicy,
    NodeRole,
    InstanceProfile,
    ControllerPolicy,
    ControllerGroup,
    ControllerUser,
    Instance,
}

impl ResourceRole {
    /// Every role in the order resources are created. Teardown walks it backwards.
    pub const ALL: [ResourceRole; 13] = [
        ResourceRole::Vpc,
        ResourceRole::RouteTable,
        ResourceRole::Subnet,
        ResourceRole::InternetGateway,
        ResourceRole::SecurityGroup,
        ResourceRole::ArtifactBucket,
        ResourceRole::NodePolicy,
        ResourceRole::NodeRole,
        ResourceRole::InstanceProfile,
        ResourceRole::ControllerPolicy,
        ResourceRole::ControllerGroup,
        ResourceRole::ControllerUser,
        ResourceRole::Instance,
    ];

    /// Kebab-case role name used in logs and errors
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceRole::Vpc => "vpc",
            ResourceRole::RouteTable => "route-table",
            ResourceRole::Subnet => "subnet",
            ResourceRole::InternetGateway => "internet-gateway",
            ResourceRole::SecurityGroup => "security-group",
            ResourceRole::ArtifactBucket => "artifact-bucket",
            ResourceRole::NodePolicy => "node-policy",
            ResourceRole::NodeRole => "node-role",
            ResourceRole::InstanceProfile => "instance-profile",
            ResourceRole::ControllerPolicy => "controller-policy",
            ResourceRole::ControllerGroup => "controller-group",
            ResourceRole::ControllerUser => "controller-user",
            ResourceRole::Instance => "instance",
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InventorySpec {
    /// Empty inventory for a region, the starting point of a create run
    #[must_use]
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    fn slot(&self, role: ResourceRole) -> &String {
        match role {
            ResourceRole::Vpc => &self.vpc_id,
            ResourceRole::RouteTable => &self.route_table_id,
            ResourceRole::Subnet => &self.subnet_id,
            ResourceRole::InternetGateway => &self.internet_gateway_id,
            ResourceRole::SecurityGroup => &self.security_group_id,
            ResourceRole::ArtifactBucket => &self.bucket_id,
            ResourceRole::NodePolicy => &self.master_node_iam_policy_id,
            ResourceRole::NodeRole => &self.iam_role_id,
            ResourceRole::InstanceProfile => &self.instance_profile_id,
            ResourceRole::ControllerPolicy => &self.infra_controller_iam_policy_id,
            ResourceRole::ControllerGroup => &self.iam_group_id,
            ResourceRole::ControllerUser => &self.iam_user_id,
            ResourceRole::Instance => &self.instance_id,
        }
    }

    fn slot_mut(&mut self, role: ResourceRole) -> &mut String {
        match role {
            ResourceRole::Vpc => &mut self.vpc_id,
            ResourceRole::RouteTable => &mut self.route_table_id,
            ResourceRole::Subnet => &mut self.subnet_id,
            ResourceRole::InternetGateway => &mut self.internet_gateway_id,
            ResourceRole::SecurityGroup => &mut self.security_group_id,
            ResourceRole::ArtifactBucket => &mut self.bucket_id,
            ResourceRole::NodePolicy => &mut self.master_node_iam_policy_id,
            ResourceRole::NodeRole => &mut self.iam_role_id,
            ResourceRole::InstanceProfile => &mut self.instance_profile_id,
            ResourceRole::ControllerPolicy => &mut self.infra_controller_iam_policy_id,
            ResourceRole::ControllerGroup => &mut self.iam_group_id,
            ResourceRole::ControllerUser => &mut self.iam_user_id,
            ResourceRole::Instance => &mut self.instance_id,
        }
    }

    /// Identifier recorded for a role; `None` when the resource was never created
    #[must_use]
    pub fn get(&self, role: ResourceRole) -> Option<&str> {
        let id = self.slot(role);
        (!id.is_empty()).then_some(id.as_str())
    }

    /// Record the identifier of a created resource
    pub fn set(&mut self, role: ResourceRole, id: impl Into<String>) {
        *self.slot_mut(role) = id.into();
    }

    /// Identifier for a role, or an error naming the role when it is missing
    pub fn require(&self, role: ResourceRole) -> Result<&str, CrdError> {
        self.get(role).ok_or(CrdError::MissingField(role.as_str()))
    }

    /// Roles that currently hold an identifier, in creation order
    pub fn populated(&self) -> impl Iterator<Item = ResourceRole> + '_ {
        ResourceRole::ALL
            .into_iter()
            .filter(|role| self.get(*role).is_some())
    }
}

impl Inventory {
    /// Object name of a cluster's inventory
    #[must_use]
    pub fn object_name(cluster: &str) -> String {
        format!("{cluster}-inventory")
    }

    /// Inventory object for a cluster, placed in the system namespace
    #[must_use]
    pub fn for_cluster(cluster: &str, spec: InventorySpec) -> Self {
        let mut inventory = Inventory::new(&Self::object_name(cluster), spec);
        inventory.metadata.namespace = Some(crate::SYSTEM_NAMESPACE.to_string());
        inventory
    }
}
