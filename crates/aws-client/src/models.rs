//! Resource handle models
//!
//! `ResourceSpec` carries the inputs needed to create a resource,
//! `ResourceRef` the identity needed to describe or delete a live one.

use crate::policy::PolicyDocument;
use std::fmt;

/// Kind of cloud object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vpc,
    RouteTable,
    Subnet,
    InternetGateway,
    SecurityGroup,
    Bucket,
    IamPolicy,
    IamRole,
    InstanceProfile,
    IamGroup,
    IamUser,
    Instance,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::RouteTable => "route-table",
            ResourceKind::Subnet => "subnet",
            ResourceKind::InternetGateway => "internet-gateway",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::Bucket => "bucket",
            ResourceKind::IamPolicy => "iam-policy",
            ResourceKind::IamRole => "iam-role",
            ResourceKind::InstanceProfile => "instance-profile",
            ResourceKind::IamGroup => "iam-group",
            ResourceKind::IamUser => "iam-user",
            ResourceKind::Instance => "instance",
        };
        f.write_str(s)
    }
}

/// Launch parameters for one compute instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    /// Value of the Cluster tag
    pub cluster: String,
    /// Value of the MachineType tag
    pub machine_type: String,
    /// AMI id
    pub image_id: String,
    /// EC2 key pair name
    pub key_name: String,
    /// EC2 instance type
    pub instance_type: String,
    /// Subnet of the public network interface
    pub subnet_id: String,
    /// Security group of the network interface
    pub security_group_id: String,
    /// Instance profile name
    pub instance_profile: String,
    /// Base64-encoded bootstrap script
    pub user_data: String,
}

impl InstanceSpec {
    /// Pool the instance is tagged into
    #[must_use]
    pub fn selector(&self) -> PoolSelector {
        PoolSelector::new(&self.cluster, &self.machine_type)
    }
}

/// Creation inputs, one variant per resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    Vpc {
        cidr: String,
    },
    /// Main route table of a VPC; resolved with `lookup`, never created
    RouteTable {
        vpc_id: String,
    },
    Subnet {
        vpc_id: String,
        cidr: String,
    },
    /// Gateway attached to the VPC with a default route in `route_table_id`
    InternetGateway {
        vpc_id: String,
        route_table_id: String,
    },
    SecurityGroup {
        vpc_id: String,
        name: String,
        description: String,
        /// TCP ports opened to 0.0.0.0/0
        ingress_ports: Vec<i32>,
    },
    Bucket {
        name: String,
    },
    IamPolicy {
        name: String,
        document: PolicyDocument,
    },
    /// EC2-assumable role with `policy_arn` attached
    IamRole {
        name: String,
        policy_arn: String,
    },
    InstanceProfile {
        name: String,
        role_name: String,
    },
    IamGroup {
        name: String,
        policy_arn: String,
    },
    /// User added to `group_name`; creation also issues an access key
    IamUser {
        name: String,
        group_name: String,
    },
    Instance(Box<InstanceSpec>),
}

impl ResourceSpec {
    /// Kind of resource this spec creates
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Vpc { .. } => ResourceKind::Vpc,
            ResourceSpec::RouteTable { .. } => ResourceKind::RouteTable,
            ResourceSpec::Subnet { .. } => ResourceKind::Subnet,
            ResourceSpec::InternetGateway { .. } => ResourceKind::InternetGateway,
            ResourceSpec::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            ResourceSpec::Bucket { .. } => ResourceKind::Bucket,
            ResourceSpec::IamPolicy { .. } => ResourceKind::IamPolicy,
            ResourceSpec::IamRole { .. } => ResourceKind::IamRole,
            ResourceSpec::InstanceProfile { .. } => ResourceKind::InstanceProfile,
            ResourceSpec::IamGroup { .. } => ResourceKind::IamGroup,
            ResourceSpec::IamUser { .. } => ResourceKind::IamUser,
            ResourceSpec::Instance(_) => ResourceKind::Instance,
        }
    }
}

/// Identity of a live resource, carrying whatever its deletion needs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Vpc { id: String },
    RouteTable { id: String },
    Subnet { id: String },
    InternetGateway { id: String, vpc_id: String },
    SecurityGroup { id: String },
    Bucket { name: String },
    IamPolicy { arn: String },
    IamRole { name: String, policy_arn: String },
    InstanceProfile { name: String, role_name: String },
    IamGroup { name: String, policy_arn: String },
    IamUser {
        name: String,
        group_name: String,
        access_key_id: Option<String>,
    },
    Instance { id: String },
}

impl ResourceRef {
    /// Kind of the referenced resource
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Vpc { .. } => ResourceKind::Vpc,
            ResourceRef::RouteTable { .. } => ResourceKind::RouteTable,
            ResourceRef::Subnet { .. } => ResourceKind::Subnet,
            ResourceRef::InternetGateway { .. } => ResourceKind::InternetGateway,
            ResourceRef::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            ResourceRef::Bucket { .. } => ResourceKind::Bucket,
            ResourceRef::IamPolicy { .. } => ResourceKind::IamPolicy,
            ResourceRef::IamRole { .. } => ResourceKind::IamRole,
            ResourceRef::InstanceProfile { .. } => ResourceKind::InstanceProfile,
            ResourceRef::IamGroup { .. } => ResourceKind::IamGroup,
            ResourceRef::IamUser { .. } => ResourceKind::IamUser,
            ResourceRef::Instance { .. } => ResourceKind::Instance,
        }
    }

    /// Provider-assigned identifier (id, name or ARN depending on the kind)
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Vpc { id }
            | ResourceRef::RouteTable { id }
            | ResourceRef::Subnet { id }
            | ResourceRef::InternetGateway { id, .. }
            | ResourceRef::SecurityGroup { id }
            | ResourceRef::Instance { id } => id,
            ResourceRef::Bucket { name }
            | ResourceRef::IamRole { name, .. }
            | ResourceRef::InstanceProfile { name, .. }
            | ResourceRef::IamGroup { name, .. }
            | ResourceRef::IamUser { name, .. } => name,
            ResourceRef::IamPolicy { arn } => arn,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// Access credentials issued for an IAM user
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    /// Public key id, safe to record
    pub access_key_id: String,
    /// Secret half; only ever handed to the master's boot script
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Result of a successful `create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Handle of the new resource
    pub resource: ResourceRef,
    /// Secret issued as a side effect of creation; never persisted
    pub credentials: Option<AccessKey>,
}

impl Created {
    #[must_use]
    pub fn new(resource: ResourceRef) -> Self {
        Self {
            resource,
            credentials: None,
        }
    }

    /// Provider-assigned identifier of the created resource
    #[must_use]
    pub fn id(&self) -> &str {
        self.resource.id()
    }
}

/// Compute instance lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    Unknown(i32),
}

impl InstanceState {
    /// Map an EC2 state code. Only the low byte is meaningful; the high byte
    /// is reserved for internal use by the provider.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code & 0xff {
            0 => InstanceState::Pending,
            16 => InstanceState::Running,
            32 => InstanceState::ShuttingDown,
            48 => InstanceState::Terminated,
            64 => InstanceState::Stopping,
            80 => InstanceState::Stopped,
            other => InstanceState::Unknown(other),
        }
    }

    /// EC2 state code
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            InstanceState::Pending => 0,
            InstanceState::Running => 16,
            InstanceState::ShuttingDown => 32,
            InstanceState::Terminated => 48,
            InstanceState::Stopping => 64,
            InstanceState::Stopped => 80,
            InstanceState::Unknown(code) => code,
        }
    }

    /// Pending or running: the instance counts toward its pool
    #[must_use]
    pub fn is_live(self) -> bool {
        (0..17).contains(&self.code())
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Pending => f.write_str("pending"),
            InstanceState::Running => f.write_str("running"),
            InstanceState::ShuttingDown => f.write_str("shutting-down"),
            InstanceState::Terminated => f.write_str("terminated"),
            InstanceState::Stopping => f.write_str("stopping"),
            InstanceState::Stopped => f.write_str("stopped"),
            InstanceState::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Status returned by `describe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// The resource exists and has no lifecycle of its own
    Available,
    Instance(InstanceState),
}

impl ResourceStatus {
    /// Whether the resource reached the terminated state
    #[must_use]
    pub fn is_terminated(self) -> bool {
        matches!(self, ResourceStatus::Instance(InstanceState::Terminated))
    }
}

/// Tag pair identifying a machine pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolSelector {
    /// Cluster tag value
    pub cluster: String,
    /// MachineType tag value
    pub machine_type: String,
}

impl PoolSelector {
    #[must_use]
    pub fn new(cluster: impl Into<String>, machine_type: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            machine_type: machine_type.into(),
        }
    }
}

impl fmt::Display for PoolSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.machine_type)
    }
}

/// One instance returned by a pool listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    /// Instance id
    pub id: String,
    /// Last reported state
    pub state: InstanceState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_predicate() {
        assert!(InstanceState::from_code(0).is_live());
        assert!(InstanceState::from_code(16).is_live());
        assert!(!InstanceState::from_code(32).is_live());
        assert!(!InstanceState::from_code(48).is_live());
        assert!(!InstanceState::from_code(80).is_live());
    }

    #[test]
    fn test_state_code_ignores_high_byte() {
        assert_eq!(InstanceState::from_code(16 | 0x100), InstanceState::Running);
        assert_eq!(InstanceState::from_code(0x230), InstanceState::ShuttingDown);
    }

    #[test]
    fn test_access_key_debug_hides_secret() {
        let key = AccessKey {
            access_key_id: "AKIA123".to_string(),
            secret_access_key: "very-secret".to_string(),
        };
        let debug = format!("{key:?}");
        assert!(debug.contains("AKIA123"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_ref_identity() {
        let user = ResourceRef::IamUser {
            name: "demo-infra-user".to_string(),
            group_name: "demo-infra-group".to_string(),
            access_key_id: None,
        };
        assert_eq!(user.kind(), ResourceKind::IamUser);
        assert_eq!(user.id(), "demo-infra-user");
        assert_eq!(user.to_string(), "iam-user demo-infra-user");
    }
}
