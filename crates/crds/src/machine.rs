//! Machine CRD
//!
//! Desired state of a pool of compute instances sharing one machine type.
//! Edited by operators; the machine controller only reads the spec and
//! writes the status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Machine type of the single master node created by `bootctl create`
pub const MASTER_MACHINE_TYPE: &str = "boot-master";

/// Instance type used when a Machine does not set one
pub const DEFAULT_INSTANCE_TYPE: &str = "t2.medium";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "infra.bootctl.io",
    version = "v1alpha1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.machineType"}"#,
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Observed","type":"integer","jsonPath":".status.observedReplicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Pool tag stamped on every instance as `MachineType=<value>`
    pub machine_type: String,

    /// Desired number of live instances in the pool
    #[serde(default)]
    pub replicas: u32,

    /// Machine image id
    pub ami: String,

    /// SSH key pair name
    pub key_name: String,

    /// Instance type (defaults to t2.medium)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

impl MachineSpec {
    /// Instance type with the default applied
    #[must_use]
    pub fn instance_type(&self) -> &str {
        self.instance_type.as_deref().unwrap_or(DEFAULT_INSTANCE_TYPE)
    }

    /// Whether this spec describes the master node rather than a worker pool
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.machine_type == MASTER_MACHINE_TYPE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Live instance count seen on the last reconciliation
    #[serde(default)]
    pub observed_replicas: u32,

    /// Replica count the last reconciliation worked toward
    #[serde(default)]
    pub desired_replicas: u32,

    /// Outcome of the last reconciliation
    #[serde(default)]
    pub state: PoolState,

    /// Error message from the last failed reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

/// Pool reconciliation state, PascalCase in the CRD schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum PoolState {
    /// Not reconciled yet
    #[default]
    Pending,

    /// Observed count matches desired count
    Reconciled,

    /// Instances were requested on the last pass
    ScalingUp,

    /// More instances are live than desired; nothing is terminated
    ScaleDownUnsupported,

    /// Last pass hit a provider error
    Failed,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolState::Pending => "Pending",
            PoolState::Reconciled => "Reconciled",
            PoolState::ScalingUp => "ScalingUp",
            PoolState::ScaleDownUnsupported => "ScaleDownUnsupported",
            PoolState::Failed => "Failed",
        };
        f.write_str(s)
    }
}
