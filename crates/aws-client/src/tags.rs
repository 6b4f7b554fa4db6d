//! Instance tagging contract
//!
//! Pool membership is defined purely by these tags: an instance belongs to a
//! pool when it carries `Cluster=<cluster>` and `MachineType=<machine type>`.

/// Tag holding the cluster name
pub const TAG_CLUSTER: &str = "Cluster";

/// Tag holding the pool's machine type
pub const TAG_MACHINE_TYPE: &str = "MachineType";

/// Display name tag
pub const TAG_NAME: &str = "Name";

/// EC2 describe filter name for a tag key
#[must_use]
pub fn tag_filter_name(key: &str) -> String {
    format!("tag:{key}")
}

/// Display name of an instance in a pool
#[must_use]
pub fn instance_name(cluster: &str, machine_type: &str) -> String {
    format!("{cluster}-{machine_type}")
}
