//! Provisioning settings
//!
//! Passed by reference into every pipeline run; nothing here is global.

use crate::wait::WaitConfig;
use std::time::Duration;

/// Tunables for cluster provisioning and teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    /// CIDR block of the cluster VPC
    pub vpc_cidr: String,
    /// CIDR block of the single cluster subnet
    pub subnet_cidr: String,
    /// TCP ports the master security group opens to the world (API server, SSH)
    pub ingress_ports: Vec<i32>,
    /// Delay between creating the instance profile and launching an instance
    /// that references it. IAM offers no readiness signal for this.
    pub profile_settle: Duration,
    /// Polling bound for instance termination
    pub termination: WaitConfig,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            vpc_cidr: "10.0.0.0/16".to_string(),
            subnet_cidr: "10.0.0.0/18".to_string(),
            ingress_ports: vec![6443, 22],
            profile_settle: Duration::from_secs(15),
            termination: WaitConfig::default(),
        }
    }
}
