//! Bootctl CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the `bootctl` CLI and the
//! machine controller.

pub mod cluster;
pub mod error;
pub mod inventory;
pub mod machine;

pub use cluster::*;
pub use error::CrdError;
pub use inventory::*;
pub use machine::*;

/// API group for every resource in this crate
pub const API_GROUP: &str = "infra.bootctl.io";

/// Namespace holding cluster-level bootstrap objects (inventory, credentials)
pub const SYSTEM_NAMESPACE: &str = "kube-system";
