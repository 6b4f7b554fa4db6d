//! Provisioning errors

use aws_client::CloudError;
use crds::{CrdError, ResourceRole};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while provisioning or tearing down a cluster
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A create or lookup step failed; earlier steps were compensated
    #[error("Failed to create {role}: {source} (rolled back {rolled_back}, {rollback_failures} rollback failures)")]
    Create {
        /// Role of the failed step
        role: ResourceRole,
        #[source]
        source: CloudError,
        /// Resources deleted during compensation
        rolled_back: usize,
        /// Compensating deletes that themselves failed
        rollback_failures: usize,
    },

    /// A step's spec could not be built from earlier results; earlier steps were compensated
    #[error("Cannot build {role}: {source} (rolled back {rolled_back}, {rollback_failures} rollback failures)")]
    Build {
        /// Role of the step whose spec could not be built
        role: ResourceRole,
        #[source]
        source: Box<ProvisionError>,
        /// Resources deleted during compensation
        rolled_back: usize,
        /// Compensating deletes that themselves failed
        rollback_failures: usize,
    },

    /// A teardown step failed; the remaining resources were left in place
    #[error("Failed to delete {role} ({resource}): {source}")]
    Teardown {
        /// Role whose delete failed
        role: ResourceRole,
        /// Provider handle of the resource, as displayed in logs
        resource: String,
        #[source]
        source: CloudError,
    },

    /// Pool instances tagged into the cluster could not be listed or terminated
    #[error("Failed to drain instances of cluster {cluster}: {source}")]
    Drain {
        /// Cluster tag the instances carry
        cluster: String,
        #[source]
        source: CloudError,
    },

    /// A readiness wait exceeded its bound
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Cloud provider error
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Inventory or manifest content error
    #[error("Resource error: {0}")]
    Crd(#[from] CrdError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML manifest decoding error
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    /// Inventory file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
