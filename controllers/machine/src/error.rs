//! Controller-specific error types.
//!
//! Provider errors never reach this type: a failed pool pass is recorded in
//! the Machine status instead. These are the Kubernetes-side failures that
//! the error policy requeues with backoff.

use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Machine Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// No Cluster object in the Machine's namespace
    #[error("No Cluster found in namespace {0}")]
    ClusterNotFound(String),

    /// Object is missing metadata the controller needs
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
