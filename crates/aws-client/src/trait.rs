//! Provider traits for mocking
//!
//! `CloudProvider` abstracts the resource handle capabilities so the
//! pipelines and the reconciliation loop can run against the AWS SDK or an
//! in-memory mock.

use crate::error::CloudError;
use crate::models::{Created, InstanceSummary, PoolSelector, ResourceRef, ResourceSpec, ResourceStatus};

/// Uniform create/describe/delete capability set over every resource kind
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Region the provider operates in
    fn region(&self) -> &str;

    /// Create one resource. Produces side effects exactly once per call; the
    /// provider offers no idempotency, so callers must not retry blindly.
    async fn create(&self, spec: &ResourceSpec) -> Result<Created, CloudError>;

    /// Resolve a resource that is created implicitly by another one
    /// (the main route table of a VPC)
    async fn lookup(&self, spec: &ResourceSpec) -> Result<ResourceRef, CloudError>;

    /// Current status of a live resource
    async fn describe(&self, resource: &ResourceRef) -> Result<ResourceStatus, CloudError>;

    /// Delete a resource. Returns `CloudError::NotFound` when it is already gone.
    async fn delete(&self, resource: &ResourceRef) -> Result<(), CloudError>;

    /// Instances carrying the selector's Cluster and MachineType tags, in any state
    async fn list_instances(&self, selector: &PoolSelector) -> Result<Vec<InstanceSummary>, CloudError>;

    /// Instances carrying the cluster's Cluster tag, across every pool, in any state
    async fn list_cluster_instances(&self, cluster: &str) -> Result<Vec<InstanceSummary>, CloudError>;
}

/// Key/value object store holding bootstrap artifacts
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `body` under `key`, replacing any previous value
    async fn put_artifact(&self, bucket: &str, key: &str, body: &str) -> Result<(), CloudError>;

    /// Read the object stored under `key`
    async fn get_artifact(&self, bucket: &str, key: &str) -> Result<String, CloudError>;
}
