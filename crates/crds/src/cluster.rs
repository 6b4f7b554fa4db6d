//! Cluster CRD
//!
//! Describes the single Kubernetes cluster this tooling bootstraps.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "infra.bootctl.io",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cloud region every resource of the cluster lives in (e.g. "us-east-2")
    pub region: String,
}

impl Cluster {
    /// Cluster name taken from object metadata
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}
