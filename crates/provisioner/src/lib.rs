//! Cluster provisioning core
//!
//! - [`pipeline`]: stack-based saga executor with create, lookup and wait steps
//! - [`cluster`]: the ordered bootstrap pipeline for a single-master cluster
//! - [`teardown`]: reverse-order, fail-fast deletion of an inventory
//! - [`pool`]: desired-vs-actual reconciliation of a worker pool
//! - [`bootstrap`]: instance bootstrap payloads
//! - [`inventory`]: inventory file persistence

pub mod bootstrap;
pub mod cluster;
pub mod error;
pub mod inventory;
pub mod pipeline;
pub mod pool;
pub mod settings;
pub mod teardown;
pub mod wait;

pub use cluster::{ClusterNames, ClusterRequest, cluster_pipeline, provision_cluster};
pub use error::ProvisionError;
pub use pipeline::{CreatePipeline, PipelineState, Provisioned, Step};
pub use pool::{ObservedPool, PoolOutcome, PoolTarget, observe_pool, reconcile_pool};
pub use settings::ProvisionSettings;
pub use teardown::{TeardownPipeline, TeardownReport};
pub use wait::WaitConfig;
