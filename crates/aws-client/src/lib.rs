//! Cloud resource handles
//!
//! Every cloud object the cluster bootstrap needs (VPC, route table, subnet,
//! internet gateway, security group, bucket, IAM policy/role/group/user,
//! instance profile, compute instance) is described by a [`ResourceSpec`]
//! variant and identified once it exists by a [`ResourceRef`] variant.
//! [`CloudProvider`] exposes the uniform capability set over both.
//!
//! # Example
//!
//! ```no_run
//! use aws_client::{AwsProvider, CloudProvider, ResourceSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = AwsProvider::new("us-east-2").await;
//! let vpc = provider
//!     .create(&ResourceSpec::Vpc { cidr: "10.0.0.0/16".to_string() })
//!     .await?;
//! provider.delete(&vpc.resource).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod models;
pub mod policy;
pub mod tags;
#[path = "trait.rs"]
pub mod provider_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::AwsProvider;
pub use context::AwsContext;
pub use error::CloudError;
pub use models::*;
pub use policy::PolicyDocument;
pub use provider_trait::{ArtifactStore, CloudProvider};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockCloudProvider};

/// Artifact-store key holding the serialized join command
pub const JOIN_ARTIFACT_KEY: &str = "join";
