//! Integration tests against a real AWS account
//!
//! These tests create billable resources. Set AWS credentials and
//! `BOOTCTL_TEST_REGION` to run them.

use aws_client::{AwsProvider, CloudProvider, ResourceRef, ResourceSpec};

fn test_region() -> String {
    std::env::var("BOOTCTL_TEST_REGION").unwrap_or_else(|_| "us-east-2".to_string())
}

#[tokio::test]
#[ignore] // Requires AWS credentials
async fn test_vpc_lifecycle() {
    let provider = AwsProvider::new(&test_region()).await;

    let vpc = provider
        .create(&ResourceSpec::Vpc {
            cidr: "10.0.0.0/16".to_string(),
        })
        .await
        .expect("Failed to create VPC");

    let route_table = provider
        .lookup(&ResourceSpec::RouteTable {
            vpc_id: vpc.id().to_string(),
        })
        .await
        .expect("Failed to find main route table");
    assert!(matches!(route_table, ResourceRef::RouteTable { .. }));

    provider.delete(&vpc.resource).await.expect("Failed to delete VPC");
    let again = provider.delete(&vpc.resource).await;
    assert!(again.is_err_and(|e| e.is_not_found()));
}

#[tokio::test]
#[ignore] // Requires AWS credentials
async fn test_missing_instance_is_not_found() {
    let provider = AwsProvider::new(&test_region()).await;
    let err = provider
        .describe(&ResourceRef::Instance {
            id: "i-0000000000000000f".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}
