//! Artifact bucket and objects

use super::AwsProvider;
use crate::error::{CloudError, from_sdk};
use crate::models::ResourceRef;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::debug;

/// Region whose buckets must be created without a location constraint
const DEFAULT_S3_REGION: &str = "us-east-1";

impl AwsProvider {
    pub(super) async fn create_bucket(&self, name: &str) -> Result<ResourceRef, CloudError> {
        let mut request = self.s3.create_bucket().bucket(name);
        if self.region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| from_sdk("CreateBucket", &e))?;
        Ok(ResourceRef::Bucket {
            name: name.to_string(),
        })
    }

    /// Delete every object, then the bucket itself
    pub(super) async fn delete_bucket(&self, name: &str) -> Result<(), CloudError> {
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = self.s3.list_objects_v2().bucket(name);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| from_sdk("ListObjectsV2", &e))?;

            for key in response.contents().iter().filter_map(|object| object.key()) {
                debug!(bucket = %name, key = %key, "Deleting object");
                self.s3
                    .delete_object()
                    .bucket(name)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| from_sdk("DeleteObject", &e))?;
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(ToString::to_string);
            } else {
                break;
            }
        }

        self.s3
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteBucket", &e))?;
        Ok(())
    }

    pub(super) async fn put_object(&self, bucket: &str, key: &str, body: &str) -> Result<(), CloudError> {
        debug!(bucket = %bucket, key = %key, size = body.len(), "Uploading artifact");
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("PutObject", &e))?;
        Ok(())
    }

    pub(super) async fn get_object(&self, bucket: &str, key: &str) -> Result<String, CloudError> {
        let output = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk("GetObject", &e))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| CloudError::Payload(e.to_string()))?
            .into_bytes();
        String::from_utf8(bytes.to_vec()).map_err(|e| CloudError::Payload(e.to_string()))
    }
}
