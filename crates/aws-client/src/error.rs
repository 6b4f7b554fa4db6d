//! Cloud provider errors
//!
//! AWS SDK failures are classified by their error code (via
//! `ProvideErrorMetadata`) rather than by matching on message text.

use crate::models::ResourceKind;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Errors that can occur when operating on cloud resources
#[derive(Debug, Error)]
pub enum CloudError {
    /// Resource does not exist (already deleted, or never created)
    #[error("{operation}: resource not found ({code}): {message}")]
    NotFound {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("{operation}: throttled: {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },

    /// Resource still has dependent objects
    #[error("{operation}: dependency violation: {message}")]
    DependencyViolation {
        operation: &'static str,
        message: String,
    },

    /// Any other provider failure
    #[error("{operation} failed{}: {message}", code_suffix(.code.as_deref()))]
    Provider {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    /// Provider response lacked a field the caller needs
    #[error("{operation}: response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    /// Operation is not defined for this resource kind
    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        operation: &'static str,
        kind: ResourceKind,
    },

    /// Object body could not be read or decoded
    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl CloudError {
    /// Check if this is a "not found" error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

fn code_suffix(code: Option<&str>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidVpcID.NotFound",
    "InvalidSubnetID.NotFound",
    "InvalidRouteTableID.NotFound",
    "InvalidInternetGatewayID.NotFound",
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "InvalidInstanceID.NotFound",
    "Gateway.NotAttached",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
];

/// Known AWS error codes for throttling
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Known AWS error codes for dependency problems
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation", "DeleteConflict", "BucketNotEmpty"];

/// Classify an AWS error by its code
#[must_use]
pub fn classify(operation: &'static str, code: Option<&str>, message: Option<&str>) -> CloudError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => CloudError::NotFound {
            operation,
            code: c.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => CloudError::Throttled { operation, message },
        Some(c) if DEPENDENCY_CODES.contains(&c) => {
            CloudError::DependencyViolation { operation, message }
        }
        _ => CloudError::Provider {
            operation,
            code: code.map(ToString::to_string),
            message,
        },
    }
}

/// Classify an SDK error returned by any AWS service client.
///
/// Errors without service metadata (dispatch, timeout, response parsing) keep
/// the full error chain as their message.
pub(crate) fn from_sdk<E, R>(operation: &'static str, err: &SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => classify(operation, Some(code), err.message()),
        None => CloudError::Provider {
            operation,
            code: None,
            message: DisplayErrorContext(err).to_string(),
        },
    }
}
