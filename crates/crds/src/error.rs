//! CRD helper errors

use thiserror::Error;

/// Errors raised while interpreting custom resource contents
#[derive(Debug, Error)]
pub enum CrdError {
    /// Object is missing a field the caller requires
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}
