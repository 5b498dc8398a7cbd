//! Replication errors.

use aws_sdk_s3::error::DisplayErrorContext;

/// Errors raised while replicating resource state.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// No handler is registered for the resource type.
    #[error("unsupported resource type: {0}")]
    UnsupportedType(String),

    /// A resource lacks a property its handler needs.
    #[error("{resource_type} resource is missing property {property}")]
    MissingProperty {
        /// Resource type.
        resource_type: &'static str,
        /// Property name.
        property: &'static str,
    },

    /// An AWS API call failed.
    #[error("{operation} failed: {message}")]
    Aws {
        /// Operation name.
        operation: &'static str,
        /// Error with its source chain.
        message: String,
    },

    /// Captured state does not fit the resource.
    #[error("invalid resource state: {0}")]
    InvalidState(String),

    /// Submitting state to the gateway failed.
    #[error("submitting state to {url} failed: {reason}")]
    Gateway {
        /// Replication endpoint.
        url: String,
        /// What went wrong.
        reason: String,
    },
}

impl ReplicationError {
    pub(crate) fn aws<E: std::error::Error>(operation: &'static str, err: E) -> Self {
        Self::Aws {
            operation,
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    pub(crate) fn invalid(err: impl std::fmt::Display) -> Self {
        Self::InvalidState(err.to_string())
    }
}

/// Result alias for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
