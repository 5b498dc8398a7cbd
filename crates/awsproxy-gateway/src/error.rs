//! Control-plane errors and their JSON rendering.

use http::{Response, StatusCode};
use serde_json::json;

use awsproxy_core::ProxyError;
use awsproxy_http::{ProxyBody, json_response};
use awsproxy_replicator::ReplicationError;

/// Errors raised by control-plane requests.
///
/// Rendered as `{"error": <kind>, "message": <text>}` with a status matching
/// the cause.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The proxy configuration was rejected.
    #[error(transparent)]
    Config(#[from] ProxyError),

    /// No control-plane route matches.
    #[error("no route for {method} {path}")]
    NotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// A backing proxy process could not be started.
    #[error("failed to launch proxy process: {0}")]
    Launch(String),

    /// State replication is not configured on this gateway.
    #[error("state replication requires a local backend")]
    ReplicationUnavailable,

    /// Importing replicated state failed.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

impl ControlError {
    /// HTTP status the error is answered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Config(e) if e.is_config_error() => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ReplicationUnavailable => StatusCode::NOT_IMPLEMENTED,
            Self::Replication(
                ReplicationError::UnsupportedType(_)
                | ReplicationError::MissingProperty { .. }
                | ReplicationError::InvalidState(_),
            ) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Launch(_) | Self::Replication(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short error type name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => "InvalidRequest",
            Self::Config(_) => "InvalidConfiguration",
            Self::NotFound { .. } => "NotFound",
            Self::Launch(_) => "LaunchFailed",
            Self::ReplicationUnavailable => "ReplicationUnavailable",
            Self::Replication(_) => "ReplicationFailed",
        }
    }

    /// Render the error as a JSON response.
    #[must_use]
    pub fn into_response(self) -> Response<ProxyBody> {
        json_response(
            self.status(),
            &json!({"error": self.kind(), "message": self.to_string()}),
        )
    }
}
