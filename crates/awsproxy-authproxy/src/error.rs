//! Auth proxy errors.

use awsproxy_auth::AuthError;
use awsproxy_core::ProxyError;
use awsproxy_protocol::ProtocolError;

/// Errors raised while proxying a request to AWS.
#[derive(Debug, thiserror::Error)]
pub enum AuthProxyError {
    /// The `Authorization` header has no usable credential scope.
    #[error("missing or malformed credential scope in Authorization header")]
    MissingCredentialScope,

    /// The request could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Credentials for signing could not be resolved.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The rebuilt request could not be signed.
    #[error("cannot sign upstream request: {0}")]
    Signing(String),

    /// No endpoint is known for the service and region.
    #[error("cannot resolve endpoint: {0}")]
    Endpoint(String),

    /// The upstream request could not be built.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    /// Sending the request or reading the response failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The real account id could not be determined.
    #[error("cannot determine AWS account id: {0}")]
    AccountId(String),

    /// Registration with the gateway failed.
    #[error("registration with {url} failed: {reason}")]
    Registration {
        /// Registration endpoint.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The proxy configuration is invalid.
    #[error(transparent)]
    Config(#[from] ProxyError),

    /// The listener could not be set up.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<http::Error> for AuthProxyError {
    fn from(err: http::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
