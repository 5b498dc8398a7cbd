//! Request parsing errors.

/// Errors raised while parsing an AWS request.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No wire protocol could be recognized for the request.
    #[error("unsupported protocol for service {0}")]
    UnsupportedProtocol(String),

    /// The request does not name an operation.
    #[error("missing operation in {0} request")]
    MissingOperation(&'static str),

    /// The HTTP method cannot address any operation.
    #[error("method {method} not allowed for {target}")]
    MethodNotAllowed {
        /// The HTTP method.
        method: String,
        /// What the request addressed (service, bucket, or object).
        target: &'static str,
    },

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// An XML document in the request body is malformed.
    #[error("XML processing error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidBody(err.to_string())
    }
}
