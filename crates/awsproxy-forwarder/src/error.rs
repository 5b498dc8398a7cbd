//! Forwarding errors.

/// Errors raised while forwarding a request to a proxy instance.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The proxy instance could not be reached or did not answer in time.
    #[error("proxy on port {port} is unreachable: {reason}")]
    Unreachable {
        /// Port of the unreachable instance.
        port: u16,
        /// What went wrong.
        reason: String,
    },

    /// The inbound request could not be turned into a forwarded request.
    #[error("unable to translate request: {0}")]
    Translation(String),

    /// The HTTP client could not be set up.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
