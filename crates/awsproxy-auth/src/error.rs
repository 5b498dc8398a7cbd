//! Error types for SigV4 handling.

/// Errors raised while parsing credential scopes or resolving credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported (only AWS4-HMAC-SHA256 is supported).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The `Credential` component does not match the expected format
    /// (`AKID/date/region/service/aws4_request`).
    #[error("Invalid credential format")]
    InvalidCredential,

    /// No credentials could be obtained for signing.
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),
}
