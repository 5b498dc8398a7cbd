//! Error types for the proxy core.

/// Core error type for proxy configuration and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Invalid AWS account ID format.
    #[error("invalid AWS account ID: {0} (must be 12-digit numeric string)")]
    InvalidAccountId(String),

    /// A resource or operation pattern failed to compile.
    #[error("invalid proxy configuration: pattern {pattern:?} for service {service}: {source}")]
    InvalidPattern {
        /// Service the pattern was configured for.
        service: String,
        /// The offending pattern.
        pattern: String,
        /// Underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The proxy configuration is structurally invalid.
    #[error("invalid proxy configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be loaded or rendered.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProxyError {
    /// Whether the error is caused by the caller's configuration.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAccountId(_)
                | Self::InvalidPattern { .. }
                | Self::InvalidConfig(_)
                | Self::Config(_)
        )
    }
}

impl From<serde_yaml::Error> for ProxyError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Convenience result type for proxy core operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
