//! Credentials from the AWS SDK default provider chain.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};

use awsproxy_auth::{AuthError, CredentialProvider, SigningCredentials};

/// [`CredentialProvider`] backed by an SDK credentials provider, so the
/// proxy signs with whatever the environment, profile, or instance role
/// provides, refreshed as the SDK sees fit.
#[derive(Debug, Clone)]
pub struct SdkCredentialProvider {
    inner: SharedCredentialsProvider,
}

impl SdkCredentialProvider {
    /// Wrap an SDK credentials provider.
    #[must_use]
    pub fn new(inner: SharedCredentialsProvider) -> Self {
        Self { inner }
    }

    /// The credentials provider of a loaded SDK configuration, if any.
    #[must_use]
    pub fn from_sdk_config(config: &SdkConfig) -> Option<Self> {
        config.credentials_provider().map(Self::new)
    }
}

#[async_trait]
impl CredentialProvider for SdkCredentialProvider {
    async fn credentials(&self) -> Result<SigningCredentials, AuthError> {
        let credentials = self
            .inner
            .provide_credentials()
            .await
            .map_err(|e| AuthError::CredentialsUnavailable(e.to_string()))?;
        let mut signing =
            SigningCredentials::new(credentials.access_key_id(), credentials.secret_access_key());
        if let Some(token) = credentials.session_token() {
            signing = signing.with_session_token(token);
        }
        Ok(signing)
    }
}
