//! Resolution of the real AWS account id.

use std::fmt;

use async_trait::async_trait;
use aws_config::SdkConfig;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::AuthProxyError;

/// Source of the account id of the credentials the proxy signs with.
#[async_trait]
pub trait AccountIdResolver: Send + Sync + fmt::Debug {
    /// The real account id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthProxyError::AccountId`] if the account cannot be determined.
    async fn account_id(&self) -> Result<String, AuthProxyError>;
}

/// Resolves the account with `sts:GetCallerIdentity`, once per process.
///
/// Concurrent first callers share one in-flight STS call; a failed call is
/// not cached and is retried by the next caller.
#[derive(Debug)]
pub struct StsAccountIdResolver {
    client: aws_sdk_sts::Client,
    account: OnceCell<String>,
}

impl StsAccountIdResolver {
    /// Create a resolver using an STS client.
    #[must_use]
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self {
            client,
            account: OnceCell::new(),
        }
    }

    /// Create a resolver from a loaded SDK configuration.
    #[must_use]
    pub fn from_sdk_config(config: &SdkConfig) -> Self {
        Self::new(aws_sdk_sts::Client::new(config))
    }
}

#[async_trait]
impl AccountIdResolver for StsAccountIdResolver {
    async fn account_id(&self) -> Result<String, AuthProxyError> {
        let account = self
            .account
            .get_or_try_init(|| async {
                debug!("looking up caller identity");
                let identity = self
                    .client
                    .get_caller_identity()
                    .send()
                    .await
                    .map_err(|e| AuthProxyError::AccountId(e.to_string()))?;
                let account = identity
                    .account()
                    .map(str::to_owned)
                    .ok_or_else(|| AuthProxyError::AccountId("no account in caller identity".to_owned()))?;
                info!(%account, "resolved AWS account id");
                Ok::<_, AuthProxyError>(account)
            })
            .await?;
        Ok(account.clone())
    }
}

/// A fixed account id.
#[derive(Debug, Clone)]
pub struct StaticAccountIdResolver(String);

impl StaticAccountIdResolver {
    /// Always resolve to `account_id`.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self(account_id.into())
    }
}

#[async_trait]
impl AccountIdResolver for StaticAccountIdResolver {
    async fn account_id(&self) -> Result<String, AuthProxyError> {
        Ok(self.0.clone())
    }
}
