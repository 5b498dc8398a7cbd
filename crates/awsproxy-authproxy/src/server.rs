//! Auth proxy listener lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use awsproxy_http::serve;

use crate::account::StsAccountIdResolver;
use crate::config::AuthProxyConfig;
use crate::error::AuthProxyError;
use crate::register::{deregister_from_gateway, register_with_gateway};
use crate::sdk::SdkCredentialProvider;
use crate::service::AuthProxyService;
use crate::signer::SigV4Signer;

/// An auth proxy ready to listen.
#[derive(Debug)]
pub struct AuthProxy {
    config: AuthProxyConfig,
    service: AuthProxyService,
    client: reqwest::Client,
}

impl AuthProxy {
    /// Create a proxy serving requests with `service`.
    #[must_use]
    pub fn new(config: AuthProxyConfig, service: AuthProxyService) -> Self {
        Self {
            config,
            service,
            client: reqwest::Client::new(),
        }
    }

    /// Create a proxy that signs with the AWS default credential chain and
    /// resolves its account with STS.
    ///
    /// # Errors
    ///
    /// Returns [`AuthProxyError::Auth`] if the default chain yields no
    /// credentials provider.
    pub async fn from_default_chain(config: AuthProxyConfig) -> Result<Self, AuthProxyError> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let credentials = SdkCredentialProvider::from_sdk_config(&sdk_config).ok_or_else(|| {
            awsproxy_auth::AuthError::CredentialsUnavailable(
                "no AWS credentials provider configured".to_owned(),
            )
        })?;
        let service = AuthProxyService::builder()
            .signer(Arc::new(SigV4Signer::new(Arc::new(credentials))))
            .accounts(Arc::new(StsAccountIdResolver::from_sdk_config(&sdk_config)))
            .build();
        Ok(Self::new(config, service))
    }

    /// Bind the listener, start serving, and register with the gateway when
    /// configured to.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the listener cannot
    /// be bound, or registration fails. A failed registration stops the
    /// listener again.
    pub async fn start(self) -> Result<AuthProxyHandle, AuthProxyError> {
        self.config.proxy.validate()?;
        let listener = TcpListener::bind((self.config.listen_host(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(
            %addr,
            services = ?self.config.proxy.services.keys().collect::<Vec<_>>(),
            "auth proxy listening"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, self.service, async {
            shutdown_rx.await.ok();
        }));
        let handle = AuthProxyHandle {
            addr,
            gateway_url: self.config.register.then(|| self.config.gateway_url.clone()),
            client: self.client,
            shutdown: shutdown_tx,
            task,
        };

        if let Some(gateway_url) = &handle.gateway_url {
            let registered =
                register_with_gateway(&handle.client, gateway_url, addr.port(), &self.config.proxy)
                    .await;
            if let Err(e) = registered {
                warn!(
                    error = %e,
                    "unable to register auth proxy, is the gateway running with proxying enabled?"
                );
                handle.stop().await;
                return Err(e);
            }
        }
        Ok(handle)
    }
}

/// A running auth proxy.
#[derive(Debug)]
pub struct AuthProxyHandle {
    addr: SocketAddr,
    gateway_url: Option<String>,
    client: reqwest::Client,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl AuthProxyHandle {
    /// Address the proxy listens on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port the proxy listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Deregister from the gateway, stop accepting connections, and wait
    /// for in-flight requests.
    pub async fn shutdown(self) {
        if let Some(gateway_url) = &self.gateway_url {
            match deregister_from_gateway(&self.client, gateway_url, self.addr.port()).await {
                Ok(removed) => info!(removed, "deregistered auth proxy"),
                Err(e) => warn!(error = %e, "failed to deregister auth proxy"),
            }
        }
        self.stop().await;
    }

    async fn stop(self) {
        self.shutdown.send(()).ok();
        if let Err(e) = self.task.await {
            warn!(error = %e, "auth proxy task failed");
        }
    }
}
