//! AWS proxy gateway server.
//!
//! Listens in front of a local AWS emulator and forwards the requests claimed
//! by registered auth proxies to them. Unclaimed requests are relayed to
//! `LOCAL_BACKEND_URL`.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:4566 LOCAL_BACKEND_URL=http://127.0.0.1:4567 awsproxy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4566` | Bind address |
//! | `LOCAL_BACKEND_URL` | *(unset)* | Local emulator for unclaimed requests |
//! | `PROXY_TARGET_HOST` | `127.0.0.1` | Host used to reach proxy instances |
//! | `PROXY_CONNECT_TIMEOUT` | `5` | Forward connect timeout in seconds |
//! | `PROXY_REQUEST_TIMEOUT` | `60` | Forward request timeout in seconds |
//! | `PROXY_CLEANUP_CONTAINERS` | `true` | Remove backing process state on stop |
//! | `PROXY_DOCKER_FLAGS` | *(empty)* | Extra flags for backing proxy processes |
//! | `PROXY_LOCALSTACK_HOST` | *(unset)* | Gateway host handed to backing processes |
//! | `PROXY_BINARY` | `awsproxy` | Executable of backing proxy processes |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use awsproxy_core::{AwsRegion, ProxyEnvConfig, ProxyRegistry};
use awsproxy_forwarder::ProxyForwarder;
use awsproxy_gateway::{
    ControlPlane, GatewayService, HttpLocalBackend, LocalBackend, NotFoundBackend, ProcessLauncher,
};
use awsproxy_http::{serve, shutdown_signal};
use awsproxy_replicator::ReplicatorRegistry;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// SDK configuration addressing the local emulator with its fixed test
/// credentials.
fn local_sdk_config(endpoint_url: &str) -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(AwsRegion::DEFAULT))
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            "test", "test", None, None, "awsproxy-server",
        )))
        .endpoint_url(endpoint_url)
        .build()
}

/// Assemble the gateway service from the environment configuration.
fn build_gateway(config: &ProxyEnvConfig) -> Result<GatewayService> {
    let registry = Arc::new(ProxyRegistry::new());
    let forwarder = ProxyForwarder::new(config).context("failed to build forwarding client")?;
    let launcher = Arc::new(ProcessLauncher::new(config));
    let mut control = ControlPlane::new(Arc::clone(&registry), launcher);

    let backend: Arc<dyn LocalBackend> = match &config.local_backend_url {
        Some(url) => {
            let replicators = ReplicatorRegistry::from_sdk_config(&local_sdk_config(url), true);
            control = control.with_replicators(Arc::new(replicators));
            Arc::new(HttpLocalBackend::new(url.clone()))
        }
        None => Arc::new(NotFoundBackend),
    };

    Ok(GatewayService::builder()
        .registry(registry)
        .forwarder(forwarder)
        .control(control)
        .backend(backend)
        .build())
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Succeeds if the response is 200 OK and reports a running service.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET /_localstack/health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProxyEnvConfig::from_env();

    // Handle --health-check flag for container health checks.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    let gateway = build_gateway(&config)?;

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        local_backend = ?config.local_backend_url,
        target_host = %config.target_host,
        version = VERSION,
        "starting AWS proxy gateway",
    );

    serve(listener, gateway, shutdown_signal()).await;
    info!("gateway stopped");
    Ok(())
}
