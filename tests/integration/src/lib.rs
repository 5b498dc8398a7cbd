//! End-to-end scenarios for the AWS request proxy.
//!
//! Everything runs in-process on ephemeral ports: the gateway, the proxy
//! instances, the local emulator, and the AWS stand-ins are hyper servers,
//! and requests are made with the AWS SDK or `reqwest`.
//!
//! ```text
//! cargo test -p awsproxy-integration
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use aws_config::SdkConfig;
use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use aws_credential_types::provider::SharedCredentialsProvider;
use bytes::Bytes;
use http::{HeaderMap, Method, Response};
use hyper::body::Incoming;
use tokio::net::TcpListener;

use awsproxy_core::{ProxyEnvConfig, ProxyRegistry};
use awsproxy_forwarder::ProxyForwarder;
use awsproxy_gateway::{ControlPlane, GatewayService, HttpLocalBackend, ProcessLauncher};
use awsproxy_http::{ProxyBody, collect_body, serve};
use awsproxy_replicator::ReplicatorRegistry;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request received by a [`MockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Request URI as received.
    pub uri: http::Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// A header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The operation named by `X-Amz-Target`, e.g. `GetItem`.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.header("x-amz-target")
            .and_then(|target| target.rsplit('.').next())
    }

    /// The body parsed as JSON, or `null`.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_default()
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> Response<ProxyBody> + Send + Sync>;

/// An HTTP server that records every request and answers through a
/// responder function.
#[derive(Debug, Clone)]
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Start a server answering immediately.
    pub async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Response<ProxyBody> + Send + Sync + 'static,
    {
        Self::spawn_with_delay(Duration::ZERO, responder).await
    }

    /// Start a server that waits `delay` before answering each request.
    pub async fn spawn_with_delay<F>(delay: Duration, responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Response<ProxyBody> + Send + Sync + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let addr = listener.local_addr().expect("mock server has no address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let responder: Responder = Arc::new(responder);
        let recorded = Arc::clone(&requests);
        let svc = hyper::service::service_fn(move |req: http::Request<Incoming>| {
            let responder = Arc::clone(&responder);
            let recorded = Arc::clone(&recorded);
            async move {
                let (parts, body) = req.into_parts();
                let body = collect_body(body).await.unwrap_or_default();
                let request = RecordedRequest {
                    method: parts.method,
                    uri: parts.uri,
                    headers: parts.headers,
                    body,
                };
                recorded
                    .lock()
                    .expect("mock server lock poisoned")
                    .push(request.clone());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, Infallible>(responder(&request))
            }
        });
        tokio::spawn(serve(listener, svc, std::future::pending()));

        Self { addr, requests }
    }

    /// Base URL of the server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Port the server listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("mock server lock poisoned")
            .clone()
    }

    /// Operations (`X-Amz-Target` suffixes) received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.operation().map(str::to_owned))
            .collect()
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind placeholder listener");
    listener.local_addr().expect("placeholder has no address").port()
}

/// An in-process gateway in front of a mock local emulator.
#[derive(Debug)]
pub struct TestGateway {
    addr: SocketAddr,
    /// The gateway's proxy registry.
    pub registry: Arc<ProxyRegistry>,
}

impl TestGateway {
    /// Start a gateway relaying unclaimed requests to `local_backend`.
    pub async fn spawn(local_backend: &MockServer) -> Self {
        Self::start(local_backend, false).await
    }

    /// Start a gateway that also imports replicated state into
    /// `local_backend`.
    pub async fn spawn_with_replication(local_backend: &MockServer) -> Self {
        Self::start(local_backend, true).await
    }

    async fn start(local_backend: &MockServer, replication: bool) -> Self {
        init_tracing();
        let config = ProxyEnvConfig::builder()
            .local_backend_url(Some(local_backend.url()))
            .connect_timeout_secs(1)
            .request_timeout_secs(10)
            .build();
        let registry = Arc::new(ProxyRegistry::new());
        let launcher = Arc::new(ProcessLauncher::new(&config));
        let mut control = ControlPlane::new(Arc::clone(&registry), launcher);
        if replication {
            let replicators = ReplicatorRegistry::from_sdk_config(&sdk_config(&local_backend.url()), true);
            control = control.with_replicators(Arc::new(replicators));
        }

        let gateway = GatewayService::builder()
            .registry(Arc::clone(&registry))
            .forwarder(ProxyForwarder::new(&config).expect("failed to build forwarder"))
            .control(control)
            .backend(Arc::new(HttpLocalBackend::new(local_backend.url())))
            .build();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind gateway");
        let addr = listener.local_addr().expect("gateway has no address");
        tokio::spawn(serve(listener, gateway, std::future::pending()));

        Self { addr, registry }
    }

    /// Base URL of the gateway.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// SDK configuration with the emulator's test credentials.
#[must_use]
pub fn sdk_config(endpoint_url: &str) -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(SharedCredentialsProvider::new(credentials()))
        .endpoint_url(endpoint_url)
        .build()
}

fn credentials() -> Credentials {
    Credentials::new("test", "test", None, None, "integration-test")
}

/// Create an SQS client pointing at `endpoint_url`.
#[must_use]
pub fn sqs_client(endpoint_url: &str) -> aws_sdk_sqs::Client {
    init_tracing();

    let config = aws_sdk_sqs::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials())
        .endpoint_url(endpoint_url)
        .build();

    aws_sdk_sqs::Client::from_conf(config)
}

/// Create a DynamoDB client pointing at `endpoint_url`.
#[must_use]
pub fn dynamodb_client(endpoint_url: &str) -> aws_sdk_dynamodb::Client {
    init_tracing();

    let config = aws_sdk_dynamodb::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
        .credentials_provider(credentials())
        .endpoint_url(endpoint_url)
        .build();

    aws_sdk_dynamodb::Client::from_conf(config)
}

/// Create a path-style S3 client pointing at `endpoint_url`.
#[must_use]
pub fn s3_client(endpoint_url: &str, region: &str) -> aws_sdk_s3::Client {
    init_tracing();

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(region.to_owned()))
        .credentials_provider(credentials())
        .endpoint_url(endpoint_url)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// A response with an XML body.
#[must_use]
pub fn xml_response(status: http::StatusCode, body: &str) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(awsproxy_http::full_body(body.to_owned()))
        .expect("valid XML response")
}

mod test_authproxy;
mod test_control;
mod test_forwarding;
mod test_replicate;
