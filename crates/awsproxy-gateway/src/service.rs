//! Gateway service that routes requests to proxy instances or the local
//! backend.
//!
//! Health checks and control-plane calls are answered by the gateway itself.
//! Every other request is parsed into an operation; the newest registered
//! proxy instance whose rules claim it receives the request, and the local
//! backend serves the rest. An instance that cannot be reached is
//! deregistered and the request falls back to the local backend.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{AUTHORIZATION, HOST};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body::Body;
use hyper::body::Incoming;
use hyper::service::Service;
use serde_json::json;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use awsproxy_auth::{extract_region_and_service, parse_authorization_header};
use awsproxy_core::{AwsRegion, HEADER_HOST_ORIGINAL, ProxyRegistry, canonical_service_name};
use awsproxy_forwarder::{ForwardError, ProxyForwarder, ServiceRequest, account_for_access_key, select_proxy};
use awsproxy_http::{ProxyBody, collect_body, empty_response, json_response};
use awsproxy_protocol::s3::bucket_from_host;
use awsproxy_protocol::{AwsRequestParser, RequestParser};

use crate::backend::{LocalBackend, NotFoundBackend};
use crate::control::ControlPlane;

/// `X-Amz-Target` prefixes of JSON protocol services.
const TARGET_PREFIXES: &[(&str, &str)] = &[
    ("DynamoDB_", "dynamodb"),
    ("DynamoDBStreams_", "dynamodbstreams"),
    ("AmazonSQS", "sqs"),
    ("Kinesis_", "kinesis"),
    ("secretsmanager", "secretsmanager"),
    ("AmazonSSM", "ssm"),
    ("Logs_", "logs"),
    ("TrentService", "kms"),
    ("AWSEvents", "events"),
];

/// Service, region and caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Canonical service name.
    pub service: String,
    /// Region the request addresses.
    pub region: String,
    /// Access key of the request's credential, if signed.
    pub access_key_id: Option<String>,
}

/// Derive the context of a request from its headers.
///
/// The credential scope of `Authorization` names the service and region.
/// Unsigned requests fall back to the `X-Amz-Target` prefix or the host name,
/// with the region taken from the host or defaulted.
#[must_use]
pub fn request_context(headers: &HeaderMap) -> Option<RequestContext> {
    let host = headers
        .get(HEADER_HOST_ORIGINAL)
        .or_else(|| headers.get(HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let host_region = || {
        AwsRegion::from_host(host).map_or_else(|| AwsRegion::DEFAULT.to_owned(), |r| r.as_str().to_owned())
    };

    if let Some(authorization) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Ok(parsed) = parse_authorization_header(authorization) {
            return Some(RequestContext {
                service: canonical_service_name(&parsed.service).to_owned(),
                region: parsed.region,
                access_key_id: Some(parsed.access_key_id),
            });
        }
        if let Some((region, service)) = extract_region_and_service(authorization) {
            return Some(RequestContext {
                service: canonical_service_name(&service).to_owned(),
                region,
                access_key_id: None,
            });
        }
    }

    let service = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .and_then(|target| {
            TARGET_PREFIXES
                .iter()
                .find(|(prefix, _)| target.starts_with(prefix))
                .map(|(_, service)| (*service).to_owned())
        })
        .or_else(|| service_from_host(host))?;
    Some(RequestContext {
        service: canonical_service_name(&service).to_owned(),
        region: host_region(),
        access_key_id: None,
    })
}

/// Service named by the first label of a host such as
/// `sqs.us-east-1.localhost.localstack.cloud`.
fn service_from_host(host: &str) -> Option<String> {
    if bucket_from_host(host).is_some() {
        return Some("s3".to_owned());
    }
    let name = host.split(':').next().unwrap_or_default();
    let (label, rest) = name.split_once('.')?;
    let plausible = !rest.is_empty()
        && label != "localhost"
        && label.starts_with(|c: char| c.is_ascii_alphabetic());
    plausible.then(|| label.to_owned())
}

/// The gateway as a hyper service.
#[derive(Debug, Clone, TypedBuilder)]
pub struct GatewayService {
    /// Registered proxy instances.
    registry: Arc<ProxyRegistry>,
    /// Client for claimed requests.
    forwarder: ProxyForwarder,
    /// Control-plane handler; shares `registry`.
    control: ControlPlane,
    #[builder(default = Arc::new(NotFoundBackend) as Arc<dyn LocalBackend>)]
    backend: Arc<dyn LocalBackend>,
    #[builder(default = Arc::new(AwsRequestParser) as Arc<dyn RequestParser>)]
    parser: Arc<dyn RequestParser>,
}

impl GatewayService {
    /// Route one request.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ProxyBody>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let (parts, body) = request.into_parts();
        if is_health_check(&parts.method, parts.uri.path()) {
            return self.health_check_response();
        }

        let body = match collect_body(body).await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "failed to read request body");
                return empty_response(StatusCode::BAD_REQUEST);
            }
        };

        if ControlPlane::is_control_path(parts.uri.path()) {
            return self.control.handle(&parts.method, parts.uri.path(), &body).await;
        }
        if let Some(response) = self.try_forward(&parts, &body).await {
            return response;
        }
        self.backend.handle(parts, body).await
    }

    /// Forward the request to the instance that claims it. Returns `None`
    /// when the local backend should serve it.
    async fn try_forward(
        &self,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Option<Response<ProxyBody>> {
        if self.registry.is_empty() {
            return None;
        }
        let context = request_context(&parts.headers)?;
        let parsed = match self.parser.parse(&context.service, parts, body) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(service = %context.service, error = %e, "unable to parse request, serving locally");
                return None;
            }
        };
        let account = account_for_access_key(context.access_key_id.as_deref());
        let request = ServiceRequest::new(parsed, context.region, account.as_str());
        let instance = select_proxy(&self.registry, &request)?;

        match self.forwarder.forward(&instance, &request, parts, body.clone()).await {
            Ok(response) => Some(response),
            Err(ForwardError::Unreachable { port, reason }) => {
                self.registry.remove_instance(&instance);
                info!(port, %reason, "proxy instance is unreachable, removed it from the registry");
                None
            }
            Err(e) => {
                debug!(
                    service = %request.service,
                    operation = %request.operation,
                    error = %e,
                    "unable to forward request"
                );
                Some(json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({"error": "TranslationError", "message": e.to_string()}),
                ))
            }
        }
    }

    fn health_check_response(&self) -> Response<ProxyBody> {
        let ports: Vec<u16> = self.registry.snapshot().iter().map(|i| i.port).collect();
        json_response(
            StatusCode::OK,
            &json!({"services": {"aws-proxy": "running"}, "proxies": ports}),
        )
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<ProxyBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}

/// Check if the request is a health check.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET
        && (path == "/_localstack/health" || path == "/_health" || path == "/health")
}
