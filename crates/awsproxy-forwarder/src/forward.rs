//! Sends a claimed request to its proxy instance and relays the response.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use awsproxy_auth::{rewrite_credential_region, synthesize_authorization};
use awsproxy_core::{AwsRegion, ProxyEnvConfig, ProxyInstance};
use awsproxy_http::{
    ProxyBody, is_json_content_type, original_host, preserve_original_host, reencode_json,
    relay_response, strip_forwarding_headers,
};

use crate::error::ForwardError;
use crate::matcher::ServiceRequest;

/// Access key used when a credential scope has to be synthesized.
const DEFAULT_ACCESS_KEY: &str = "test";

/// HTTP client for forwarding requests to proxy instances.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: reqwest::Client,
    target_host: String,
    request_timeout: Duration,
}

impl ProxyForwarder {
    /// Build a forwarder from the environment configuration.
    pub fn new(config: &ProxyEnvConfig) -> Result<Self, ForwardError> {
        Self::with_timeouts(
            config.target_host.clone(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// Build a forwarder with explicit timeouts.
    ///
    /// `request_timeout` bounds the wait for the response headers; the body
    /// is streamed afterwards without a deadline.
    pub fn with_timeouts(
        target_host: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self {
            client,
            target_host: target_host.into(),
            request_timeout,
        })
    }

    /// URL of `uri`'s path and query on the instance listening on `port`.
    #[must_use]
    pub fn target_url(&self, port: u16, uri: &http::Uri) -> String {
        match uri.query().filter(|q| !q.is_empty()) {
            Some(query) => format!("http://{}:{port}{}?{query}", self.target_host, uri.path()),
            None => format!("http://{}:{port}{}", self.target_host, uri.path()),
        }
    }

    /// Forward a request to `instance`.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::Unreachable`] if the instance cannot be
    /// connected to or does not answer within the request timeout, and
    /// [`ForwardError::Translation`] if the request cannot be built.
    pub async fn forward(
        &self,
        instance: &ProxyInstance,
        request: &ServiceRequest,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<ProxyBody>, ForwardError> {
        let port = instance.port;
        let url = self.target_url(port, &parts.uri);
        let headers = forward_headers(&parts.headers, &request.service, Utc::now());

        let json_body = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json_content_type);
        let body = if json_body { reencode_json(&body) } else { body };

        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .build()
            .map_err(|e| ForwardError::Translation(e.to_string()))?;

        debug!(
            port,
            url = %url,
            service = %request.service,
            operation = %request.operation,
            "forwarding request to proxy instance"
        );

        match tokio::time::timeout(self.request_timeout, self.client.execute(upstream)).await {
            Ok(Ok(response)) => Ok(relay_response(response)),
            Ok(Err(e)) if e.is_builder() => Err(ForwardError::Translation(e.to_string())),
            Ok(Err(e)) => Err(ForwardError::Unreachable {
                port,
                reason: e.to_string(),
            }),
            Err(_) => Err(ForwardError::Unreachable {
                port,
                reason: format!("no response within {:?}", self.request_timeout),
            }),
        }
    }
}

/// Headers of a forwarded request.
///
/// The original host is kept under `x-ls-host-original`, forwarding and
/// tracing headers are removed, and the credential scope is pointed at the
/// region named in the host, if any.
#[must_use]
pub fn forward_headers(original: &HeaderMap, service: &str, now: DateTime<Utc>) -> HeaderMap {
    let mut headers = original.clone();
    preserve_original_host(&mut headers);
    let region = original_host(&headers).and_then(AwsRegion::from_host);
    strip_forwarding_headers(&mut headers);

    if let Some(region) = region {
        inject_region(&mut headers, region.as_str(), service, now);
    }
    headers
}

fn inject_region(headers: &mut HeaderMap, region: &str, service: &str, now: DateTime<Utc>) {
    let authorization = match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(current) => rewrite_credential_region(current, region),
        None => Some(synthesize_authorization(DEFAULT_ACCESS_KEY, region, service, now)),
    };
    if let Some(value) = authorization.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(AUTHORIZATION, value);
    }
}
