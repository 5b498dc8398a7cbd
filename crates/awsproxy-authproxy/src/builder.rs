//! Rebuilding parsed requests against real AWS endpoints.

use std::fmt;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::Value;

use awsproxy_auth::uri::{decode_query, encode_path, encode_query};
use awsproxy_core::HEADER_HOST_ORIGINAL;
use awsproxy_protocol::chunked::{CHUNKED_ENVELOPE_HEADERS, strip_aws_chunked_encoding};
use awsproxy_protocol::{ParsedRequest, Protocol, decode_aws_chunked, is_aws_chunked};

use crate::adjust::{create_bucket_body, to_path_style};
use crate::endpoint::Endpoint;
use crate::error::AuthProxyError;

const X_AMZ_TARGET: HeaderName = HeaderName::from_static("x-amz-target");
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Headers of the local request that never reach AWS. Signing headers are
/// recomputed by the signer.
const S3_DROPPED_HEADERS: &[&str] = &[
    "authorization",
    "x-amz-date",
    "x-amz-content-sha256",
    "x-amz-security-token",
    "host",
    "content-length",
    HEADER_HOST_ORIGINAL,
];

/// Turns a parsed operation back into an HTTP request for an endpoint.
pub trait RequestBuilder: Send + Sync + fmt::Debug {
    /// Build the unsigned upstream request.
    ///
    /// `parts` and `body` are the inbound request after inbound fixes; S3
    /// requests reuse their path, query, headers and body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthProxyError::InvalidRequest`] if the request cannot be
    /// expressed against the endpoint.
    fn build(
        &self,
        parsed: &ParsedRequest,
        endpoint: &Endpoint,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Result<http::Request<Bytes>, AuthProxyError>;
}

/// Builder for the three wire protocols the parser understands.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestBuilder;

impl RequestBuilder for DefaultRequestBuilder {
    fn build(
        &self,
        parsed: &ParsedRequest,
        endpoint: &Endpoint,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Result<http::Request<Bytes>, AuthProxyError> {
        match parsed.protocol {
            Protocol::Json => build_json(parsed, endpoint, parts),
            Protocol::Query => build_query(parsed, endpoint),
            Protocol::RestXml => build_s3(parsed, endpoint, parts, body),
        }
    }
}

fn build_json(
    parsed: &ParsedRequest,
    endpoint: &Endpoint,
    parts: &http::request::Parts,
) -> Result<http::Request<Bytes>, AuthProxyError> {
    let prefix = parsed.target_prefix.as_deref().ok_or_else(|| {
        AuthProxyError::InvalidRequest(format!(
            "{} request without a target prefix",
            parsed.operation
        ))
    })?;
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or(HeaderValue::from_static(JSON_CONTENT_TYPE));
    let body = serde_json::to_vec(&parsed.params)
        .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;

    let request = http::Request::builder()
        .method(Method::POST)
        .uri(format!("{}/", endpoint.url))
        .header(CONTENT_TYPE, content_type)
        .header(X_AMZ_TARGET, format!("{prefix}.{}", parsed.operation))
        .body(Bytes::from(body))?;
    Ok(request)
}

fn build_query(
    parsed: &ParsedRequest,
    endpoint: &Endpoint,
) -> Result<http::Request<Bytes>, AuthProxyError> {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("Action", &parsed.operation);
    if let Some(version) = &parsed.api_version {
        form.append_pair("Version", version);
    }
    for (name, value) in &parsed.params {
        match value {
            Value::String(s) => form.append_pair(name, s),
            other => form.append_pair(name, &other.to_string()),
        };
    }

    let request = http::Request::builder()
        .method(Method::POST)
        .uri(format!("{}/", endpoint.url))
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(Bytes::from(form.finish()))?;
    Ok(request)
}

fn build_s3(
    parsed: &ParsedRequest,
    endpoint: &Endpoint,
    parts: &http::request::Parts,
    body: &Bytes,
) -> Result<http::Request<Bytes>, AuthProxyError> {
    let bucket = parsed.param_str("Bucket").unwrap_or_default();
    let path = parts.uri.path();
    let key_path = if bucket.is_empty() {
        path
    } else {
        path.strip_prefix('/')
            .and_then(|p| p.strip_prefix(bucket))
            .unwrap_or(path)
    };
    let key_path = if key_path.is_empty() || key_path == "/" {
        String::new()
    } else {
        encode_path(key_path)
    };

    let virtual_host = endpoint.url.contains(&format!("://{bucket}.s3."));
    let base = if bucket.is_empty() || virtual_host {
        format!("{}{key_path}", endpoint.url)
    } else {
        format!("{}/{bucket}{key_path}", endpoint.url)
    };
    let mut url = to_path_style(&base, bucket);
    if let Some(query) = parts.uri.query().filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&encode_query(&decode_query(query)));
    }

    let mut headers = copy_headers(&parts.headers);
    let body = if parsed.operation == "CreateBucket" {
        headers.remove("content-md5");
        create_bucket_body(&parsed.params)
    } else if is_aws_chunked(&parts.headers) {
        unwrap_chunked_body(&mut headers, body)?
    } else {
        body.clone()
    };

    let mut request = http::Request::builder()
        .method(parts.method.clone())
        .uri(url)
        .body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Replace an `aws-chunked` body by its payload, turning trailing checksums
/// into headers.
fn unwrap_chunked_body(headers: &mut HeaderMap, body: &Bytes) -> Result<Bytes, AuthProxyError> {
    let decoded = decode_aws_chunked(body)
        .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;
    strip_aws_chunked_encoding(headers);
    for name in CHUNKED_ENVELOPE_HEADERS {
        headers.remove(*name);
    }
    for (name, value) in decoded.trailers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;
        headers.insert(name, value);
    }
    Ok(decoded.payload)
}

fn copy_headers(headers: &HeaderMap) -> HeaderMap {
    let mut copied = headers.clone();
    for name in S3_DROPPED_HEADERS {
        copied.remove(*name);
    }
    copied
}
