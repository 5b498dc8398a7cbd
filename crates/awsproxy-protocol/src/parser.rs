//! The request parser capability and its default implementation.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::{json, query, s3};

/// Wire protocol of an AWS request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `awsJson1_0` / `awsJson1_1`.
    Json,
    /// `awsQuery` (form-encoded `Action=...`).
    Query,
    /// S3 `restXml`.
    RestXml,
}

/// A request decoded into an operation and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    /// Canonical service name.
    pub service: String,
    /// Operation name, e.g. `PutItem`.
    pub operation: String,
    /// Wire protocol the request used.
    pub protocol: Protocol,
    /// Operation parameters without `null` values.
    pub params: Map<String, Value>,
    /// `X-Amz-Target` prefix for JSON requests, e.g. `DynamoDB_20120810`.
    pub target_prefix: Option<String>,
    /// API version for query requests, e.g. `2012-11-05`.
    pub api_version: Option<String>,
}

impl ParsedRequest {
    pub(crate) fn new(service: &str, operation: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            service: service.to_owned(),
            operation: operation.into(),
            protocol,
            params: Map::new(),
            target_prefix: None,
            api_version: None,
        }
    }

    /// A string parameter by name.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}

/// Decodes raw HTTP requests into operations and parameters.
pub trait RequestParser: Send + Sync + fmt::Debug {
    /// Parse a request addressed to `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the protocol is not recognized or the
    /// request is malformed.
    fn parse(
        &self,
        service: &str,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<ParsedRequest, ProtocolError>;
}

/// Parser that recognizes the protocol from the request shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsRequestParser;

impl AwsRequestParser {
    /// Detect the wire protocol of a request.
    #[must_use]
    pub fn detect(service: &str, parts: &http::request::Parts) -> Option<Protocol> {
        if service == "s3" {
            Some(Protocol::RestXml)
        } else if parts.headers.contains_key("x-amz-target") {
            Some(Protocol::Json)
        } else if parts.method == http::Method::POST || parts.uri.query().is_some() {
            Some(Protocol::Query)
        } else {
            None
        }
    }
}

impl RequestParser for AwsRequestParser {
    fn parse(
        &self,
        service: &str,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<ParsedRequest, ProtocolError> {
        let service = awsproxy_core::canonical_service_name(service);
        let mut parsed = match Self::detect(service, parts) {
            Some(Protocol::RestXml) => s3::parse(parts, body)?,
            Some(Protocol::Json) => json::parse(service, parts, body)?,
            Some(Protocol::Query) => query::parse(service, parts, body)?,
            None => return Err(ProtocolError::UnsupportedProtocol(service.to_owned())),
        };
        parsed.params.retain(|_, value| !value.is_null());
        tracing::debug!(
            service = %parsed.service,
            operation = %parsed.operation,
            protocol = ?parsed.protocol,
            "parsed AWS request"
        );
        Ok(parsed)
    }
}
