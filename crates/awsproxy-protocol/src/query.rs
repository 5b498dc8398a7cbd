//! `awsQuery` request parsing.
//!
//! Parameters come from the query string and, for form-encoded bodies, from
//! the body. `Action` names the operation and `Version` the API version; every
//! other field is kept as a string parameter under its flattened name
//! (`Attribute.1.Name`).

use serde_json::Value;

use crate::error::ProtocolError;
use crate::parser::{ParsedRequest, Protocol};

pub(crate) fn parse(
    service: &str,
    parts: &http::request::Parts,
    body: &[u8],
) -> Result<ParsedRequest, ProtocolError> {
    let mut fields: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    if is_form_body(parts) {
        fields.extend(form_urlencoded::parse(body).into_owned());
    }

    let mut action = None;
    let mut version = None;
    let mut params = serde_json::Map::new();
    for (name, value) in fields {
        match name.as_str() {
            "Action" => action = Some(value),
            "Version" => version = Some(value),
            _ => {
                params.insert(name, Value::String(value));
            }
        }
    }

    let operation = action
        .filter(|a| !a.is_empty())
        .ok_or(ProtocolError::MissingOperation("awsQuery"))?;

    let mut parsed = ParsedRequest::new(service, operation, Protocol::Query);
    parsed.api_version = version;
    parsed.params = params;

    if service == "sqs" && !parsed.params.contains_key("QueueUrl") {
        if let Some(url) = queue_url_from_path(parts) {
            parsed.params.insert("QueueUrl".to_owned(), Value::String(url));
        }
    }
    Ok(parsed)
}

/// Query-mode SQS addresses the queue by path (`POST /000000000000/my-queue`)
/// instead of a `QueueUrl` parameter.
fn queue_url_from_path(parts: &http::request::Parts) -> Option<String> {
    let path = parts.uri.path();
    if path.trim_matches('/').is_empty() {
        return None;
    }
    let host = parts
        .headers
        .get(awsproxy_core::HEADER_HOST_ORIGINAL)
        .or_else(|| parts.headers.get(http::header::HOST))
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(http::uri::Authority::as_str))?;
    Some(format!("http://{host}{path}"))
}

fn is_form_body(parts: &http::request::Parts) -> bool {
    match parts.headers.get(http::header::CONTENT_TYPE) {
        Some(ct) => ct
            .to_str()
            .is_ok_and(|ct| ct.starts_with("application/x-www-form-urlencoded")),
        // Query clients that omit the content type still send form bodies.
        None => parts.method == http::Method::POST,
    }
}
