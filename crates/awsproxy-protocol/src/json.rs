//! `awsJson` request parsing.
//!
//! The operation comes from the `X-Amz-Target` header
//! (`DynamoDB_20120810.PutItem` → `PutItem`); the body is a JSON object.

use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::parser::{ParsedRequest, Protocol};

pub(crate) fn parse(
    service: &str,
    parts: &http::request::Parts,
    body: &[u8],
) -> Result<ParsedRequest, ProtocolError> {
    let target = parts
        .headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .ok_or(ProtocolError::MissingOperation("awsJson"))?;

    let (prefix, operation) = match target.rsplit_once('.') {
        Some((prefix, op)) => (Some(prefix), op),
        None => (None, target),
    };
    if operation.is_empty() {
        return Err(ProtocolError::MissingOperation("awsJson"));
    }

    let mut parsed = ParsedRequest::new(service, operation, Protocol::Json);
    parsed.target_prefix = prefix.map(str::to_owned);
    parsed.params = parse_object(body)?;
    Ok(parsed)
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ProtocolError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body)? {
        Value::Object(map) => Ok(map),
        other => Err(ProtocolError::InvalidBody(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
