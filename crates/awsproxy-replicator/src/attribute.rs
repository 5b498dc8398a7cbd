//! Conversion between SDK attribute values and DynamoDB JSON.
//!
//! DynamoDB JSON wraps every value in a single-key object naming its type,
//! e.g. `{"S": "text"}` or `{"M": {"n": {"N": "1"}}}`. Binary values are
//! base64 strings.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};

use crate::error::{ReplicationError, ReplicationResult};

/// Convert an item to DynamoDB JSON.
#[must_use]
pub fn item_to_json(item: &HashMap<String, AttributeValue>) -> Map<String, Value> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_json(value)))
        .collect()
}

/// Convert an item from DynamoDB JSON.
pub fn item_from_json(item: &Map<String, Value>) -> ReplicationResult<HashMap<String, AttributeValue>> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_json(value)?)))
        .collect()
}

/// Convert one attribute value to DynamoDB JSON.
#[must_use]
pub fn to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => json!({ "S": s }),
        AttributeValue::N(n) => json!({ "N": n }),
        AttributeValue::B(b) => json!({ "B": BASE64.encode(b.as_ref()) }),
        AttributeValue::Ss(v) => json!({ "SS": v }),
        AttributeValue::Ns(v) => json!({ "NS": v }),
        AttributeValue::Bs(v) => {
            let encoded: Vec<String> = v.iter().map(|b| BASE64.encode(b.as_ref())).collect();
            json!({ "BS": encoded })
        }
        AttributeValue::Bool(b) => json!({ "BOOL": b }),
        AttributeValue::Null(b) => json!({ "NULL": b }),
        AttributeValue::L(list) => json!({ "L": list.iter().map(to_json).collect::<Vec<_>>() }),
        AttributeValue::M(map) => json!({ "M": item_to_json(map) }),
        _ => json!({ "NULL": true }),
    }
}

/// Convert one attribute value from DynamoDB JSON.
pub fn from_json(value: &Value) -> ReplicationResult<AttributeValue> {
    let Some((kind, inner)) = value.as_object().filter(|o| o.len() == 1).and_then(|o| o.iter().next())
    else {
        return Err(invalid(value));
    };

    let attribute = match (kind.as_str(), inner) {
        ("S", Value::String(s)) => AttributeValue::S(s.clone()),
        ("N", Value::String(n)) => AttributeValue::N(n.clone()),
        ("B", Value::String(b)) => AttributeValue::B(decode_blob(b)?),
        ("SS", Value::Array(v)) => AttributeValue::Ss(strings(v).ok_or_else(|| invalid(value))?),
        ("NS", Value::Array(v)) => AttributeValue::Ns(strings(v).ok_or_else(|| invalid(value))?),
        ("BS", Value::Array(v)) => AttributeValue::Bs(
            strings(v)
                .ok_or_else(|| invalid(value))?
                .iter()
                .map(|b| decode_blob(b))
                .collect::<ReplicationResult<_>>()?,
        ),
        ("BOOL", Value::Bool(b)) => AttributeValue::Bool(*b),
        ("NULL", Value::Bool(b)) => AttributeValue::Null(*b),
        ("L", Value::Array(list)) => {
            AttributeValue::L(list.iter().map(from_json).collect::<ReplicationResult<_>>()?)
        }
        ("M", Value::Object(map)) => AttributeValue::M(item_from_json(map)?),
        _ => return Err(invalid(value)),
    };
    Ok(attribute)
}

fn strings(values: &[Value]) -> Option<Vec<String>> {
    values.iter().map(|v| v.as_str().map(str::to_owned)).collect()
}

fn decode_blob(encoded: &str) -> ReplicationResult<Blob> {
    BASE64
        .decode(encoded)
        .map(Blob::new)
        .map_err(ReplicationError::invalid)
}

fn invalid(value: &Value) -> ReplicationError {
    ReplicationError::InvalidState(format!("not a DynamoDB attribute value: {value}"))
}
