//! Decides which registered proxy instance, if any, claims a request.
//!
//! Instances are tried newest first. An instance claims a request when it has
//! rules for the request's service and the request passes all three checks:
//!
//! 1. a canonical resource identifier matches one of the resource patterns;
//! 2. the request is read-only, if the rules demand it;
//! 3. the operation matches one of the operation patterns, if any are set.

use std::sync::Arc;

use serde_json::{Map, Value};

use awsproxy_core::{AccountId, ProxyInstance, ProxyRegistry, canonical_service_name};
use awsproxy_protocol::ParsedRequest;

/// A parsed request in the context it was received in.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    /// Canonical service name.
    pub service: String,
    /// Operation name.
    pub operation: String,
    /// Region the request addresses.
    pub region: String,
    /// Account the request is made in.
    pub account_id: String,
    /// Operation parameters.
    pub params: Map<String, Value>,
}

impl ServiceRequest {
    /// Attach region and account to a parsed request.
    #[must_use]
    pub fn new(parsed: ParsedRequest, region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            service: canonical_service_name(&parsed.service).to_owned(),
            operation: parsed.operation,
            region: region.into(),
            account_id: account_id.into(),
            params: parsed.params,
        }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Canonical resource identifiers a request addresses.
///
/// Returns `None` for services without a resource model; those requests pass
/// any resource pattern.
#[must_use]
pub fn resource_candidates(request: &ServiceRequest) -> Option<Vec<String>> {
    let region = &request.region;
    let account = &request.account_id;
    match request.service.as_str() {
        "s3" => {
            let bucket = request.param("Bucket").unwrap_or_default();
            Some(vec![format!("arn:aws:s3:::{bucket}")])
        }
        "sqs" => Some(sqs_candidates(request)),
        "secretsmanager" => {
            let id = request
                .param("SecretId")
                .or_else(|| request.param("Name"))
                .unwrap_or_default();
            if id.starts_with("arn:") {
                Some(vec![id.to_owned()])
            } else {
                Some(vec![format!(
                    "arn:aws:secretsmanager:{region}:{account}:secret:{id}"
                )])
            }
        }
        "dynamodb" => {
            let tables = dynamodb_tables(&request.params);
            let tables = if tables.is_empty() { vec![String::new()] } else { tables };
            Some(
                tables
                    .iter()
                    .map(|t| format!("arn:aws:dynamodb:{region}:{account}:table/{t}"))
                    .collect(),
            )
        }
        _ => None,
    }
}

fn sqs_candidates(request: &ServiceRequest) -> Vec<String> {
    let queue_url = request.param("QueueUrl");
    let (url_account, url_name) = queue_url.map(split_queue_url).unwrap_or_default();

    let name = request.param("QueueName").or(url_name).unwrap_or_default();
    let account = url_account.unwrap_or(&request.account_id);
    let region = &request.region;

    let arn = format!("arn:aws:sqs:{region}:{account}:{name}");
    let url = queue_url.map_or_else(
        || format!("http://sqs.{region}.localhost.localstack.cloud:4566/{account}/{name}"),
        str::to_owned,
    );
    vec![arn, url]
}

/// Split a queue URL (`https://host/{account}/{name}`) into account and name.
fn split_queue_url(url: &str) -> (Option<&str>, Option<&str>) {
    let path = url.split_once("://").map_or(url, |(_, rest)| rest);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).skip(1).collect();
    let mut segments = segments.into_iter().rev();
    let name = segments.next();
    let account = segments
        .next()
        .filter(|a| a.len() == 12 && a.chars().all(|c| c.is_ascii_digit()));
    (account, name)
}

fn dynamodb_tables(params: &Map<String, Value>) -> Vec<String> {
    if let Some(table) = params.get("TableName").and_then(Value::as_str) {
        return vec![table.to_owned()];
    }
    params
        .get("RequestItems")
        .and_then(Value::as_object)
        .map(|items| items.keys().cloned().collect())
        .unwrap_or_default()
}

/// Whether an operation only reads state.
///
/// Operations starting with `Describe`, `Get`, `List` or `Query` are read-only,
/// plus a few service-specific reads with other names.
#[must_use]
pub fn is_read_request(service: &str, operation: &str) -> bool {
    let lower = operation.to_ascii_lowercase();
    if ["describe", "get", "list", "query"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return true;
    }
    match canonical_service_name(service) {
        "cognito-idp" => operation == "InitiateAuth",
        "dynamodb" => matches!(operation, "Scan" | "Query" | "BatchGetItem" | "PartiQLSelect"),
        _ => false,
    }
}

/// Select the newest registered instance that claims `request`.
#[must_use]
pub fn select_proxy(registry: &ProxyRegistry, request: &ServiceRequest) -> Option<Arc<ProxyInstance>> {
    let candidates = resource_candidates(request);
    let read_request = is_read_request(&request.service, &request.operation);

    registry.snapshot().into_iter().find(|instance| {
        let Some(rules) = instance.rules_for(&request.service) else {
            return false;
        };
        rules.matches_resource(candidates.as_deref())
            && (!rules.read_only() || read_request)
            && rules.matches_operation(&request.operation)
    })
}

/// Account a request is made in, from the access key of its credential.
#[must_use]
pub fn account_for_access_key(access_key_id: Option<&str>) -> AccountId {
    access_key_id.map_or_else(AccountId::default, AccountId::from_access_key)
}
