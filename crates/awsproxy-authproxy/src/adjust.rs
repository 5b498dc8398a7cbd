//! Request fixes applied between the local client and AWS.
//!
//! Inbound fixes undo local addressing (S3 virtual hosts on the emulator's
//! domain); parameter adjustments rewrite values that only make sense
//! locally (SQS queue URLs and owner accounts) or that AWS rejects
//! (`LocationConstraint` handling for `CreateBucket`).

use std::sync::LazyLock;

use bytes::Bytes;
use http::header::HOST;
use regex::Regex;
use serde_json::{Map, Value};

use awsproxy_core::{AwsRegion, HEADER_HOST_ORIGINAL};
use awsproxy_http::set_host;
use awsproxy_protocol::ParsedRequest;
use awsproxy_protocol::s3::{
    parse_location_constraint, render_create_bucket_configuration, virtual_host_bucket,
};

use crate::error::AuthProxyError;

/// Host S3 requests to a numeric or `localhost` host are readdressed to.
pub const LOCAL_S3_HOST: &str = "s3.localhost.localstack.cloud";

static LOCAL_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?([0-9.]+|localhost)(:[0-9]+)?")
        .expect("local host pattern is a valid regex")
});

const CREATE_BUCKET_CONFIGURATION: &str = "CreateBucketConfiguration";
const LOCATION_CONSTRAINT: &str = "LocationConstraint";

/// Undo local S3 addressing on an inbound request.
///
/// A numeric or `localhost` host becomes [`LOCAL_S3_HOST`], and the bucket
/// of a virtual-hosted original host is moved into the path, so the request
/// parses as path-style.
pub fn fix_inbound_request(
    service: &str,
    parts: &mut http::request::Parts,
) -> Result<(), AuthProxyError> {
    if service != "s3" {
        return Ok(());
    }

    let bucket = virtual_host_bucket(&parts.headers);
    parts.headers.remove(HEADER_HOST_ORIGINAL);

    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if LOCAL_HOST.is_match(host) {
        let fixed = LOCAL_HOST.replace(host, format!("${{1}}{LOCAL_S3_HOST}")).into_owned();
        set_host(&mut parts.headers, &fixed)
            .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;
    } else if bucket.is_some() {
        set_host(&mut parts.headers, LOCAL_S3_HOST)
            .map_err(|e| AuthProxyError::InvalidRequest(e.to_string()))?;
    }

    if let Some(bucket) = bucket {
        let path_and_query = match parts.uri.query() {
            Some(query) => format!("/{bucket}{}?{query}", parts.uri.path()),
            None => format!("/{bucket}{}", parts.uri.path()),
        };
        parts.uri = path_and_query
            .parse()
            .map_err(|e: http::uri::InvalidUri| AuthProxyError::InvalidRequest(e.to_string()))?;
    }
    Ok(())
}

/// Apply service-specific parameter fixes to a parsed request.
///
/// `account_id` is the real AWS account; it is only consulted for SQS.
pub fn adjust_params(parsed: &mut ParsedRequest, region: &str, account_id: Option<&str>) {
    match parsed.service.as_str() {
        "s3" if parsed.operation == "CreateBucket" => {
            adjust_create_bucket(&mut parsed.params, region);
        }
        "sqs" => {
            if let Some(account_id) = account_id {
                adjust_sqs(&parsed.operation, &mut parsed.params, account_id);
            }
        }
        _ => {}
    }
}

/// Make a `CreateBucket` request acceptable to AWS in `region`.
///
/// AWS rejects an explicit `us-east-1` constraint and requires one
/// everywhere else.
pub fn adjust_create_bucket(params: &mut Map<String, Value>, region: &str) {
    let constraint = params
        .get(CREATE_BUCKET_CONFIGURATION)
        .and_then(|c| c.get(LOCATION_CONSTRAINT))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    match constraint.as_deref() {
        Some(AwsRegion::DEFAULT) => {
            params.remove(CREATE_BUCKET_CONFIGURATION);
        }
        Some(_) => {}
        None if region == AwsRegion::DEFAULT => {
            params.remove(CREATE_BUCKET_CONFIGURATION);
        }
        None => {
            let mut config = Map::new();
            config.insert(LOCATION_CONSTRAINT.to_owned(), Value::String(region.to_owned()));
            params.insert(CREATE_BUCKET_CONFIGURATION.to_owned(), Value::Object(config));
        }
    }
}

/// Body of a `CreateBucket` request with the given parameters.
#[must_use]
pub fn create_bucket_body(params: &Map<String, Value>) -> Bytes {
    params
        .get(CREATE_BUCKET_CONFIGURATION)
        .and_then(|c| c.get(LOCATION_CONSTRAINT))
        .and_then(Value::as_str)
        .map_or_else(Bytes::new, |region| {
            Bytes::from(render_create_bucket_configuration(region))
        })
}

/// Rewrite a `CreateBucketConfiguration` body for `region`.
///
/// ```
/// use awsproxy_authproxy::adjust::rewrite_create_bucket_body;
///
/// assert!(rewrite_create_bucket_body(b"", "us-east-1").unwrap().is_empty());
/// let body = rewrite_create_bucket_body(b"", "eu-west-1").unwrap();
/// assert!(std::str::from_utf8(&body).unwrap().contains("<LocationConstraint>eu-west-1</LocationConstraint>"));
/// ```
///
/// # Errors
///
/// Returns an error if `body` is not well-formed XML.
pub fn rewrite_create_bucket_body(body: &[u8], region: &str) -> Result<Bytes, AuthProxyError> {
    let mut params = Map::new();
    if let Some(constraint) = parse_location_constraint(body)? {
        let mut config = Map::new();
        config.insert(LOCATION_CONSTRAINT.to_owned(), Value::String(constraint));
        params.insert(CREATE_BUCKET_CONFIGURATION.to_owned(), Value::Object(config));
    }
    adjust_create_bucket(&mut params, region);
    Ok(create_bucket_body(&params))
}

/// Point SQS queue references at the real account.
pub fn adjust_sqs(operation: &str, params: &mut Map<String, Value>, account_id: &str) {
    if let Some(Value::String(url)) = params.get_mut("QueueUrl") {
        *url = rewrite_queue_url(url, account_id);
    }
    if params.contains_key("QueueOwnerAWSAccountId") || operation == "GetQueueUrl" {
        params.insert(
            "QueueOwnerAWSAccountId".to_owned(),
            Value::String(account_id.to_owned()),
        );
    }
}

/// Rewrite a queue URL to the real account's queue of the same name.
///
/// ```
/// use awsproxy_authproxy::adjust::rewrite_queue_url;
///
/// assert_eq!(
///     rewrite_queue_url("http://localhost:4566/000000000000/orders", "123456789012"),
///     "https://queue.amazonaws.com/123456789012/orders"
/// );
/// ```
#[must_use]
pub fn rewrite_queue_url(queue_url: &str, account_id: &str) -> String {
    let name = queue_url.rsplit('/').next().unwrap_or(queue_url);
    format!("https://queue.amazonaws.com/{account_id}/{name}")
}

/// Rewrite an S3 virtual-host URL to path-style addressing: the bucket moves
/// from the host to the front of the path. An empty path becomes `/`.
///
/// ```
/// use awsproxy_authproxy::adjust::to_path_style;
///
/// assert_eq!(
///     to_path_style("https://photos.s3.amazonaws.com/a.jpg", "photos"),
///     "https://s3.amazonaws.com/photos/a.jpg"
/// );
/// assert_eq!(to_path_style("https://s3.amazonaws.com", ""), "https://s3.amazonaws.com/");
/// ```
#[must_use]
pub fn to_path_style(url: &str, bucket: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_owned();
    };
    let (host, path) = rest.find('/').map_or((rest, ""), |i| rest.split_at(i));

    let bucket_prefix = format!("{bucket}.s3.");
    if !bucket.is_empty() && host.starts_with(&bucket_prefix) {
        let host = &host[bucket.len() + 1..];
        return format!("{scheme}://{host}/{bucket}{path}");
    }
    let path = if path.is_empty() { "/" } else { path };
    format!("{scheme}://{host}{path}")
}
