//! S3 `restXml` request routing.
//!
//! The operation is identified from the HTTP method, whether the request
//! addresses a bucket or an object, sub-resource query keys, and the
//! `x-amz-copy-source` header. The bucket comes from a virtual-hosted host
//! name when present, otherwise from the first path segment.

use std::sync::LazyLock;

use http::Method;
use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::parser::{ParsedRequest, Protocol};

/// Namespace of S3 request documents.
pub const S3_XML_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

static VIRTUAL_HOST_BUCKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)\.s3\..*(amazonaws\.com|localhost\.localstack\.cloud)")
        .expect("virtual host pattern is a valid regex")
});

/// Bucket name of a virtual-hosted-style host, e.g.
/// `photos.s3.eu-west-1.amazonaws.com` or
/// `photos.s3.localhost.localstack.cloud:4566`.
///
/// ```
/// use awsproxy_protocol::s3::bucket_from_host;
///
/// assert_eq!(bucket_from_host("photos.s3.amazonaws.com").as_deref(), Some("photos"));
/// assert_eq!(bucket_from_host("s3.amazonaws.com"), None);
/// assert_eq!(bucket_from_host("localhost:4566"), None);
/// ```
#[must_use]
pub fn bucket_from_host(host: &str) -> Option<String> {
    VIRTUAL_HOST_BUCKET
        .captures(host)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Bucket addressed by a request: the virtual host bucket of the original
/// host (`x-ls-host-original`, else `Host`).
#[must_use]
pub fn virtual_host_bucket(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(awsproxy_core::HEADER_HOST_ORIGINAL)
        .or_else(|| headers.get(http::header::HOST))
        .and_then(|v| v.to_str().ok())
        .and_then(bucket_from_host)
}

/// Render a `CreateBucketConfiguration` document for `region`.
///
/// ```
/// use awsproxy_protocol::s3::{parse_location_constraint, render_create_bucket_configuration};
///
/// let body = render_create_bucket_configuration("eu-west-1");
/// assert_eq!(
///     parse_location_constraint(body.as_bytes()).unwrap().as_deref(),
///     Some("eu-west-1")
/// );
/// ```
#[must_use]
pub fn render_create_bucket_configuration(region: &str) -> String {
    format!(
        "<CreateBucketConfiguration xmlns=\"{S3_XML_NAMESPACE}\"><LocationConstraint>{region}</LocationConstraint></CreateBucketConfiguration>"
    )
}

/// Extract the `LocationConstraint` from a `CreateBucketConfiguration`
/// document. Returns `None` for an empty body or a document without one.
///
/// # Errors
///
/// Returns [`ProtocolError::Xml`] if the document is malformed.
pub fn parse_location_constraint(body: &[u8]) -> Result<Option<String>, ProtocolError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut in_constraint = false;
    let mut constraint: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                in_constraint = e.local_name().as_ref() == b"LocationConstraint";
                if in_constraint {
                    constraint.get_or_insert_with(String::new);
                }
            }
            Event::Text(e) if in_constraint => {
                let decoded = e
                    .decode()
                    .map_err(|err| ProtocolError::InvalidBody(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| ProtocolError::InvalidBody(err.to_string()))?;
                if let Some(value) = constraint.as_mut() {
                    value.push_str(&unescaped);
                }
            }
            Event::End(_) => in_constraint = false,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(constraint.filter(|c| !c.is_empty()))
}

pub(crate) fn parse(
    parts: &http::request::Parts,
    body: &[u8],
) -> Result<ParsedRequest, ProtocolError> {
    let (path_bucket, path_key) = split_path(parts.uri.path());
    let (bucket, key) = match virtual_host_bucket(&parts.headers) {
        // Virtual host: the whole path is the key.
        Some(bucket) => {
            let key = parts.uri.path().trim_start_matches('/');
            let key = (!key.is_empty()).then(|| decode(key));
            (Some(bucket), key)
        }
        None => (path_bucket, path_key),
    };

    let query: Vec<String> = parts
        .uri
        .query()
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .filter(|(k, v)| k != "list-type" || v == "2")
                .map(|(k, _)| k.into_owned())
                .collect()
        })
        .unwrap_or_default();
    let copy_source = parts.headers.contains_key("x-amz-copy-source");

    let operation = identify_operation(
        &parts.method,
        bucket.is_some(),
        key.is_some(),
        &query,
        copy_source,
    )?;

    let mut parsed = ParsedRequest::new("s3", operation, Protocol::RestXml);
    let mut params = Map::new();
    // Service-level calls carry an empty bucket so they still have a resource.
    params.insert(
        "Bucket".to_owned(),
        Value::String(bucket.unwrap_or_default()),
    );
    if let Some(key) = key {
        params.insert("Key".to_owned(), Value::String(key));
    }
    if operation == "CreateBucket" && !body.is_empty() {
        let mut config = Map::new();
        if let Some(region) = parse_location_constraint(body)? {
            config.insert("LocationConstraint".to_owned(), Value::String(region));
        }
        params.insert("CreateBucketConfiguration".to_owned(), Value::Object(config));
    }
    parsed.params = params;
    Ok(parsed)
}

/// Split a path-style S3 path into `(bucket, key)`.
fn split_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.split_once('/') {
        _ if trimmed.is_empty() => (None, None),
        Some((bucket, key)) => (
            Some(decode(bucket)),
            (!key.is_empty()).then(|| decode(key)),
        ),
        None => (Some(decode(trimmed)), None),
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

// Sub-resource lookup tables, checked in order. The first query key present
// selects the operation; otherwise the default applies.

const BUCKET_GET: &[(&str, &str)] = &[
    ("list-type", "ListObjectsV2"),
    ("location", "GetBucketLocation"),
    ("versioning", "GetBucketVersioning"),
    ("encryption", "GetBucketEncryption"),
    ("cors", "GetBucketCors"),
    ("lifecycle", "GetBucketLifecycleConfiguration"),
    ("policy", "GetBucketPolicy"),
    ("tagging", "GetBucketTagging"),
    ("notification", "GetBucketNotificationConfiguration"),
    ("logging", "GetBucketLogging"),
    ("publicAccessBlock", "GetPublicAccessBlock"),
    ("ownershipControls", "GetBucketOwnershipControls"),
    ("object-lock", "GetObjectLockConfiguration"),
    ("accelerate", "GetBucketAccelerateConfiguration"),
    ("requestPayment", "GetBucketRequestPayment"),
    ("website", "GetBucketWebsite"),
    ("acl", "GetBucketAcl"),
    ("policyStatus", "GetBucketPolicyStatus"),
    ("uploads", "ListMultipartUploads"),
    ("versions", "ListObjectVersions"),
];

const BUCKET_PUT: &[(&str, &str)] = &[
    ("versioning", "PutBucketVersioning"),
    ("encryption", "PutBucketEncryption"),
    ("cors", "PutBucketCors"),
    ("lifecycle", "PutBucketLifecycleConfiguration"),
    ("policy", "PutBucketPolicy"),
    ("tagging", "PutBucketTagging"),
    ("notification", "PutBucketNotificationConfiguration"),
    ("logging", "PutBucketLogging"),
    ("publicAccessBlock", "PutPublicAccessBlock"),
    ("ownershipControls", "PutBucketOwnershipControls"),
    ("object-lock", "PutObjectLockConfiguration"),
    ("accelerate", "PutBucketAccelerateConfiguration"),
    ("requestPayment", "PutBucketRequestPayment"),
    ("website", "PutBucketWebsite"),
    ("acl", "PutBucketAcl"),
];

const BUCKET_DELETE: &[(&str, &str)] = &[
    ("encryption", "DeleteBucketEncryption"),
    ("cors", "DeleteBucketCors"),
    ("lifecycle", "DeleteBucketLifecycle"),
    ("policy", "DeleteBucketPolicy"),
    ("tagging", "DeleteBucketTagging"),
    ("publicAccessBlock", "DeletePublicAccessBlock"),
    ("ownershipControls", "DeleteBucketOwnershipControls"),
    ("website", "DeleteBucketWebsite"),
];

const OBJECT_GET: &[(&str, &str)] = &[
    ("tagging", "GetObjectTagging"),
    ("acl", "GetObjectAcl"),
    ("retention", "GetObjectRetention"),
    ("legal-hold", "GetObjectLegalHold"),
    ("attributes", "GetObjectAttributes"),
    ("uploadId", "ListParts"),
];

const OBJECT_PUT: &[(&str, &str)] = &[
    ("tagging", "PutObjectTagging"),
    ("acl", "PutObjectAcl"),
    ("retention", "PutObjectRetention"),
    ("legal-hold", "PutObjectLegalHold"),
];

const OBJECT_DELETE: &[(&str, &str)] = &[
    ("tagging", "DeleteObjectTagging"),
    ("uploadId", "AbortMultipartUpload"),
];

fn lookup(table: &[(&str, &'static str)], query: &[String], default: &'static str) -> &'static str {
    table
        .iter()
        .find(|(key, _)| query.iter().any(|q| q == key))
        .map_or(default, |(_, op)| *op)
}

fn has(query: &[String], key: &str) -> bool {
    query.iter().any(|q| q == key)
}

fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    query: &[String],
    copy_source: bool,
) -> Result<&'static str, ProtocolError> {
    let not_allowed = |target| ProtocolError::MethodNotAllowed {
        method: method.to_string(),
        target,
    };

    match (has_bucket, has_key) {
        (false, _) if *method == Method::GET => Ok("ListBuckets"),
        (false, _) => Err(not_allowed("service")),
        (true, false) => match *method {
            Method::GET => Ok(lookup(BUCKET_GET, query, "ListObjects")),
            Method::PUT => Ok(lookup(BUCKET_PUT, query, "CreateBucket")),
            Method::DELETE => Ok(lookup(BUCKET_DELETE, query, "DeleteBucket")),
            Method::HEAD => Ok("HeadBucket"),
            Method::POST if has(query, "delete") => Ok("DeleteObjects"),
            Method::POST => Ok("PostObject"),
            _ => Err(not_allowed("bucket")),
        },
        (true, true) => match *method {
            Method::GET => Ok(lookup(OBJECT_GET, query, "GetObject")),
            Method::PUT if has(query, "partNumber") && has(query, "uploadId") => Ok(if copy_source {
                "UploadPartCopy"
            } else {
                "UploadPart"
            }),
            Method::PUT => Ok(lookup(
                OBJECT_PUT,
                query,
                if copy_source { "CopyObject" } else { "PutObject" },
            )),
            Method::DELETE => Ok(lookup(OBJECT_DELETE, query, "DeleteObject")),
            Method::HEAD => Ok("HeadObject"),
            Method::POST if has(query, "uploads") => Ok("CreateMultipartUpload"),
            Method::POST if has(query, "uploadId") => Ok("CompleteMultipartUpload"),
            _ => Err(not_allowed("object")),
        },
    }
}
