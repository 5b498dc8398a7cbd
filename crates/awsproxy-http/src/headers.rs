//! Header hygiene for forwarded requests.

use http::HeaderMap;
use http::header::{HOST, HeaderValue};

use awsproxy_core::HEADER_HOST_ORIGINAL;

/// Headers removed from a request before it is forwarded. Transport headers
/// are recomputed by the client; the rest are local routing or tracing
/// artifacts that must not reach the upstream.
pub const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "x-forwarded-for",
    "remote-addr",
    "x-localstack-request-url",
    "x-localstack-tgt-api",
    "x-moto-account-id",
    "traceparent",
    "tracestate",
    "x-amzn-trace-id",
];

/// Hop-by-hop headers dropped from a relayed upstream response.
///
/// `content-length` is kept: relayed bodies are passed through unchanged, and
/// a `HEAD` response has no body to recompute it from.
pub const RELAY_DROPPED_HEADERS: &[&str] = &["transfer-encoding", "connection"];

/// Remove [`STRIPPED_HEADERS`] from `headers`.
pub fn strip_forwarding_headers(headers: &mut HeaderMap) {
    for name in STRIPPED_HEADERS {
        headers.remove(*name);
    }
}

/// The host the client originally addressed: `x-ls-host-original` when a
/// previous hop recorded it, else `Host`.
#[must_use]
pub fn original_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HEADER_HOST_ORIGINAL)
        .or_else(|| headers.get(HOST))
        .and_then(|v| v.to_str().ok())
}

/// Record the current `Host` under `x-ls-host-original` unless a previous
/// hop already did.
pub fn preserve_original_host(headers: &mut HeaderMap) {
    if headers.contains_key(HEADER_HOST_ORIGINAL) {
        return;
    }
    if let Some(host) = headers.get(HOST).cloned() {
        headers.insert(HEADER_HOST_ORIGINAL, host);
    }
}

/// Set `Host`, replacing any previous value.
pub fn set_host(headers: &mut HeaderMap, host: &str) -> Result<(), http::header::InvalidHeaderValue> {
    headers.insert(HOST, HeaderValue::from_str(host)?);
    Ok(())
}
