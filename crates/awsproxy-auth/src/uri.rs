//! URI encoding for rebuilt requests.
//!
//! Paths and query strings are normalized to the strict SigV4 character set
//! (`A-Z a-z 0-9 - _ . ~` left as is) so the wire form matches what the
//! signer canonicalizes.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode each segment of a path once.
///
/// Segments are decoded first so an already-encoded path keeps its form.
/// Empty paths become `/`.
///
/// ```
/// use awsproxy_auth::uri::encode_path;
///
/// assert_eq!(encode_path(""), "/");
/// assert_eq!(encode_path("/a b"), "/a%20b");
/// assert_eq!(encode_path("/a%20b"), "/a%20b");
/// ```
#[must_use]
pub fn encode_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| uri_encode(&percent_decode_str(segment).decode_utf8_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode a query string into key-value pairs. `+` decodes to a space.
#[must_use]
pub fn decode_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (k, v) = param.split_once('=').unwrap_or((param, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

/// Encode key-value pairs as a query string, preserving their order.
///
/// ```
/// use awsproxy_auth::uri::encode_query;
///
/// let params = vec![("prefix".to_owned(), "a b/c".to_owned())];
/// assert_eq!(encode_query(&params), "prefix=a%20b%2Fc");
/// ```
#[must_use]
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a string using the SigV4 character set.
#[must_use]
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

fn decode_component(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}
