//! AWS Signature Version 4 credential scopes.
//!
//! An `Authorization` header carries its credential scope as
//! `Credential=AKID/DATE/REGION/SERVICE/aws4_request`. The proxy reads the
//! scope to route requests ([`extract_region_and_service`]) and rewrites it
//! when the region is implied by the hostname ([`rewrite_credential_region`]).

use chrono::{DateTime, Utc};

use crate::error::AuthError;

/// The only algorithm supported by this implementation.
const SUPPORTED_ALGORITHM: &str = "AWS4-HMAC-SHA256";

const CREDENTIAL_PREFIX: &str = "Credential=";

/// Parsed components of an AWS SigV4 `Authorization` header.
#[derive(Debug, Clone)]
pub struct ParsedAuth {
    /// The access key ID.
    pub access_key_id: String,
    /// The date component of the credential scope (YYYYMMDD).
    pub date: String,
    /// The AWS region from the credential scope.
    pub region: String,
    /// The AWS service from the credential scope.
    pub service: String,
    /// The list of signed header names (lowercase).
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Parse an AWS SigV4 `Authorization` header value into its components.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if the header format is invalid,
/// [`AuthError::UnsupportedAlgorithm`] if the algorithm is not `AWS4-HMAC-SHA256`,
/// or [`AuthError::InvalidCredential`] for a malformed credential scope.
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (algorithm, rest) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;

    if algorithm != SUPPORTED_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(CREDENTIAL_PREFIX) {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = credential.ok_or(AuthError::InvalidAuthHeader)?;
    let signed_headers = signed_headers.ok_or(AuthError::InvalidAuthHeader)?;
    let signature = signature.ok_or(AuthError::InvalidAuthHeader)?;

    let cred_parts: Vec<&str> = credential.splitn(5, '/').collect();
    if cred_parts.len() != 5 || cred_parts[4] != "aws4_request" {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedAuth {
        access_key_id: cred_parts[0].to_owned(),
        date: cred_parts[1].to_owned(),
        region: cred_parts[2].to_owned(),
        service: cred_parts[3].to_owned(),
        signed_headers: signed_headers.split(';').map(ToOwned::to_owned).collect(),
        signature: signature.to_owned(),
    })
}

/// Extract `(region, service)` from an `Authorization` header.
///
/// Only a `Credential=` segment with at least five `/`-separated parts is
/// required. Anything else yields `None`.
///
/// # Examples
///
/// ```
/// use awsproxy_auth::extract_region_and_service;
///
/// let header = "AWS4-HMAC-SHA256 Credential=test/20240101/eu-west-1/sqs/aws4_request, \
///               SignedHeaders=host, Signature=abc";
/// assert_eq!(
///     extract_region_and_service(header),
///     Some(("eu-west-1".to_owned(), "sqs".to_owned()))
/// );
/// assert_eq!(extract_region_and_service("Bearer token"), None);
/// ```
#[must_use]
pub fn extract_region_and_service(header: &str) -> Option<(String, String)> {
    let (_, credential) = header.split_once(CREDENTIAL_PREFIX)?;
    let parts: Vec<&str> = credential.split('/').collect();
    if parts.len() < 5 {
        return None;
    }
    Some((parts[2].to_owned(), parts[3].to_owned()))
}

/// Replace the region of the credential scope in an `Authorization` header.
///
/// Returns `None` if the header has no well-formed credential scope.
#[must_use]
pub fn rewrite_credential_region(header: &str, region: &str) -> Option<String> {
    let start = header.find(CREDENTIAL_PREFIX)? + CREDENTIAL_PREFIX.len();
    let scope_len = header[start..]
        .find([',', ' '])
        .unwrap_or(header.len() - start);
    let scope = &header[start..start + scope_len];

    let mut parts: Vec<&str> = scope.split('/').collect();
    if parts.len() < 5 {
        return None;
    }
    parts[2] = region;

    Some(format!(
        "{}{}{}",
        &header[..start],
        parts.join("/"),
        &header[start + scope_len..]
    ))
}

/// Build a placeholder `Authorization` header carrying only a credential scope.
///
/// Used when a request has no `Authorization` header but the downstream
/// hop routes by region and service.
#[must_use]
pub fn synthesize_authorization(
    access_key_id: &str,
    region: &str,
    service: &str,
    time: DateTime<Utc>,
) -> String {
    let date = time.format("%Y%m%d");
    format!(
        "{SUPPORTED_ALGORITHM} Credential={access_key_id}/{date}/{region}/{service}/aws4_request, \
         SignedHeaders=content-type;host;x-amz-date, Signature={}",
        "0".repeat(64)
    )
}
