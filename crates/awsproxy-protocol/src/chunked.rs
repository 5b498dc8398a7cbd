//! `aws-chunked` body framing used by streaming S3 uploads.
//!
//! SDKs upload object bodies either with per-chunk signatures or unsigned
//! with a checksum trailer:
//!
//! ```text
//! <hex-size>;chunk-signature=<sig>\r\n      <hex-size>\r\n
//! <data>\r\n                                <data>\r\n
//! 0;chunk-signature=<sig>\r\n               0\r\n
//! \r\n                                      x-amz-checksum-crc32:<b64>\r\n
//!                                           \r\n
//! ```
//!
//! The chunk signatures are bound to the local credentials, so a relayed
//! request must carry the plain payload and be signed again.

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http::header::{CONTENT_ENCODING, HeaderValue};

use crate::error::ProtocolError;

const AWS_CHUNKED: &str = "aws-chunked";

/// Headers describing the chunk envelope; meaningless once it is removed.
pub const CHUNKED_ENVELOPE_HEADERS: &[&str] = &["x-amz-decoded-content-length", "x-amz-trailer"];

/// A decoded `aws-chunked` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedChunks {
    /// Concatenated chunk data.
    pub payload: Bytes,
    /// Trailing headers after the final chunk, e.g. `x-amz-checksum-crc32`.
    pub trailers: Vec<(String, String)>,
}

/// Whether the request body uses `aws-chunked` framing.
///
/// True if `Content-Encoding` lists `aws-chunked` or the payload hash is a
/// `STREAMING-*` marker.
#[must_use]
pub fn is_aws_chunked(headers: &HeaderMap) -> bool {
    let encoded = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(AWS_CHUNKED))
        });
    let streaming = headers
        .get("x-amz-content-sha256")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("STREAMING-"));
    encoded || streaming
}

/// Decode an `aws-chunked` body into its payload and trailers.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidBody`] if a size line is missing or not
/// hex, chunk data is truncated, or a chunk is not followed by CRLF.
pub fn decode_aws_chunked(body: &[u8]) -> Result<DecodedChunks, ProtocolError> {
    let mut payload = BytesMut::with_capacity(body.len());
    let mut pos = 0;

    loop {
        let line_end = find_crlf(body, pos)
            .ok_or_else(|| malformed("missing chunk size line"))?;
        let size_line = &body[pos..line_end];
        let hex = size_line
            .iter()
            .position(|&b| b == b';')
            .map_or(size_line, |semi| &size_line[..semi]);
        let hex = std::str::from_utf8(hex).map_err(|_| malformed("invalid chunk size encoding"))?;
        let size = usize::from_str_radix(hex.trim(), 16)
            .map_err(|_| malformed(&format!("invalid chunk size '{hex}'")))?;
        pos = line_end + 2;

        if size == 0 {
            break;
        }
        let data_end = pos
            .checked_add(size)
            .filter(|end| *end <= body.len())
            .ok_or_else(|| malformed("chunk data truncated"))?;
        payload.extend_from_slice(&body[pos..data_end]);
        pos = data_end;

        if body.get(pos..pos + 2) != Some(b"\r\n".as_slice()) {
            return Err(malformed("missing CRLF after chunk data"));
        }
        pos += 2;
    }

    Ok(DecodedChunks {
        payload: payload.freeze(),
        trailers: parse_trailers(&body[pos..])?,
    })
}

/// Remove `aws-chunked` from `Content-Encoding`, dropping the header when
/// nothing else is listed.
pub fn strip_aws_chunked_encoding(headers: &mut HeaderMap) {
    let Some(value) = headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let remaining: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && !token.eq_ignore_ascii_case(AWS_CHUNKED))
        .collect();

    if remaining.is_empty() {
        headers.remove(CONTENT_ENCODING);
    } else if let Ok(value) = HeaderValue::from_str(&remaining.join(", ")) {
        headers.insert(CONTENT_ENCODING, value);
    }
}

fn parse_trailers(rest: &[u8]) -> Result<Vec<(String, String)>, ProtocolError> {
    let text = std::str::from_utf8(rest).map_err(|_| malformed("trailer is not UTF-8"))?;
    let mut trailers = Vec::new();
    for line in text.split("\r\n").map(str::trim).filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| malformed(&format!("invalid trailer line '{line}'")))?;
        let name = name.trim().to_ascii_lowercase();
        // Signed uploads end with the trailer's own signature.
        if name == "x-amz-trailer-signature" {
            continue;
        }
        trailers.push((name, value.trim().to_owned()));
    }
    Ok(trailers)
}

fn find_crlf(data: &[u8], start: usize) -> Option<usize> {
    data.get(start..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| start + p)
}

fn malformed(reason: &str) -> ProtocolError {
    ProtocolError::InvalidBody(format!("malformed aws-chunked body: {reason}"))
}
