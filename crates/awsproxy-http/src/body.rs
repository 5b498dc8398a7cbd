//! Response body type shared by the proxy services.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Collected, Empty, Full};

/// Type-erased response body.
///
/// Relayed upstream bodies are streams that are `Send` but not necessarily
/// `Sync`, hence the unsync box.
pub type ProxyBody = UnsyncBoxBody<Bytes, io::Error>;

/// A body holding `data` in full.
pub fn full_body(data: impl Into<Bytes>) -> ProxyBody {
    Full::new(data.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// A body with no content.
#[must_use]
pub fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Collect an incoming request body into a single buffer.
pub async fn collect_body<B>(body: B) -> Result<Bytes, B::Error>
where
    B: Body,
{
    body.collect().await.map(Collected::to_bytes)
}

/// Whether a content type denotes a JSON payload
/// (`application/json`, `application/x-amz-json-1.0`, ...).
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.contains("json")
}

/// Re-serialize a JSON body in canonical form (sorted keys, no insignificant
/// whitespace). Bodies that are not valid JSON are returned unchanged.
#[must_use]
pub fn reencode_json(body: &Bytes) -> Bytes {
    if body.is_empty() {
        return body.clone();
    }
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_vec(&value).ok())
        .map_or_else(|| body.clone(), Bytes::from)
}
