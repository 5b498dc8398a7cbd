//! Response construction and upstream relay.

use std::io;

use futures::TryStreamExt;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use serde::Serialize;

use crate::body::{ProxyBody, empty_body, full_body};
use crate::headers::RELAY_DROPPED_HEADERS;

/// A JSON response with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ProxyBody> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(full_body(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize JSON response");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// A response with the given status and no body.
#[must_use]
pub fn empty_response(status: StatusCode) -> Response<ProxyBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// Relay an upstream response: status and headers are copied (minus
/// [`RELAY_DROPPED_HEADERS`]) and the body is streamed without buffering.
pub fn relay_response(upstream: reqwest::Response) -> Response<ProxyBody> {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in RELAY_DROPPED_HEADERS {
        headers.remove(*name);
    }

    let stream = upstream
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(io::Error::other);
    let body = StreamBody::new(stream).boxed_unsync();

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
