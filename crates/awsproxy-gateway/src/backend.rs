//! The local emulator that serves requests no proxy claims.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Response, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use awsproxy_http::{ProxyBody, json_response, relay_response};

/// Serves requests that are not forwarded to a proxy instance.
#[async_trait]
pub trait LocalBackend: Send + Sync + fmt::Debug {
    /// Answer a request locally.
    async fn handle(&self, parts: http::request::Parts, body: Bytes) -> Response<ProxyBody>;
}

/// Relays requests to a local emulator over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLocalBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLocalBackend {
    /// Relay to the emulator at `base_url`, e.g. `http://127.0.0.1:4567`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Relay through an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, uri: &http::Uri) -> String {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{}{path_and_query}", self.base_url)
    }
}

#[async_trait]
impl LocalBackend for HttpLocalBackend {
    async fn handle(&self, parts: http::request::Parts, body: Bytes) -> Response<ProxyBody> {
        let url = self.url(&parts.uri);
        let mut headers = parts.headers;
        for name in [CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
            headers.remove(name);
        }

        debug!(%url, method = %parts.method, "serving request from local backend");
        match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(response) => relay_response(response),
            Err(e) => {
                warn!(%url, error = %e, "local backend is unreachable");
                json_response(
                    StatusCode::BAD_GATEWAY,
                    &json!({"error": "BackendUnavailable", "message": e.to_string()}),
                )
            }
        }
    }
}

/// Backend for a gateway without a local emulator: every request is a `404`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundBackend;

#[async_trait]
impl LocalBackend for NotFoundBackend {
    async fn handle(&self, parts: http::request::Parts, _body: Bytes) -> Response<ProxyBody> {
        json_response(
            StatusCode::NOT_FOUND,
            &json!({
                "error": "NotFound",
                "message": format!("no proxy or local backend serves {} {}", parts.method, parts.uri.path()),
            }),
        )
    }
}
