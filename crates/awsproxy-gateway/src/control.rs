//! The proxy control plane under `/_localstack/aws/`.
//!
//! | Route | Effect |
//! |-------|--------|
//! | `POST /proxies` | register a proxy, starting a backing process when no port is given |
//! | `DELETE /proxies/{port}` | deregister a proxy |
//! | `GET /proxies/status` | report whether a backing process runs, and its config |
//! | `POST /proxies/status` | `{"status": "disabled"}` stops all backing processes |
//! | `POST /replicate` | import replicated resource state into the local emulator |

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

use awsproxy_core::{AddProxyRequest, PROXY_API_PATH, PROXY_STATUS_PATH, ProxyRegistry, REPLICATE_API_PATH};
use awsproxy_http::{ProxyBody, json_response};
use awsproxy_replicator::{ReplicateStateRequest, ReplicatorRegistry};

use crate::error::ControlError;
use crate::launcher::{ProxyLauncher, reserve_port};

/// Prefix shared by every control-plane route.
pub const CONTROL_PATH_PREFIX: &str = "/_localstack/aws/";

#[derive(Debug, Default, Deserialize)]
struct StatusUpdate {
    #[serde(default)]
    status: Option<String>,
}

/// Handles control-plane requests against the shared registry.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    registry: Arc<ProxyRegistry>,
    launcher: Arc<dyn ProxyLauncher>,
    replicators: Option<Arc<ReplicatorRegistry>>,
}

impl ControlPlane {
    /// Control plane managing `registry`, starting backing processes with
    /// `launcher`.
    pub fn new(registry: Arc<ProxyRegistry>, launcher: Arc<dyn ProxyLauncher>) -> Self {
        Self {
            registry,
            launcher,
            replicators: None,
        }
    }

    /// Enable `POST /replicate`, importing through `replicators`.
    #[must_use]
    pub fn with_replicators(mut self, replicators: Arc<ReplicatorRegistry>) -> Self {
        self.replicators = Some(replicators);
        self
    }

    /// Whether `path` belongs to the control plane.
    #[must_use]
    pub fn is_control_path(path: &str) -> bool {
        path.starts_with(CONTROL_PATH_PREFIX)
    }

    /// Answer a control-plane request.
    pub async fn handle(&self, method: &Method, path: &str, body: &Bytes) -> Response<ProxyBody> {
        match self.route(method, path, body).await {
            Ok(response) => response,
            Err(e) => {
                debug!(%method, path, error = %e, "control-plane request failed");
                e.into_response()
            }
        }
    }

    async fn route(
        &self,
        method: &Method,
        path: &str,
        body: &Bytes,
    ) -> Result<Response<ProxyBody>, ControlError> {
        let path = path.trim_end_matches('/');
        match (method, path) {
            (&Method::POST, PROXY_API_PATH) => self.add_proxy(decode(body)?).await,
            (&Method::GET, PROXY_STATUS_PATH) => Ok(self.status().await),
            (&Method::POST, PROXY_STATUS_PATH) => {
                let update: StatusUpdate = decode_or_default(body)?;
                if update.status.as_deref() == Some("disabled") {
                    self.launcher.stop_all().await;
                }
                Ok(ok_empty())
            }
            (&Method::POST, REPLICATE_API_PATH) => self.replicate(decode(body)?).await,
            (&Method::DELETE, _) => match deleted_port(path) {
                Some(port) => {
                    let removed = self.registry.remove(port);
                    Ok(json_response(StatusCode::OK, &json!({"removed": removed})))
                }
                None => Err(not_found(method, path)),
            },
            _ => Err(not_found(method, path)),
        }
    }

    async fn add_proxy(&self, request: AddProxyRequest) -> Result<Response<ProxyBody>, ControlError> {
        request.config.validate()?;
        let port = match request.port {
            Some(port) => port,
            None => {
                let port = reserve_port()
                    .await
                    .map_err(|e| ControlError::Launch(format!("no free port: {e}")))?;
                self.launcher.stop_all().await;
                let env_vars = request.env_vars.clone().unwrap_or_default();
                self.launcher.launch(port, &request.config, &env_vars).await?;
                port
            }
        };
        self.registry.register(port, request.config, request.env_vars)?;
        Ok(ok_empty())
    }

    async fn status(&self) -> Response<ProxyBody> {
        let active = self.launcher.active_config().await;
        let status = if active.is_some() { "enabled" } else { "disabled" };
        let config = active.and_then(|config| match config.to_yaml() {
            Ok(yaml) => Some(yaml),
            Err(e) => {
                debug!(error = %e, "unable to render proxy config");
                None
            }
        });
        json_response(StatusCode::OK, &json!({"status": status, "config": config}))
    }

    async fn replicate(
        &self,
        request: ReplicateStateRequest,
    ) -> Result<Response<ProxyBody>, ControlError> {
        let replicators = self
            .replicators
            .as_ref()
            .ok_or(ControlError::ReplicationUnavailable)?;
        let resource_type = request.resource_type.clone();
        let count = replicators.import(request).await?;
        info!(%resource_type, count, "imported replicated state");
        Ok(json_response(StatusCode::OK, &json!({"count": count})))
    }
}

fn deleted_port(path: &str) -> Option<u16> {
    path.strip_prefix(PROXY_API_PATH)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ControlError> {
    serde_json::from_slice(body).map_err(|e| ControlError::InvalidBody(e.to_string()))
}

fn decode_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ControlError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        decode(body)
    }
}

fn not_found(method: &Method, path: &str) -> ControlError {
    ControlError::NotFound {
        method: method.to_string(),
        path: path.to_owned(),
    }
}

fn ok_empty() -> Response<ProxyBody> {
    json_response(StatusCode::OK, &json!({}))
}
