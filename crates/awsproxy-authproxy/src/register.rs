//! Registration of an auth proxy with the gateway.

use tracing::{debug, info};

use awsproxy_core::{AddProxyRequest, PROXY_API_PATH, ProxyConfig};

use crate::error::AuthProxyError;

/// Register a proxy listening on `port` with the gateway at `gateway_url`.
///
/// # Errors
///
/// Returns [`AuthProxyError::Registration`] if the gateway cannot be reached
/// or rejects the registration.
pub async fn register_with_gateway(
    client: &reqwest::Client,
    gateway_url: &str,
    port: u16,
    config: &ProxyConfig,
) -> Result<(), AuthProxyError> {
    let url = format!("{}{PROXY_API_PATH}", gateway_url.trim_end_matches('/'));
    let request = AddProxyRequest {
        port: Some(port),
        config: config.clone(),
        env_vars: None,
    };
    debug!(%url, port, "registering auth proxy");

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| AuthProxyError::Registration {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthProxyError::Registration {
            url,
            reason: format!("{status}: {body}"),
        });
    }

    info!(port, gateway = gateway_url, "registered auth proxy");
    Ok(())
}

/// Remove the registration of the proxy on `port`. Returns whether the
/// gateway knew the proxy.
///
/// # Errors
///
/// Returns [`AuthProxyError::Registration`] if the gateway cannot be reached.
pub async fn deregister_from_gateway(
    client: &reqwest::Client,
    gateway_url: &str,
    port: u16,
) -> Result<bool, AuthProxyError> {
    let url = format!("{}{PROXY_API_PATH}/{port}", gateway_url.trim_end_matches('/'));
    let failed = |e: reqwest::Error| AuthProxyError::Registration {
        url: url.clone(),
        reason: e.to_string(),
    };
    let response = client.delete(&url).send().await.map_err(failed)?;
    let body: serde_json::Value = response.json().await.map_err(failed)?;
    Ok(body["removed"].as_bool().unwrap_or(false))
}
