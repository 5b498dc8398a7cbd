//! Submission of exported state to the gateway.

use tracing::debug;

use awsproxy_core::REPLICATE_API_PATH;

use crate::error::{ReplicationError, ReplicationResult};
use crate::model::ReplicateStateRequest;

/// Send an exported resource to the gateway at `gateway_url`, which imports
/// it into the local emulator. Returns the number of entries imported.
pub async fn submit_state(
    client: &reqwest::Client,
    gateway_url: &str,
    request: &ReplicateStateRequest,
) -> ReplicationResult<usize> {
    let url = format!("{}{REPLICATE_API_PATH}", gateway_url.trim_end_matches('/'));
    let failed = |reason: String| ReplicationError::Gateway {
        url: url.clone(),
        reason,
    };
    debug!(%url, resource_type = %request.resource_type, "submitting resource state");

    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.map_err(|e| failed(e.to_string()))?;
    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or_default();
        return Err(failed(format!("{status}: {message}")));
    }
    Ok(body["count"]
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default())
}
