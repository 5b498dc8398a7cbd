//! Environment-driven configuration for the gateway and its proxies.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Process configuration for the proxy gateway.
///
/// All fields have defaults; [`ProxyEnvConfig::from_env`] overrides them
/// from environment variables.
///
/// # Examples
///
/// ```
/// use awsproxy_core::ProxyEnvConfig;
///
/// let config = ProxyEnvConfig::builder().target_host("10.0.0.5".to_owned()).build();
/// assert_eq!(config.gateway_listen, "0.0.0.0:4566");
/// assert_eq!(config.target_host, "10.0.0.5");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEnvConfig {
    /// Bind address for the gateway.
    #[builder(default = String::from("0.0.0.0:4566"))]
    pub gateway_listen: String,

    /// Log level filter string.
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Base URL of the local emulator that serves non-proxied requests.
    #[builder(default)]
    pub local_backend_url: Option<String>,

    /// Host used to reach registered proxy instances.
    #[builder(default = String::from("127.0.0.1"))]
    pub target_host: String,

    /// Connect timeout for forwarded requests, in seconds.
    #[builder(default = 5)]
    pub connect_timeout_secs: u64,

    /// Timeout until response headers of a forwarded request, in seconds.
    #[builder(default = 60)]
    pub request_timeout_secs: u64,

    /// Remove backing proxy process state when the processes are stopped.
    #[builder(default = true)]
    pub cleanup_processes: bool,

    /// Extra command-line flags passed to backing proxy processes.
    #[builder(default)]
    pub launcher_flags: String,

    /// Host backing proxy processes use to reach the gateway.
    #[builder(default)]
    pub localstack_host: Option<String>,

    /// Executable started for backing proxy processes.
    #[builder(default = String::from("awsproxy"))]
    pub proxy_binary: String,
}

impl Default for ProxyEnvConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProxyEnvConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:4566` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOCAL_BACKEND_URL` | *(unset)* |
    /// | `PROXY_TARGET_HOST` | `127.0.0.1` |
    /// | `PROXY_CONNECT_TIMEOUT` | `5` |
    /// | `PROXY_REQUEST_TIMEOUT` | `60` |
    /// | `PROXY_CLEANUP_CONTAINERS` | `true` |
    /// | `PROXY_DOCKER_FLAGS` | *(empty)* |
    /// | `PROXY_LOCALSTACK_HOST` | *(unset)* |
    /// | `PROXY_BINARY` | `awsproxy` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = non_empty("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = non_empty("LOCAL_BACKEND_URL") {
            config.local_backend_url = Some(v.trim_end_matches('/').to_owned());
        }
        if let Some(v) = non_empty("PROXY_TARGET_HOST") {
            config.target_host = v;
        }
        if let Some(n) = non_empty("PROXY_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.connect_timeout_secs = n;
        }
        if let Some(n) = non_empty("PROXY_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.request_timeout_secs = n;
        }
        if let Some(v) = non_empty("PROXY_CLEANUP_CONTAINERS") {
            config.cleanup_processes = parse_bool(&v);
        }
        if let Some(v) = non_empty("PROXY_DOCKER_FLAGS") {
            config.launcher_flags = v;
        }
        if let Some(v) = non_empty("PROXY_LOCALSTACK_HOST") {
            config.localstack_host = Some(v);
        }
        if let Some(v) = non_empty("PROXY_BINARY") {
            config.proxy_binary = v;
        }

        config
    }

    /// Connect timeout for forwarded requests.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Timeout until response headers of a forwarded request arrive.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
