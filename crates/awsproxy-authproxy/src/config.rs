//! Auth proxy startup configuration.

use typed_builder::TypedBuilder;

use awsproxy_core::ProxyConfig;

/// Gateway URL used when `LOCALSTACK_HOST` is not set.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost.localstack.cloud:4566";

/// How an auth proxy listens and where it registers.
///
/// # Examples
///
/// ```
/// use awsproxy_authproxy::AuthProxyConfig;
/// use awsproxy_core::ProxyConfig;
///
/// let config = AuthProxyConfig::builder()
///     .proxy(ProxyConfig::for_services(&["sqs"]))
///     .port(4510)
///     .build();
/// assert_eq!(config.listen_host(), "127.0.0.1");
/// assert!(config.register);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct AuthProxyConfig {
    /// Services and resources the proxy claims.
    pub proxy: ProxyConfig,

    /// Listen port; `0` picks a free port.
    #[builder(default)]
    pub port: u16,

    /// Listen host overriding `proxy.bind_host`.
    #[builder(default, setter(strip_option))]
    pub bind_host: Option<String>,

    /// Base URL of the gateway the proxy registers with.
    #[builder(default = String::from(DEFAULT_GATEWAY_URL))]
    pub gateway_url: String,

    /// Register with the gateway after binding.
    #[builder(default = true)]
    pub register: bool,
}

impl AuthProxyConfig {
    /// Host the listener binds to.
    #[must_use]
    pub fn listen_host(&self) -> &str {
        self.bind_host.as_deref().unwrap_or(&self.proxy.bind_host)
    }

    /// Gateway URL for a `LOCALSTACK_HOST` value (`host[:port]`), falling
    /// back to [`DEFAULT_GATEWAY_URL`].
    ///
    /// ```
    /// use awsproxy_authproxy::AuthProxyConfig;
    ///
    /// assert_eq!(AuthProxyConfig::gateway_url_for(Some("10.0.0.2:4566")), "http://10.0.0.2:4566");
    /// assert_eq!(
    ///     AuthProxyConfig::gateway_url_for(None),
    ///     "http://localhost.localstack.cloud:4566"
    /// );
    /// ```
    #[must_use]
    pub fn gateway_url_for(localstack_host: Option<&str>) -> String {
        match localstack_host.map(str::trim).filter(|h| !h.is_empty()) {
            Some(host) if host.contains("://") => host.trim_end_matches('/').to_owned(),
            Some(host) => format!("http://{}", host.trim_end_matches('/')),
            None => DEFAULT_GATEWAY_URL.to_owned(),
        }
    }
}
