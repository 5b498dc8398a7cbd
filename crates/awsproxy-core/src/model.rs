//! Proxy configuration model.
//!
//! These types mirror the JSON/YAML documents exchanged between the CLI, the
//! control plane, and backing proxy processes:
//!
//! ```yaml
//! services:
//!   s3:
//!     resources: ".*my-bucket.*"
//!   dynamodb:
//!     resources: [".*:table/users", ".*:table/orders"]
//!     read_only: true
//!   sqs:
//!     operations: ["Get.*", "Receive.*"]
//! bind_host: 127.0.0.1
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, ProxyResult};
use crate::rules::ServiceRules;

/// Pattern matching every resource.
pub const MATCH_ALL: &str = ".*";

/// Default address a proxy listener binds to.
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Resource patterns given either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourcePatterns {
    /// A single pattern.
    One(String),
    /// An ordered list of patterns.
    Many(Vec<String>),
}

/// Forwarding policy for a single AWS service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyServiceConfig {
    /// Resource patterns matched against the canonical resource ARN or URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcePatterns>,
    /// Operation name patterns; when set, the operation must match one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<String>>,
    /// Only forward requests classified as read-only.
    #[serde(default)]
    pub read_only: bool,
}

impl ProxyServiceConfig {
    /// Configuration that forwards every resource of the service.
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            resources: Some(ResourcePatterns::One(MATCH_ALL.to_owned())),
            ..Self::default()
        }
    }

    /// The resource patterns to test, in configuration order.
    ///
    /// Omitted or empty `resources` means match-all (`[".*"]`).
    ///
    /// # Examples
    ///
    /// ```
    /// use awsproxy_core::{ProxyServiceConfig, ResourcePatterns};
    ///
    /// let config = ProxyServiceConfig::default();
    /// assert_eq!(config.resource_names(), vec![".*"]);
    ///
    /// let config = ProxyServiceConfig {
    ///     resources: Some(ResourcePatterns::One("foobar".into())),
    ///     ..Default::default()
    /// };
    /// assert_eq!(config.resource_names(), vec!["foobar"]);
    /// ```
    #[must_use]
    pub fn resource_names(&self) -> Vec<String> {
        match &self.resources {
            Some(ResourcePatterns::One(pattern)) if !pattern.is_empty() => vec![pattern.clone()],
            Some(ResourcePatterns::Many(patterns)) if !patterns.is_empty() => patterns.clone(),
            _ => vec![MATCH_ALL.to_owned()],
        }
    }
}

/// Configuration of one proxy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Per-service forwarding policies keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, ProxyServiceConfig>,
    /// Address the proxy listener binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
}

fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_owned()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            services: BTreeMap::new(),
            bind_host: default_bind_host(),
        }
    }
}

impl ProxyConfig {
    /// Build a configuration forwarding all resources of the given services.
    #[must_use]
    pub fn for_services<S: AsRef<str>>(services: &[S]) -> Self {
        let mut config = Self::default();
        config.add_services(services);
        config
    }

    /// Add match-all policies for services that are not configured yet.
    pub fn add_services<S: AsRef<str>>(&mut self, services: &[S]) {
        for service in services {
            let name = service.as_ref().trim();
            if !name.is_empty() {
                self.services
                    .entry(name.to_owned())
                    .or_insert_with(ProxyServiceConfig::match_all);
            }
        }
    }

    /// Parse a configuration document. JSON is accepted as a subset of YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if the document does not describe a
    /// valid configuration.
    pub fn from_yaml(document: &str) -> ProxyResult<Self> {
        if document.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(document)?)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> ProxyResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Compile the forwarding rules of every configured service.
    ///
    /// Service names are canonicalized, so a policy configured under an
    /// alias (e.g. `sqs-query`) applies to the canonical service.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidPattern`] for the first pattern that is
    /// not a valid regular expression.
    pub fn compile(&self) -> ProxyResult<HashMap<String, ServiceRules>> {
        self.services
            .iter()
            .map(|(service, config)| {
                let canonical = crate::canonical_service_name(service).to_owned();
                let rules = ServiceRules::compile(&canonical, config)?;
                Ok((canonical, rules))
            })
            .collect()
    }

    /// Validate the configuration without keeping the compiled rules.
    pub fn validate(&self) -> ProxyResult<()> {
        if self.bind_host.trim().is_empty() {
            return Err(ProxyError::InvalidConfig("bind_host must not be empty".into()));
        }
        self.compile().map(|_| ())
    }
}

/// Body of a `POST /_localstack/aws/proxies` registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProxyRequest {
    /// Port of a running proxy; omitted to ask the server to start one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// The proxy configuration.
    #[serde(deserialize_with = "deserialize_config")]
    pub config: ProxyConfig,
    /// Extra environment for a server-started proxy process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<HashMap<String, String>>,
}

/// Accept the configuration either inline or as a YAML/JSON string.
fn deserialize_config<'de, D>(deserializer: D) -> Result<ProxyConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Inline {
        Document(String),
        Config(ProxyConfig),
    }

    match Inline::deserialize(deserializer)? {
        Inline::Config(config) => Ok(config),
        Inline::Document(doc) => ProxyConfig::from_yaml(&doc).map_err(serde::de::Error::custom),
    }
}
