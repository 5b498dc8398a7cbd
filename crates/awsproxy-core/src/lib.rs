//! Core types, configuration, and proxy registry for the AWS request proxy.
//!
//! This crate provides the building blocks shared by the gateway, the
//! forwarder, and the auth proxy: the proxy configuration model, compiled
//! forwarding rules, the port-keyed proxy registry, service name
//! canonicalization, and common AWS type definitions.

mod config;
mod error;
pub mod model;
pub mod registry;
pub mod rules;
pub mod service;
mod types;

pub use config::ProxyEnvConfig;
pub use error::{ProxyError, ProxyResult};
pub use model::{AddProxyRequest, ProxyConfig, ProxyServiceConfig, ResourcePatterns};
pub use registry::{ProxyInstance, ProxyRegistry};
pub use rules::ServiceRules;
pub use service::canonical_service_name;
pub use types::{AccountId, AwsRegion};

/// Header carrying the original `Host` value across a forwarding hop.
pub const HEADER_HOST_ORIGINAL: &str = "x-ls-host-original";

/// Base path of the proxy control-plane API.
pub const PROXY_API_PATH: &str = "/_localstack/aws/proxies";

/// Path of the proxy status endpoint.
pub const PROXY_STATUS_PATH: &str = "/_localstack/aws/proxies/status";

/// Path of the state replication endpoint.
pub const REPLICATE_API_PATH: &str = "/_localstack/aws/replicate";
