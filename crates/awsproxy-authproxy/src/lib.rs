//! Auth proxy for the AWS request proxy.
//!
//! The auth proxy listens locally for requests the gateway forwards to it.
//! Each request still carries the local client's signature; the proxy reads
//! region and service from its credential scope, parses the request, rebuilds
//! it against the real AWS endpoint, signs it with real credentials, and
//! relays the response.
//!
//! The three steps that depend on AWS service knowledge are capabilities with
//! default implementations:
//!
//! - [`RequestParser`](awsproxy_protocol::RequestParser): raw request to
//!   operation and parameters;
//! - [`EndpointResolver`]: service, region, and parameters to endpoint;
//! - [`RequestBuilder`] and [`RequestSigner`]: parameters to a signed request.

pub mod account;
pub mod adjust;
pub mod builder;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod register;
pub mod sdk;
pub mod server;
pub mod service;
pub mod signer;

pub use account::{AccountIdResolver, StaticAccountIdResolver, StsAccountIdResolver};
pub use builder::{DefaultRequestBuilder, RequestBuilder};
pub use config::AuthProxyConfig;
pub use endpoint::{DefaultEndpointResolver, Endpoint, EndpointResolver, StaticEndpointResolver};
pub use error::AuthProxyError;
pub use register::{deregister_from_gateway, register_with_gateway};
pub use sdk::SdkCredentialProvider;
pub use server::{AuthProxy, AuthProxyHandle};
pub use service::AuthProxyService;
pub use signer::{RequestSigner, SigV4Signer};
