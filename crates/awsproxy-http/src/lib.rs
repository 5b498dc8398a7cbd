//! Shared HTTP plumbing for the AWS request proxy.
//!
//! Both listeners (the gateway and the auth proxy) are hyper services that
//! answer with [`ProxyBody`] responses, strip the same forwarding headers,
//! relay upstream `reqwest` responses as streams, and run the same graceful
//! accept loop.

pub mod body;
pub mod headers;
pub mod response;
pub mod server;

pub use body::{ProxyBody, collect_body, empty_body, full_body, is_json_content_type, reencode_json};
pub use headers::{original_host, preserve_original_host, set_host, strip_forwarding_headers};
pub use response::{empty_response, json_response, relay_response};
pub use server::{serve, shutdown_signal};
