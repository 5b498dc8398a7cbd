//! Request matching and forwarding for the AWS request proxy.
//!
//! The [`matcher`] decides whether a registered proxy instance claims an
//! inbound request; the [`forward`] module sends a claimed request to that
//! instance and relays the answer.

pub mod error;
pub mod forward;
pub mod matcher;

pub use error::ForwardError;
pub use forward::ProxyForwarder;
pub use matcher::{
    ServiceRequest, account_for_access_key, is_read_request, resource_candidates, select_proxy,
};
