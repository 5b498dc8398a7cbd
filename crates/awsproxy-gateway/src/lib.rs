//! The AWS request proxy gateway.
//!
//! The gateway sits in front of a local AWS emulator. Requests claimed by a
//! registered proxy instance are forwarded to it; everything else is served
//! by the [`LocalBackend`]. The control plane under `/_localstack/aws/`
//! registers and removes proxy instances, starts backing proxy processes, and
//! imports replicated resource state.

pub mod backend;
pub mod control;
pub mod error;
pub mod launcher;
pub mod service;

pub use backend::{HttpLocalBackend, LocalBackend, NotFoundBackend};
pub use control::ControlPlane;
pub use error::ControlError;
pub use launcher::{CONFIG_FILE_NAME, ProcessLauncher, ProxyLauncher, reserve_port};
pub use service::{GatewayService, RequestContext, request_context};
