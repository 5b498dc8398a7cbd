//! AWS Signature Version 4 support for the AWS request proxy.
//!
//! The proxy does not verify signatures; it reads the credential scope of
//! incoming `Authorization` headers to learn the target region and service,
//! and rewrites that scope when a request is re-targeted to another region.
//! Rebuilt requests are signed by `aws-sigv4` in the auth proxy with
//! credentials from a [`CredentialProvider`].
//!
//! # Modules
//!
//! - [`credentials`] - Signing credentials and credential providers
//! - [`error`] - Authentication error types
//! - [`sigv4`] - `Authorization` header parsing and scope rewriting
//! - [`uri`] - Path and query encoding for rebuilt requests

pub mod credentials;
pub mod error;
pub mod sigv4;
pub mod uri;

pub use credentials::{CredentialProvider, SigningCredentials, StaticCredentialProvider};
pub use error::AuthError;
pub use sigv4::{
    ParsedAuth, extract_region_and_service, parse_authorization_header, rewrite_credential_region,
    synthesize_authorization,
};
