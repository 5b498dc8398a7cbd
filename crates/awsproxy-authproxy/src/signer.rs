//! Signing of rebuilt requests.
//!
//! Signatures are computed by `aws-sigv4`, the signer the AWS SDK itself
//! uses; this module only adapts credentials and per-service settings.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest, SigningParams,
    SigningSettings, UriPathNormalizationMode, sign,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use bytes::Bytes;

use awsproxy_auth::CredentialProvider;

use crate::endpoint::Endpoint;
use crate::error::AuthProxyError;

/// Signing headers left over from the local client's signature.
const STALE_SIGNING_HEADERS: &[&str] = &[
    "authorization",
    "x-amz-date",
    "x-amz-security-token",
    "x-amz-content-sha256",
];

/// Signs an upstream request for its endpoint.
#[async_trait]
pub trait RequestSigner: Send + Sync + fmt::Debug {
    /// Sign `request` in place for the endpoint's signing region and service.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be resolved or the request
    /// cannot be signed.
    async fn sign(
        &self,
        request: &mut http::Request<Bytes>,
        endpoint: &Endpoint,
    ) -> Result<(), AuthProxyError>;
}

/// SigV4 signer backed by a [`CredentialProvider`].
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: Arc<dyn CredentialProvider>,
}

impl SigV4Signer {
    /// Create a signer that asks `credentials` for credentials on every request.
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl RequestSigner for SigV4Signer {
    async fn sign(
        &self,
        request: &mut http::Request<Bytes>,
        endpoint: &Endpoint,
    ) -> Result<(), AuthProxyError> {
        let credentials = self.credentials.credentials().await?;
        let identity: Identity = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            "awsproxy",
        )
        .into();

        for name in STALE_SIGNING_HEADERS {
            request.headers_mut().remove(*name);
        }

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&endpoint.signing_region)
            .name(&endpoint.signing_service)
            .time(SystemTime::now())
            .settings(signing_settings(&endpoint.signing_service))
            .build()
            .map_err(|e| AuthProxyError::Signing(e.to_string()))?
            .into();

        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                value
                    .to_str()
                    .map(|value| (name.as_str(), value))
                    .map_err(|_| {
                        AuthProxyError::Signing(format!("non-ASCII value in header {}", name.as_str()))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let signable = SignableRequest::new(
            request.method().as_str(),
            request.uri().to_string(),
            headers.into_iter(),
            SignableBody::Bytes(request.body()),
        )
        .map_err(|e| AuthProxyError::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| AuthProxyError::Signing(e.to_string()))?
            .into_parts();
        instructions.apply_to_request_http1x(request);
        Ok(())
    }
}

/// S3 signs its path as sent and requires the payload hash header; other
/// services use the SDK defaults.
fn signing_settings(service: &str) -> SigningSettings {
    let mut settings = SigningSettings::default();
    if service == "s3" {
        settings.percent_encoding_mode = PercentEncodingMode::Single;
        settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
    }
    settings
}
