//! The auth proxy request pipeline as a hyper service.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{Request, Response, StatusCode};
use http_body::Body;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::debug;
use typed_builder::TypedBuilder;

use awsproxy_auth::extract_region_and_service;
use awsproxy_core::canonical_service_name;
use awsproxy_http::headers::RELAY_DROPPED_HEADERS;
use awsproxy_http::{ProxyBody, collect_body, empty_response, full_body, strip_forwarding_headers};
use awsproxy_protocol::{AwsRequestParser, ParsedRequest, RequestParser};

use crate::account::AccountIdResolver;
use crate::adjust::{adjust_params, fix_inbound_request};
use crate::builder::{DefaultRequestBuilder, RequestBuilder};
use crate::endpoint::{DefaultEndpointResolver, EndpointResolver};
use crate::error::AuthProxyError;
use crate::signer::RequestSigner;

/// Bodies are logged up to this many bytes.
const LOGGED_BODY_LIMIT: usize = 500;

/// Re-signs local requests with real credentials and relays them to AWS.
///
/// Every failure is answered with an empty `400` response; the cause is
/// logged at debug level.
#[derive(Debug, Clone, TypedBuilder)]
pub struct AuthProxyService {
    /// Signs rebuilt requests.
    signer: Arc<dyn RequestSigner>,
    /// Real account id, used to rewrite SQS queue references.
    accounts: Arc<dyn AccountIdResolver>,
    #[builder(default = Arc::new(AwsRequestParser) as Arc<dyn RequestParser>)]
    parser: Arc<dyn RequestParser>,
    #[builder(default = Arc::new(DefaultEndpointResolver) as Arc<dyn EndpointResolver>)]
    endpoints: Arc<dyn EndpointResolver>,
    #[builder(default = Arc::new(DefaultRequestBuilder) as Arc<dyn RequestBuilder>)]
    requests: Arc<dyn RequestBuilder>,
    #[builder(default)]
    client: reqwest::Client,
}

impl AuthProxyService {
    /// Proxy one request, answering `400` with an empty body on failure.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ProxyBody>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        match self.proxy(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "failed to proxy request to AWS");
                empty_response(StatusCode::BAD_REQUEST)
            }
        }
    }

    async fn proxy<B>(&self, request: Request<B>) -> Result<Response<ProxyBody>, AuthProxyError>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let (mut parts, body) = request.into_parts();
        let body = collect_body(body)
            .await
            .map_err(|e| AuthProxyError::InvalidRequest(format!("cannot read body: {e}")))?;

        let authorization = parts.headers.remove(AUTHORIZATION);
        let (region, service) = authorization
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .and_then(extract_region_and_service)
            .ok_or(AuthProxyError::MissingCredentialScope)?;
        let service = canonical_service_name(&service).to_owned();

        fix_inbound_request(&service, &mut parts)?;
        let mut parsed = self.parser.parse(&service, &parts, &body)?;
        strip_forwarding_headers(&mut parts.headers);
        debug!(
            service = %service,
            region = %region,
            operation = %parsed.operation,
            body = %truncated(&body),
            "proxying request to AWS"
        );

        let account = if needs_account(&parsed) {
            Some(self.accounts.account_id().await?)
        } else {
            None
        };
        adjust_params(&mut parsed, &region, account.as_deref());

        let endpoint = self.endpoints.resolve(&service, &region, &parsed.params)?;
        let mut upstream = self.requests.build(&parsed, &endpoint, &parts, &body)?;
        self.signer.sign(&mut upstream, &endpoint).await?;
        let request = reqwest::Request::try_from(upstream)?;

        let response = self.client.execute(request).await?;
        let status = response.status();
        let mut headers = response.headers().clone();
        let content = response.bytes().await?;
        debug!(
            status = status.as_u16(),
            url = %endpoint.url,
            body = %truncated(&content),
            "received response from AWS"
        );

        for name in RELAY_DROPPED_HEADERS {
            headers.remove(*name);
        }
        let mut relayed = Response::new(full_body(content));
        *relayed.status_mut() = status;
        *relayed.headers_mut() = headers;
        Ok(relayed)
    }
}

impl Service<Request<Incoming>> for AuthProxyService {
    type Response = Response<ProxyBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

/// SQS requests that reference a queue of the caller's account.
fn needs_account(parsed: &ParsedRequest) -> bool {
    parsed.service == "sqs"
        && (parsed.operation == "GetQueueUrl"
            || parsed.params.contains_key("QueueUrl")
            || parsed.params.contains_key("QueueOwnerAWSAccountId"))
}

fn truncated(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(LOGGED_BODY_LIMIT)]).into_owned()
}
