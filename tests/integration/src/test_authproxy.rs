//! Auth proxies registered with a live gateway.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aws_sdk_sts::config::{BehaviorVersion, Credentials, Region};
    use http::header::CONTENT_TYPE;
    use aws_sdk_s3::primitives::ByteStream;
    use http::{Method, Response, StatusCode};
    use serde_json::json;

    use awsproxy_auth::StaticCredentialProvider;
    use awsproxy_authproxy::{
        AccountIdResolver, AuthProxy, AuthProxyConfig, AuthProxyService, SigV4Signer,
        StaticAccountIdResolver, StaticEndpointResolver, StsAccountIdResolver,
    };
    use awsproxy_core::ProxyConfig;
    use awsproxy_http::{ProxyBody, full_body, json_response};

    use crate::{MockServer, RecordedRequest, TestGateway, s3_client, sqs_client};

    const CALLER_IDENTITY: &str = r#"<GetCallerIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <GetCallerIdentityResult>
    <Arn>arn:aws:iam::123456789012:user/dev</Arn>
    <UserId>AIDAEXAMPLE</UserId>
    <Account>123456789012</Account>
  </GetCallerIdentityResult>
  <ResponseMetadata>
    <RequestId>c6104cbe-af31-11e0-8154-cbc7ccf896c7</RequestId>
  </ResponseMetadata>
</GetCallerIdentityResponse>"#;

    fn proxy_service(aws_url: &str) -> AuthProxyService {
        AuthProxyService::builder()
            .signer(Arc::new(SigV4Signer::new(Arc::new(StaticCredentialProvider::new(
                "AKIAREALKEY",
                "real-secret",
            )))))
            .accounts(Arc::new(StaticAccountIdResolver::new("123456789012")))
            .endpoints(Arc::new(StaticEndpointResolver::new(aws_url)))
            .build()
    }

    #[tokio::test]
    async fn test_should_relay_sdk_request_to_aws_through_registered_proxy() {
        let local = MockServer::spawn(|_| {
            json_response(StatusCode::OK, &json!({"QueueUrl": "http://local/000000000000/orders"}))
        })
        .await;
        let aws = MockServer::spawn(|_| {
            json_response(
                StatusCode::OK,
                &json!({"QueueUrl": "https://queue.amazonaws.com/123456789012/orders"}),
            )
        })
        .await;
        let gateway = TestGateway::spawn(&local).await;

        let config = AuthProxyConfig::builder()
            .proxy(ProxyConfig::for_services(&["sqs"]))
            .gateway_url(gateway.url())
            .build();
        let handle = AuthProxy::new(config, proxy_service(&aws.url()))
            .start()
            .await
            .unwrap();
        assert!(gateway.registry.get(handle.port()).is_some());

        let output = sqs_client(&gateway.url())
            .get_queue_url()
            .queue_name("orders")
            .send()
            .await
            .unwrap();
        assert_eq!(
            output.queue_url(),
            Some("https://queue.amazonaws.com/123456789012/orders")
        );

        let upstream = &aws.requests()[0];
        assert_eq!(upstream.operation(), Some("GetQueueUrl"));
        assert!(
            upstream
                .header("authorization")
                .is_some_and(|auth| auth.contains("Credential=AKIAREALKEY/"))
        );
        let params = upstream.json();
        assert_eq!(params["QueueName"], "orders");
        assert_eq!(params["QueueOwnerAWSAccountId"], "123456789012");
        assert!(local.requests().is_empty());

        handle.shutdown().await;
        assert!(gateway.registry.is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_start_when_gateway_is_unreachable() {
        let config = AuthProxyConfig::builder()
            .proxy(ProxyConfig::for_services(&["sqs"]))
            .gateway_url(format!("http://127.0.0.1:{}", crate::closed_port().await))
            .build();

        let result = AuthProxy::new(config, proxy_service("http://127.0.0.1:9"))
            .start()
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_should_share_one_sts_lookup_between_concurrent_callers() {
        let sts = MockServer::spawn_with_delay(Duration::from_millis(100), |_| {
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/xml")
                .body(full_body(CALLER_IDENTITY))
                .unwrap()
        })
        .await;
        let config = aws_sdk_sts::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "integration-test"))
            .endpoint_url(sts.url())
            .build();
        let resolver = Arc::new(StsAccountIdResolver::new(aws_sdk_sts::Client::from_conf(config)));

        let lookups = (0..8).map(|_| {
            let resolver = Arc::clone(&resolver);
            async move { resolver.account_id().await }
        });
        let accounts = futures::future::join_all(lookups).await;

        for account in accounts {
            assert_eq!(account.unwrap(), "123456789012");
        }
        assert_eq!(sts.requests().len(), 1);
        assert_eq!(resolver.account_id().await.unwrap(), "123456789012");
        assert_eq!(sts.requests().len(), 1);
    }

    /// AWS stand-in for one stored object.
    fn aws_s3(request: &RecordedRequest) -> Response<ProxyBody> {
        let builder = Response::builder()
            .status(StatusCode::OK)
            .header("etag", "\"5d41402abc4b2a76b9719d911017c592\"");
        if request.method == Method::HEAD {
            builder
                .header("content-length", "5")
                .header(CONTENT_TYPE, "text/plain")
                .body(full_body(""))
                .unwrap()
        } else {
            builder.body(full_body("")).unwrap()
        }
    }

    #[tokio::test]
    async fn test_should_relay_s3_put_and_head_through_registered_proxy() {
        let local = MockServer::spawn(|_| {
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({"message": "unexpected"}))
        })
        .await;
        let aws = MockServer::spawn(aws_s3).await;
        let gateway = TestGateway::spawn(&local).await;
        let config = AuthProxyConfig::builder()
            .proxy(ProxyConfig::for_services(&["s3"]))
            .gateway_url(gateway.url())
            .build();
        let handle = AuthProxy::new(config, proxy_service(&aws.url()))
            .start()
            .await
            .unwrap();
        let client = s3_client(&gateway.url(), "us-east-1");

        client
            .put_object()
            .bucket("photos")
            .key("cat.txt")
            .content_type("text/plain")
            .body(ByteStream::from_static(b"hello"))
            .send()
            .await
            .unwrap();
        let head = client
            .head_object()
            .bucket("photos")
            .key("cat.txt")
            .send()
            .await
            .unwrap();

        assert_eq!(head.content_length(), Some(5));
        assert_eq!(head.e_tag(), Some("\"5d41402abc4b2a76b9719d911017c592\""));

        let requests = aws.requests();
        let put = &requests[0];
        assert_eq!(put.method, Method::PUT);
        assert_eq!(put.uri.path(), "/photos/cat.txt");
        assert_eq!(put.body.as_ref(), b"hello");
        assert!(
            !put.header("content-encoding")
                .is_some_and(|encoding| encoding.contains("aws-chunked"))
        );
        assert!(put.header("x-amz-decoded-content-length").is_none());
        assert_eq!(
            put.header("x-amz-content-sha256"),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert!(put.header("authorization").is_some_and(|auth| {
            auth.contains("Credential=AKIAREALKEY/") && auth.contains("/us-east-1/s3/aws4_request")
        }));
        assert_eq!(requests[1].method, Method::HEAD);
        assert!(local.requests().is_empty());

        handle.shutdown().await;
    }
}
