//! Routing of SDK traffic through the gateway to proxies or the emulator.

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::types::AttributeValue;
    use http::{Response, StatusCode};
    use serde_json::json;

    use awsproxy_core::ProxyConfig;
    use awsproxy_http::{ProxyBody, json_response};

    use crate::{
        MockServer, RecordedRequest, TestGateway, closed_port, dynamodb_client, sqs_client,
    };

    fn item_reply(source: &'static str) -> impl Fn(&RecordedRequest) -> Response<ProxyBody> {
        move |_| {
            json_response(
                StatusCode::OK,
                &json!({"Item": {"id": {"S": "1"}, "source": {"S": source}}}),
            )
        }
    }

    fn queue_reply(source: &'static str) -> impl Fn(&RecordedRequest) -> Response<ProxyBody> {
        move |_| {
            json_response(
                StatusCode::OK,
                &json!({
                    "QueueUrl": format!("https://{source}.example/000000000000/q"),
                    "Attributes": {"Source": source},
                }),
            )
        }
    }

    fn sqs_config(pattern: &str) -> ProxyConfig {
        ProxyConfig::from_yaml(&format!("services:\n  sqs:\n    resources: \"{pattern}\"\n"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_serve_reads_from_proxy_and_writes_locally() {
        let local = MockServer::spawn(item_reply("local")).await;
        let proxy = MockServer::spawn(item_reply("aws")).await;
        let gateway = TestGateway::spawn(&local).await;
        let config = ProxyConfig::from_yaml(
            "services:\n  dynamodb:\n    resources: \".*:table/orders\"\n    read_only: true\n",
        )
        .unwrap();
        gateway.registry.register(proxy.port(), config, None).unwrap();

        let client = dynamodb_client(&gateway.url());
        client
            .put_item()
            .table_name("orders")
            .item("id", AttributeValue::S("1".to_owned()))
            .send()
            .await
            .unwrap();
        let output = client
            .get_item()
            .table_name("orders")
            .key("id", AttributeValue::S("1".to_owned()))
            .send()
            .await
            .unwrap();

        let item = output.item().unwrap();
        assert_eq!(item["source"], AttributeValue::S("aws".to_owned()));
        assert_eq!(proxy.operations(), vec!["GetItem"]);
        assert_eq!(local.operations(), vec!["PutItem"]);
    }

    #[tokio::test]
    async fn test_should_keep_unmatched_tables_local() {
        let local = MockServer::spawn(item_reply("local")).await;
        let proxy = MockServer::spawn(item_reply("aws")).await;
        let gateway = TestGateway::spawn(&local).await;
        let config =
            ProxyConfig::from_yaml("services:\n  dynamodb:\n    resources: \".*:table/orders\"\n")
                .unwrap();
        gateway.registry.register(proxy.port(), config, None).unwrap();

        let output = dynamodb_client(&gateway.url())
            .get_item()
            .table_name("customers")
            .key("id", AttributeValue::S("1".to_owned()))
            .send()
            .await
            .unwrap();

        assert_eq!(output.item().unwrap()["source"], AttributeValue::S("local".to_owned()));
        assert!(proxy.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_scope_sqs_proxy_to_matching_queues() {
        let local = MockServer::spawn(queue_reply("local")).await;
        let proxy = MockServer::spawn(queue_reply("aws")).await;
        let gateway = TestGateway::spawn(&local).await;
        gateway
            .registry
            .register(proxy.port(), sqs_config(".*test-queue-aws"), None)
            .unwrap();
        let client = sqs_client(&gateway.url());

        let by_name = client
            .get_queue_url()
            .queue_name("test-queue-aws")
            .send()
            .await
            .unwrap();
        assert_eq!(by_name.queue_url(), Some("https://aws.example/000000000000/q"));

        client
            .get_queue_attributes()
            .queue_url(format!("{}/000000000000/test-queue-aws", gateway.url()))
            .send()
            .await
            .unwrap();

        let local_queue = client
            .get_queue_url()
            .queue_name("test-queue-local")
            .send()
            .await
            .unwrap();
        assert_eq!(local_queue.queue_url(), Some("https://local.example/000000000000/q"));

        assert_eq!(proxy.operations(), vec!["GetQueueUrl", "GetQueueAttributes"]);
        assert_eq!(local.operations(), vec!["GetQueueUrl"]);
    }

    #[tokio::test]
    async fn test_should_preserve_original_host_for_proxies() {
        let local = MockServer::spawn(queue_reply("local")).await;
        let proxy = MockServer::spawn(queue_reply("aws")).await;
        let gateway = TestGateway::spawn(&local).await;
        gateway.registry.register(proxy.port(), sqs_config(".*"), None).unwrap();

        sqs_client(&gateway.url())
            .get_queue_url()
            .queue_name("orders")
            .send()
            .await
            .unwrap();

        let forwarded = &proxy.requests()[0];
        let gateway_host = gateway.url().trim_start_matches("http://").to_owned();
        assert_eq!(
            forwarded.header(awsproxy_core::HEADER_HOST_ORIGINAL),
            Some(gateway_host.as_str())
        );
        assert!(forwarded.header("authorization").is_some());
    }

    #[tokio::test]
    async fn test_should_prefer_most_recent_registration() {
        let local = MockServer::spawn(queue_reply("local")).await;
        let older = MockServer::spawn(queue_reply("older")).await;
        let newer = MockServer::spawn(queue_reply("newer")).await;
        let gateway = TestGateway::spawn(&local).await;
        gateway.registry.register(older.port(), sqs_config(".*"), None).unwrap();
        gateway.registry.register(newer.port(), sqs_config(".*orders"), None).unwrap();
        let client = sqs_client(&gateway.url());

        let orders = client.get_queue_url().queue_name("orders").send().await.unwrap();
        assert_eq!(orders.queue_url(), Some("https://newer.example/000000000000/q"));

        let invoices = client.get_queue_url().queue_name("invoices").send().await.unwrap();
        assert_eq!(invoices.queue_url(), Some("https://older.example/000000000000/q"));
        assert!(local.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_fall_back_and_deregister_unreachable_proxy() {
        let local = MockServer::spawn(queue_reply("local")).await;
        let gateway = TestGateway::spawn(&local).await;
        gateway
            .registry
            .register(closed_port().await, sqs_config(".*"), None)
            .unwrap();

        let output = sqs_client(&gateway.url())
            .get_queue_url()
            .queue_name("orders")
            .send()
            .await
            .unwrap();

        assert_eq!(output.queue_url(), Some("https://local.example/000000000000/q"));
        assert!(gateway.registry.is_empty());
    }
}
