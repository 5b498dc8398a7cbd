//! Control-plane endpoints served by the gateway.

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::{Value, json};

    use awsproxy_core::{PROXY_API_PATH, PROXY_STATUS_PATH};
    use awsproxy_http::json_response;

    use crate::{MockServer, TestGateway};

    async fn local_emulator() -> MockServer {
        MockServer::spawn(|_| json_response(StatusCode::OK, &json!({"served_by": "local"}))).await
    }

    #[tokio::test]
    async fn test_should_register_and_remove_proxy_over_http() {
        let local = local_emulator().await;
        let gateway = TestGateway::spawn(&local).await;
        let client = reqwest::Client::new();
        let proxies = format!("{}{PROXY_API_PATH}", gateway.url());

        let response = client
            .post(&proxies)
            .json(&json!({
                "port": 4510,
                "config": {"services": {"s3": {"resources": ".*photos"}}}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(gateway.registry.len(), 1);
        assert!(gateway.registry.get(4510).is_some());

        let removed: Value = client
            .delete(format!("{proxies}/4510"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(removed, json!({"removed": true}));
        assert!(gateway.registry.is_empty());

        let again: Value = client
            .delete(format!("{proxies}/4510"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(again, json!({"removed": false}));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_registration() {
        let local = local_emulator().await;
        let gateway = TestGateway::spawn(&local).await;

        let response = reqwest::Client::new()
            .post(format!("{}{PROXY_API_PATH}", gateway.url()))
            .json(&json!({"port": 4510, "config": {"services": {"sqs": {"resources": "("}}}}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "InvalidConfiguration");
        assert!(gateway.registry.is_empty());
    }

    #[tokio::test]
    async fn test_should_report_disabled_status_without_backing_process() {
        let local = local_emulator().await;
        let gateway = TestGateway::spawn(&local).await;
        let client = reqwest::Client::new();
        let status_url = format!("{}{PROXY_STATUS_PATH}", gateway.url());

        let status: Value = client.get(&status_url).send().await.unwrap().json().await.unwrap();
        assert_eq!(status, json!({"status": "disabled", "config": null}));

        let disabled = client
            .post(&status_url)
            .json(&json!({"status": "disabled"}))
            .send()
            .await
            .unwrap();
        assert_eq!(disabled.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_answer_health_with_registered_ports() {
        let local = local_emulator().await;
        let gateway = TestGateway::spawn(&local).await;
        gateway
            .registry
            .register(4511, awsproxy_core::ProxyConfig::for_services(&["sqs"]), None)
            .unwrap();

        let health: Value = reqwest::get(format!("{}/_localstack/health", gateway.url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(health["services"]["aws-proxy"], "running");
        assert_eq!(health["proxies"], json!([4511]));
        assert!(local.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_relay_other_paths_to_local_emulator() {
        let local = local_emulator().await;
        let gateway = TestGateway::spawn(&local).await;

        let response = reqwest::get(format!("{}/some/path?x=1", gateway.url())).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["served_by"], "local");
        assert_eq!(local.requests()[0].uri.path_and_query().unwrap().as_str(), "/some/path?x=1");
    }
}
