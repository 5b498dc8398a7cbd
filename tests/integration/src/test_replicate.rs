//! Export and import of replicated resource state.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{Method, Response, StatusCode};
    use serde_json::{Value, json};

    use awsproxy_core::REPLICATE_API_PATH;
    use awsproxy_http::{ProxyBody, full_body, json_response};
    use awsproxy_replicator::{
        DynamoDbTableReplicator, QueueMessage, ReplicateStateRequest, Replicator, ReplicatorRegistry,
        ResourceType, S3BucketReplicator, StateBlob, StoredObject, submit_state,
    };

    use crate::{MockServer, RecordedRequest, TestGateway, dynamodb_client, s3_client, xml_response};

    fn md5_of(body: &str) -> &'static str {
        match body {
            "hello" => "5d41402abc4b2a76b9719d911017c592",
            "world" => "7d793037a0760186574b0282f2f435e7",
            _ => "",
        }
    }

    /// Local SQS answering `CreateQueue` and `SendMessageBatch`.
    fn local_sqs(request: &RecordedRequest) -> Response<ProxyBody> {
        match request.operation() {
            Some("CreateQueue") => {
                let name = request.json()["QueueName"].as_str().unwrap_or_default().to_owned();
                json_response(
                    StatusCode::OK,
                    &json!({"QueueUrl": format!("http://localhost:4566/000000000000/{name}")}),
                )
            }
            Some("SendMessageBatch") => {
                let successful: Vec<Value> = request.json()["Entries"]
                    .as_array()
                    .map(|entries| {
                        entries
                            .iter()
                            .map(|entry| {
                                let body = entry["MessageBody"].as_str().unwrap_or_default();
                                json!({
                                    "Id": entry["Id"],
                                    "MessageId": format!("msg-{}", entry["Id"].as_str().unwrap_or_default()),
                                    "MD5OfMessageBody": md5_of(body),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                json_response(StatusCode::OK, &json!({"Successful": successful, "Failed": []}))
            }
            _ => json_response(StatusCode::BAD_REQUEST, &json!({"__type": "UnsupportedOperation"})),
        }
    }

    #[tokio::test]
    async fn test_should_import_queue_messages_into_local_sqs() {
        let local = MockServer::spawn(local_sqs).await;
        let gateway = TestGateway::spawn_with_replication(&local).await;

        let response = reqwest::Client::new()
            .post(format!("{}{REPLICATE_API_PATH}", gateway.url()))
            .json(&json!({
                "Type": "AWS::SQS::Queue",
                "Properties": {
                    "QueueName": "orders",
                    "Messages": [{"Body": "hello"}, {"Body": "world"}]
                }
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"count": 2}));

        assert_eq!(local.operations(), vec!["CreateQueue", "SendMessageBatch"]);
        let batch = local.requests()[1].json();
        assert_eq!(batch["QueueUrl"], "http://localhost:4566/000000000000/orders");
        assert_eq!(batch["Entries"][0]["MessageBody"], "hello");
        assert_eq!(batch["Entries"][1]["MessageBody"], "world");
    }

    #[tokio::test]
    async fn test_should_submit_exported_state_to_gateway() {
        let local = MockServer::spawn(local_sqs).await;
        let gateway = TestGateway::spawn_with_replication(&local).await;
        let mut exported = ReplicateStateRequest::new(ResourceType::SqsQueue, "invoices");
        exported.properties.insert(
            "Messages".to_owned(),
            serde_json::to_value(vec![QueueMessage {
                body: "hello".to_owned(),
                attributes: Default::default(),
            }])
            .unwrap(),
        );

        let count = submit_state(&reqwest::Client::new(), &gateway.url(), &exported)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(local.requests()[0].json()["QueueName"], "invoices");
    }

    #[tokio::test]
    async fn test_should_reject_unsupported_resource_types() {
        let local = MockServer::spawn(local_sqs).await;
        let gateway = TestGateway::spawn_with_replication(&local).await;
        let request = ReplicateStateRequest {
            resource_type: "AWS::SNS::Topic".to_owned(),
            physical_resource_id: None,
            properties: serde_json::Map::new(),
        };

        let result = submit_state(&reqwest::Client::new(), &gateway.url(), &request).await;

        assert!(result.is_err());
        assert!(local.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_refuse_replication_without_local_backend_support() {
        let local = MockServer::spawn(local_sqs).await;
        let gateway = TestGateway::spawn(&local).await;

        let response = reqwest::Client::new()
            .post(format!("{}{REPLICATE_API_PATH}", gateway.url()))
            .json(&json!({"Type": "AWS::SQS::Queue", "Properties": {"QueueName": "orders"}}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NOT_IMPLEMENTED);
    }

    fn empty_response(status: StatusCode) -> Response<ProxyBody> {
        Response::builder()
            .status(status)
            .header("etag", "\"d41d8cd98f00b204e9800998ecf8427e\"")
            .body(full_body(""))
            .unwrap()
    }

    fn registry_with(replicator: Replicator) -> ReplicatorRegistry {
        let mut registry = ReplicatorRegistry::new();
        registry.insert(replicator);
        registry
    }

    fn table_not_found() -> Response<ProxyBody> {
        json_response(
            StatusCode::BAD_REQUEST,
            &json!({
                "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
                "message": "Requested resource not found"
            }),
        )
    }

    fn orders_description() -> Value {
        json!({
            "Table": {
                "TableName": "orders",
                "TableStatus": "ACTIVE",
                "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "S"}]
            }
        })
    }

    #[tokio::test]
    async fn test_should_export_every_scan_page_of_a_table() {
        let aws = MockServer::spawn(|request| match request.operation() {
            Some("DescribeTable") => json_response(StatusCode::OK, &orders_description()),
            Some("Scan") if request.json()["ExclusiveStartKey"].is_null() => json_response(
                StatusCode::OK,
                &json!({
                    "Items": [{"id": {"S": "a"}}],
                    "Count": 1,
                    "ScannedCount": 1,
                    "LastEvaluatedKey": {"id": {"S": "a"}}
                }),
            ),
            Some("Scan") => json_response(
                StatusCode::OK,
                &json!({"Items": [{"id": {"S": "b"}, "qty": {"N": "3"}}], "Count": 1, "ScannedCount": 1}),
            ),
            _ => table_not_found(),
        })
        .await;
        let registry = registry_with(Replicator::DynamoDbTable(DynamoDbTableReplicator::new(
            dynamodb_client(&aws.url()),
        )));

        let mut exported = registry
            .export(ReplicateStateRequest::new(ResourceType::DynamoDbTable, "orders"))
            .await
            .unwrap();

        assert_eq!(aws.operations(), vec!["DescribeTable", "Scan", "Scan"]);
        assert_eq!(aws.requests()[2].json()["ExclusiveStartKey"], json!({"id": {"S": "a"}}));
        let Some(StateBlob::Table(table)) = exported.take_state().unwrap() else {
            panic!("expected table state");
        };
        assert_eq!(table.key_schema[0].attribute_name, "id");
        assert_eq!(table.key_schema[0].key_type, "HASH");
        assert_eq!(table.attribute_definitions[0].attribute_type, "S");
        assert_eq!(table.items.len(), 2);
        assert_eq!(table.items[1]["qty"], json!({"N": "3"}));
    }

    #[tokio::test]
    async fn test_should_create_table_and_batch_items_through_gateway() {
        let batches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&batches);
        let local = MockServer::spawn(move |request| match request.operation() {
            Some("DescribeTable") => table_not_found(),
            Some("CreateTable") => json_response(
                StatusCode::OK,
                &json!({"TableDescription": {"TableName": "orders", "TableStatus": "ACTIVE"}}),
            ),
            Some("BatchWriteItem") => {
                // The first batch leaves one item for a retry.
                let unprocessed = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    json!({"orders": [request.json()["RequestItems"]["orders"][0]]})
                } else {
                    json!({})
                };
                json_response(StatusCode::OK, &json!({"UnprocessedItems": unprocessed}))
            }
            _ => json_response(StatusCode::BAD_REQUEST, &json!({"__type": "UnsupportedOperation"})),
        })
        .await;
        let gateway = TestGateway::spawn_with_replication(&local).await;
        let items: Vec<Value> = (0..30).map(|i| json!({"id": {"S": format!("order-{i}")}})).collect();

        let response = reqwest::Client::new()
            .post(format!("{}{REPLICATE_API_PATH}", gateway.url()))
            .json(&json!({
                "Type": "AWS::DynamoDB::Table",
                "Properties": {
                    "TableName": "orders",
                    "Table": {
                        "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}],
                        "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "S"}],
                        "Items": items
                    }
                }
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"count": 30}));

        assert_eq!(
            local.operations(),
            vec!["DescribeTable", "CreateTable", "BatchWriteItem", "BatchWriteItem", "BatchWriteItem"]
        );
        let requests = local.requests();
        let create = requests[1].json();
        assert_eq!(create["KeySchema"][0]["AttributeName"], "id");
        assert_eq!(create["BillingMode"], "PAY_PER_REQUEST");
        let batch_sizes: Vec<usize> = requests[2..]
            .iter()
            .map(|r| r.json()["RequestItems"]["orders"].as_array().map_or(0, Vec::len))
            .collect();
        assert_eq!(batch_sizes, vec![25, 1, 5]);
        assert_eq!(batches.load(Ordering::SeqCst), 3);
    }

    fn bucket_listing(request: &RecordedRequest) -> Response<ProxyBody> {
        let query = request.uri.query().unwrap_or_default();
        if query.contains("continuation-token=page-2") {
            return xml_response(
                StatusCode::OK,
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>photos</Name>
  <KeyCount>1</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>exact.bin</Key><Size>1000000</Size></Contents>
</ListBucketResult>"#,
            );
        }
        xml_response(
            StatusCode::OK,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>photos</Name>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>small.txt</Key><Size>5</Size></Contents>
  <Contents><Key>big.bin</Key><Size>2000000</Size></Contents>
  <NextContinuationToken>page-2</NextContinuationToken>
</ListBucketResult>"#,
        )
    }

    #[tokio::test]
    async fn test_should_capture_objects_up_to_size_limit() {
        let aws = MockServer::spawn(|request| match request.uri.path() {
            "/photos" => bucket_listing(request),
            "/photos/small.txt" => Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/plain")
                .body(full_body("hello"))
                .unwrap(),
            "/photos/exact.bin" => Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/octet-stream")
                .body(full_body("exact"))
                .unwrap(),
            _ => empty_response(StatusCode::NOT_FOUND),
        })
        .await;
        let registry = registry_with(Replicator::S3Bucket(S3BucketReplicator::new(s3_client(
            &aws.url(),
            "us-east-1",
        ))));

        let mut exported = registry
            .export(ReplicateStateRequest::new(ResourceType::S3Bucket, "photos"))
            .await
            .unwrap();

        let Some(StateBlob::Objects(mut objects)) = exported.take_state().unwrap() else {
            panic!("expected bucket objects");
        };
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["exact.bin", "small.txt"]);
        assert_eq!(objects[1].content().unwrap(), b"hello");
        assert_eq!(objects[1].content_type.as_deref(), Some("text/plain"));

        let paths: Vec<String> = aws.requests().iter().map(|r| r.uri.path().to_owned()).collect();
        assert_eq!(paths.iter().filter(|p| *p == "/photos").count(), 2);
        assert!(!paths.iter().any(|p| p == "/photos/big.bin"));
    }

    /// Local S3 without the bucket: `HeadBucket` fails, the rest succeeds.
    fn local_s3_without_bucket(request: &RecordedRequest) -> Response<ProxyBody> {
        if request.method == Method::HEAD {
            empty_response(StatusCode::NOT_FOUND)
        } else {
            empty_response(StatusCode::OK)
        }
    }

    fn photo_objects() -> StateBlob {
        StateBlob::Objects(vec![StoredObject::new(
            "a.txt",
            Some("text/plain".to_owned()),
            b"hello",
        )])
    }

    async fn import_photos(local: &MockServer, region: &str) -> usize {
        let registry = registry_with(Replicator::S3Bucket(S3BucketReplicator::new(s3_client(
            &local.url(),
            region,
        ))));
        let request = ReplicateStateRequest::new(ResourceType::S3Bucket, "photos")
            .with_state(photo_objects())
            .unwrap();
        registry.import(request).await.unwrap()
    }

    fn create_bucket_body(local: &MockServer) -> String {
        local
            .requests()
            .iter()
            .find(|r| r.method == Method::PUT && r.uri.path() == "/photos")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .expect("CreateBucket was sent")
    }

    #[tokio::test]
    async fn test_should_create_bucket_with_location_outside_us_east_1() {
        let local = MockServer::spawn(local_s3_without_bucket).await;

        let count = import_photos(&local, "eu-west-1").await;

        assert_eq!(count, 1);
        assert!(
            create_bucket_body(&local).contains("<LocationConstraint>eu-west-1</LocationConstraint>")
        );
        let put = local
            .requests()
            .into_iter()
            .find(|r| r.method == Method::PUT && r.uri.path() == "/photos/a.txt")
            .expect("PutObject was sent");
        assert_eq!(put.header("content-type"), Some("text/plain"));
        assert!(String::from_utf8_lossy(&put.body).contains("hello"));
    }

    #[tokio::test]
    async fn test_should_create_bucket_without_location_in_us_east_1() {
        let local = MockServer::spawn(local_s3_without_bucket).await;

        let count = import_photos(&local, "us-east-1").await;

        assert_eq!(count, 1);
        assert!(!create_bucket_body(&local).contains("LocationConstraint"));
    }

    #[tokio::test]
    async fn test_should_reuse_existing_bucket() {
        let local = MockServer::spawn(|_| empty_response(StatusCode::OK)).await;

        let count = import_photos(&local, "eu-west-1").await;

        assert_eq!(count, 1);
        let methods: Vec<Method> = local.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![Method::HEAD, Method::PUT]);
        assert_eq!(local.requests()[1].uri.path(), "/photos/a.txt");
    }
}
