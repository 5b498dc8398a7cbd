//! DynamoDB table replication: key schema plus all items.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, PutRequest,
    ScalarAttributeType, WriteRequest,
};
use tracing::{debug, info, warn};

use crate::attribute::{item_from_json, item_to_json};
use crate::error::{ReplicationError, ReplicationResult};
use crate::model::{KeyAttribute, KeyElement, ReplicateStateRequest, ResourceType, StateBlob, TableState};
use crate::registry::StateReplicator;

/// Largest batch `BatchWriteItem` accepts.
const WRITE_BATCH_SIZE: usize = 25;
/// Attempts to write back unprocessed items of a batch.
const MAX_WRITE_ATTEMPTS: usize = 5;

/// Replicates DynamoDB tables and their items.
#[derive(Debug, Clone)]
pub struct DynamoDbTableReplicator {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDbTableReplicator {
    /// Create a replicator using `client`.
    #[must_use]
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }

    async fn describe(&self, table: &str) -> ReplicationResult<Option<TableState>> {
        let output = match self.client.describe_table().table_name(table).send().await {
            Ok(output) => output,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(ReplicationError::aws("DescribeTable", e)),
        };
        let Some(description) = output.table() else {
            return Ok(None);
        };
        Ok(Some(TableState {
            key_schema: description
                .key_schema()
                .iter()
                .map(|k| KeyElement {
                    attribute_name: k.attribute_name().to_owned(),
                    key_type: k.key_type().as_str().to_owned(),
                })
                .collect(),
            attribute_definitions: description
                .attribute_definitions()
                .iter()
                .map(|a| KeyAttribute {
                    attribute_name: a.attribute_name().to_owned(),
                    attribute_type: a.attribute_type().as_str().to_owned(),
                })
                .collect(),
            items: Vec::new(),
        }))
    }

    async fn create(&self, table: &str, state: &TableState) -> ReplicationResult<()> {
        let key_schema = state
            .key_schema
            .iter()
            .map(|k| {
                KeySchemaElement::builder()
                    .attribute_name(&k.attribute_name)
                    .key_type(KeyType::from(k.key_type.as_str()))
                    .build()
                    .map_err(ReplicationError::invalid)
            })
            .collect::<ReplicationResult<Vec<_>>>()?;
        let definitions = state
            .attribute_definitions
            .iter()
            .map(|a| {
                AttributeDefinition::builder()
                    .attribute_name(&a.attribute_name)
                    .attribute_type(ScalarAttributeType::from(a.attribute_type.as_str()))
                    .build()
                    .map_err(ReplicationError::invalid)
            })
            .collect::<ReplicationResult<Vec<_>>>()?;

        self.client
            .create_table()
            .table_name(table)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(definitions))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| ReplicationError::aws("CreateTable", e))?;
        info!(table, "created table");
        Ok(())
    }

    async fn write_batch(&self, table: &str, items: Vec<HashMap<String, AttributeValue>>) -> ReplicationResult<usize> {
        let total = items.len();
        let mut pending = items
            .into_iter()
            .map(|item| {
                PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build())
                    .map_err(ReplicationError::invalid)
            })
            .collect::<ReplicationResult<Vec<_>>>()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let output = self
                .client
                .batch_write_item()
                .request_items(table, pending)
                .send()
                .await
                .map_err(|e| ReplicationError::aws("BatchWriteItem", e))?;
            pending = output
                .unprocessed_items()
                .and_then(|unprocessed| unprocessed.get(table))
                .cloned()
                .unwrap_or_default();
            if pending.is_empty() {
                return Ok(total);
            }
        }
        warn!(table, dropped = pending.len(), "items left unprocessed");
        Ok(total - pending.len())
    }
}

#[async_trait]
impl StateReplicator for DynamoDbTableReplicator {
    fn resource_type(&self) -> ResourceType {
        ResourceType::DynamoDbTable
    }

    async fn discover(&self) -> ReplicationResult<Vec<ReplicateStateRequest>> {
        let mut resources = Vec::new();
        let mut start = None;
        loop {
            let page = self
                .client
                .list_tables()
                .set_exclusive_start_table_name(start)
                .send()
                .await
                .map_err(|e| ReplicationError::aws("ListTables", e))?;
            resources.extend(
                page.table_names()
                    .iter()
                    .map(|name| ReplicateStateRequest::new(ResourceType::DynamoDbTable, name)),
            );
            start = page.last_evaluated_table_name().map(str::to_owned);
            if start.is_none() {
                break;
            }
        }
        Ok(resources)
    }

    async fn replicate_external(&self, resource: &ReplicateStateRequest) -> ReplicationResult<StateBlob> {
        let table = resource.name()?;
        let mut state = self
            .describe(table)
            .await?
            .ok_or_else(|| ReplicationError::invalid(format!("table {table} does not exist")))?;

        let mut start_key = None;
        loop {
            let page = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| ReplicationError::aws("Scan", e))?;
            state.items.extend(page.items().iter().map(item_to_json));
            start_key = page.last_evaluated_key().cloned();
            if start_key.is_none() {
                break;
            }
        }
        debug!(table, count = state.items.len(), "captured table items");
        Ok(StateBlob::Table(state))
    }

    async fn replicate_internal(
        &self,
        resource: &ReplicateStateRequest,
        state: StateBlob,
    ) -> ReplicationResult<usize> {
        let table = resource.name()?;
        let StateBlob::Table(state) = state else {
            return Err(ReplicationError::invalid("DynamoDB tables take a table state"));
        };
        if self.describe(table).await?.is_none() {
            self.create(table, &state).await?;
        }

        let items = state
            .items
            .iter()
            .map(item_from_json)
            .collect::<ReplicationResult<Vec<_>>>()?;
        let mut written = 0;
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let batch: Vec<_> = items.by_ref().take(WRITE_BATCH_SIZE).collect();
            written += self.write_batch(table, batch).await?;
        }
        info!(table, count = written, "inserted items into table");
        Ok(written)
    }
}
