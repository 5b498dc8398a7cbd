//! SQS queue replication: queue plus its visible messages.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageAttributeValue, SendMessageBatchRequestEntry};
use tracing::{debug, info};

use crate::error::{ReplicationError, ReplicationResult};
use crate::model::{MessageAttribute, QueueMessage, ReplicateStateRequest, ResourceType, StateBlob};
use crate::registry::StateReplicator;

/// Upper bound on messages captured from one queue.
const MAX_MESSAGES: usize = 10_000;
/// Largest batch `SendMessageBatch` accepts.
const SEND_BATCH_SIZE: usize = 10;

/// Replicates SQS queues and their messages.
///
/// Messages are captured with `ReceiveMessage` and not deleted, so they
/// reappear in the source queue once their visibility timeout expires.
#[derive(Debug, Clone)]
pub struct SqsQueueReplicator {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueReplicator {
    /// Create a replicator using `client`.
    #[must_use]
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StateReplicator for SqsQueueReplicator {
    fn resource_type(&self) -> ResourceType {
        ResourceType::SqsQueue
    }

    async fn discover(&self) -> ReplicationResult<Vec<ReplicateStateRequest>> {
        let mut resources = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .client
                .list_queues()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| ReplicationError::aws("ListQueues", e))?;
            for url in page.queue_urls() {
                let name = url.rsplit('/').next().unwrap_or(url);
                let mut resource = ReplicateStateRequest::new(ResourceType::SqsQueue, name);
                resource.physical_resource_id = Some(url.clone());
                resources.push(resource);
            }
            next_token = page.next_token().map(str::to_owned);
            if next_token.is_none() {
                break;
            }
        }
        Ok(resources)
    }

    async fn replicate_external(&self, resource: &ReplicateStateRequest) -> ReplicationResult<StateBlob> {
        let name = resource.name()?;
        let queue_url = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| ReplicationError::aws("GetQueueUrl", e))?
            .queue_url()
            .map(str::to_owned)
            .ok_or_else(|| ReplicationError::invalid(format!("no URL for queue {name}")))?;

        let mut messages = Vec::new();
        while messages.len() < MAX_MESSAGES {
            let received = self
                .client
                .receive_message()
                .queue_url(&queue_url)
                .max_number_of_messages(10)
                .wait_time_seconds(1)
                .message_attribute_names("All")
                .send()
                .await
                .map_err(|e| ReplicationError::aws("ReceiveMessage", e))?;
            if received.messages().is_empty() {
                break;
            }
            messages.extend(received.messages().iter().map(|m| QueueMessage {
                body: m.body().unwrap_or_default().to_owned(),
                attributes: m
                    .message_attributes()
                    .map(capture_attributes)
                    .unwrap_or_default(),
            }));
        }
        debug!(queue = name, count = messages.len(), "captured queue messages");
        Ok(StateBlob::Messages(messages))
    }

    async fn replicate_internal(
        &self,
        resource: &ReplicateStateRequest,
        state: StateBlob,
    ) -> ReplicationResult<usize> {
        let name = resource.name()?;
        let StateBlob::Messages(messages) = state else {
            return Err(ReplicationError::invalid("SQS queues take messages"));
        };

        let queue_url = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| ReplicationError::aws("CreateQueue", e))?
            .queue_url()
            .map(str::to_owned)
            .ok_or_else(|| ReplicationError::invalid(format!("no URL for queue {name}")))?;

        let mut sent = 0;
        for batch in messages.chunks(SEND_BATCH_SIZE) {
            let entries = batch
                .iter()
                .enumerate()
                .map(|(i, message)| {
                    SendMessageBatchRequestEntry::builder()
                        .id(i.to_string())
                        .message_body(&message.body)
                        .set_message_attributes(restore_attributes(&message.attributes)?)
                        .build()
                        .map_err(ReplicationError::invalid)
                })
                .collect::<ReplicationResult<Vec<_>>>()?;
            let output = self
                .client
                .send_message_batch()
                .queue_url(&queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| ReplicationError::aws("SendMessageBatch", e))?;
            sent += output.successful().len();
        }
        info!(queue = name, count = sent, "inserted messages into queue");
        Ok(sent)
    }
}

fn capture_attributes(
    attributes: &HashMap<String, MessageAttributeValue>,
) -> BTreeMap<String, MessageAttribute> {
    attributes
        .iter()
        .filter(|(_, value)| value.string_value().is_some())
        .map(|(name, value)| {
            (
                name.clone(),
                MessageAttribute {
                    data_type: value.data_type().to_owned(),
                    string_value: value.string_value().map(str::to_owned),
                },
            )
        })
        .collect()
}

fn restore_attributes(
    attributes: &BTreeMap<String, MessageAttribute>,
) -> ReplicationResult<Option<HashMap<String, MessageAttributeValue>>> {
    if attributes.is_empty() {
        return Ok(None);
    }
    attributes
        .iter()
        .map(|(name, attribute)| {
            let value = MessageAttributeValue::builder()
                .data_type(&attribute.data_type)
                .set_string_value(attribute.string_value.clone())
                .build()
                .map_err(ReplicationError::invalid)?;
            Ok((name.clone(), value))
        })
        .collect::<ReplicationResult<HashMap<_, _>>>()
        .map(Some)
}
