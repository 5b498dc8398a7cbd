//! Replication handlers keyed by resource type.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use aws_config::SdkConfig;
use tracing::{debug, info};

use crate::dynamodb::DynamoDbTableReplicator;
use crate::error::{ReplicationError, ReplicationResult};
use crate::model::{ReplicateStateRequest, ResourceType, StateBlob};
use crate::s3::S3BucketReplicator;
use crate::sqs::SqsQueueReplicator;

/// Copies the state of one resource type.
#[async_trait]
pub trait StateReplicator: Send + Sync + fmt::Debug {
    /// The resource type handled.
    fn resource_type(&self) -> ResourceType;

    /// List the resources of this type the client can see.
    async fn discover(&self) -> ReplicationResult<Vec<ReplicateStateRequest>>;

    /// Capture the state of `resource` from the account the client points at.
    async fn replicate_external(&self, resource: &ReplicateStateRequest) -> ReplicationResult<StateBlob>;

    /// Create `resource` if needed and inject `state` into it. Returns the
    /// number of messages, items, or objects written.
    async fn replicate_internal(
        &self,
        resource: &ReplicateStateRequest,
        state: StateBlob,
    ) -> ReplicationResult<usize>;
}

/// A replication handler.
#[derive(Debug, Clone)]
pub enum Replicator {
    /// `AWS::SQS::Queue`.
    SqsQueue(SqsQueueReplicator),
    /// `AWS::DynamoDB::Table`.
    DynamoDbTable(DynamoDbTableReplicator),
    /// `AWS::S3::Bucket`.
    S3Bucket(S3BucketReplicator),
}

impl Replicator {
    fn handler(&self) -> &dyn StateReplicator {
        match self {
            Self::SqsQueue(h) => h,
            Self::DynamoDbTable(h) => h,
            Self::S3Bucket(h) => h,
        }
    }

    /// The resource type handled.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.handler().resource_type()
    }

    /// See [`StateReplicator::discover`].
    pub async fn discover(&self) -> ReplicationResult<Vec<ReplicateStateRequest>> {
        self.handler().discover().await
    }

    /// See [`StateReplicator::replicate_external`].
    pub async fn replicate_external(
        &self,
        resource: &ReplicateStateRequest,
    ) -> ReplicationResult<StateBlob> {
        self.handler().replicate_external(resource).await
    }

    /// See [`StateReplicator::replicate_internal`].
    pub async fn replicate_internal(
        &self,
        resource: &ReplicateStateRequest,
        state: StateBlob,
    ) -> ReplicationResult<usize> {
        self.handler().replicate_internal(resource, state).await
    }
}

/// Handlers keyed by resource type.
#[derive(Debug, Clone, Default)]
pub struct ReplicatorRegistry {
    handlers: BTreeMap<ResourceType, Replicator>,
}

impl ReplicatorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every handler, using clients built from `config`.
    ///
    /// `force_path_style` should be set when `config` points at a local
    /// emulator rather than AWS.
    #[must_use]
    pub fn from_sdk_config(config: &SdkConfig, force_path_style: bool) -> Self {
        let s3 = aws_sdk_s3::config::Builder::from(config)
            .force_path_style(force_path_style)
            .build();
        let mut registry = Self::new();
        registry.insert(Replicator::SqsQueue(SqsQueueReplicator::new(
            aws_sdk_sqs::Client::new(config),
        )));
        registry.insert(Replicator::DynamoDbTable(DynamoDbTableReplicator::new(
            aws_sdk_dynamodb::Client::new(config),
        )));
        registry.insert(Replicator::S3Bucket(S3BucketReplicator::new(
            aws_sdk_s3::Client::from_conf(s3),
        )));
        registry
    }

    /// Register a handler, replacing the handler of the same type.
    pub fn insert(&mut self, replicator: Replicator) {
        self.handlers.insert(replicator.resource_type(), replicator);
    }

    /// The handler of a resource type.
    pub fn get(&self, resource_type: ResourceType) -> ReplicationResult<&Replicator> {
        self.handlers
            .get(&resource_type)
            .ok_or_else(|| ReplicationError::UnsupportedType(resource_type.to_string()))
    }

    /// Registered resource types.
    pub fn resource_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.handlers.keys().copied()
    }

    /// List the resources of the given types.
    pub async fn discover(
        &self,
        types: &[ResourceType],
    ) -> ReplicationResult<Vec<ReplicateStateRequest>> {
        let mut resources = Vec::new();
        for resource_type in types {
            let found = self.get(*resource_type)?.discover().await?;
            info!(%resource_type, count = found.len(), "discovered resources");
            resources.extend(found);
        }
        Ok(resources)
    }

    /// Capture the state of `resource` and attach it to the request.
    pub async fn export(
        &self,
        resource: ReplicateStateRequest,
    ) -> ReplicationResult<ReplicateStateRequest> {
        let handler = self.get(resource.parsed_type()?)?;
        let state = handler.replicate_external(&resource).await?;
        debug!(resource = resource.name()?, entries = state.len(), "exported resource state");
        resource.with_state(state)
    }

    /// Create the resource of a request and inject its attached state.
    /// A request without state only creates the resource.
    pub async fn import(&self, mut request: ReplicateStateRequest) -> ReplicationResult<usize> {
        let resource_type = request.parsed_type()?;
        let handler = self.get(resource_type)?;
        let state = request.take_state()?.unwrap_or_else(|| empty_state(resource_type, &request));
        let count = handler.replicate_internal(&request, state).await?;
        info!(%resource_type, resource = request.name()?, count, "imported resource state");
        Ok(count)
    }
}

fn empty_state(resource_type: ResourceType, request: &ReplicateStateRequest) -> StateBlob {
    match resource_type {
        ResourceType::SqsQueue => StateBlob::Messages(Vec::new()),
        ResourceType::S3Bucket => StateBlob::Objects(Vec::new()),
        ResourceType::DynamoDbTable => StateBlob::Table(table_from_properties(request)),
    }
}

/// Key schema given as plain CloudFormation properties.
fn table_from_properties(request: &ReplicateStateRequest) -> crate::model::TableState {
    fn field<T: serde::de::DeserializeOwned + Default>(
        request: &ReplicateStateRequest,
        name: &str,
    ) -> T {
        request
            .properties
            .get(name)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
    crate::model::TableState {
        key_schema: field(request, "KeySchema"),
        attribute_definitions: field(request, "AttributeDefinitions"),
        items: Vec::new(),
    }
}
