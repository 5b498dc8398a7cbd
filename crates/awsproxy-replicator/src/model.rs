//! Replication request and state models.
//!
//! Property names follow CloudFormation resource models (`QueueName`,
//! `TableName`, `BucketName`), so a request reads like a template resource
//! with its captured state attached.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use awsproxy_core::canonical_service_name;

use crate::error::{ReplicationError, ReplicationResult};

/// Resource types with extended state replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    /// An SQS queue and its messages.
    #[serde(rename = "AWS::SQS::Queue")]
    SqsQueue,
    /// A DynamoDB table and its items.
    #[serde(rename = "AWS::DynamoDB::Table")]
    DynamoDbTable,
    /// An S3 bucket and its (small) objects.
    #[serde(rename = "AWS::S3::Bucket")]
    S3Bucket,
}

impl ResourceType {
    /// Every supported type.
    pub const ALL: [Self; 3] = [Self::SqsQueue, Self::DynamoDbTable, Self::S3Bucket];

    /// CloudFormation type name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqsQueue => "AWS::SQS::Queue",
            Self::DynamoDbTable => "AWS::DynamoDB::Table",
            Self::S3Bucket => "AWS::S3::Bucket",
        }
    }

    /// Service owning the resource type.
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            Self::SqsQueue => "sqs",
            Self::DynamoDbTable => "dynamodb",
            Self::S3Bucket => "s3",
        }
    }

    /// Property holding the resource name.
    #[must_use]
    pub fn name_property(self) -> &'static str {
        match self {
            Self::SqsQueue => "QueueName",
            Self::DynamoDbTable => "TableName",
            Self::S3Bucket => "BucketName",
        }
    }

    /// The replicated resource type of a service.
    ///
    /// ```
    /// use awsproxy_replicator::ResourceType;
    ///
    /// assert_eq!(ResourceType::for_service("sqs-query"), Some(ResourceType::SqsQueue));
    /// assert_eq!(ResourceType::for_service("lambda"), None);
    /// ```
    #[must_use]
    pub fn for_service(service: &str) -> Option<Self> {
        let service = canonical_service_name(service.trim());
        Self::ALL.into_iter().find(|t| t.service() == service)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ReplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ReplicationError::UnsupportedType(s.to_owned()))
    }
}

/// A resource to replicate, as sent to `POST /_localstack/aws/replicate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicateStateRequest {
    /// CloudFormation type name, e.g. `AWS::S3::Bucket`.
    #[serde(rename = "Type", alias = "TypeName")]
    pub resource_type: String,
    /// Identifier of the resource in the source account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    /// Resource properties, plus the captured state once exported.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ReplicateStateRequest {
    /// A request for the resource named `name`.
    ///
    /// ```
    /// use awsproxy_replicator::{ReplicateStateRequest, ResourceType};
    ///
    /// let request = ReplicateStateRequest::new(ResourceType::SqsQueue, "orders");
    /// assert_eq!(request.resource_type, "AWS::SQS::Queue");
    /// assert_eq!(request.name().unwrap(), "orders");
    /// ```
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        let mut properties = Map::new();
        properties.insert(
            resource_type.name_property().to_owned(),
            Value::String(name.into()),
        );
        Self {
            resource_type: resource_type.as_str().to_owned(),
            physical_resource_id: None,
            properties,
        }
    }

    /// The parsed resource type.
    pub fn parsed_type(&self) -> ReplicationResult<ResourceType> {
        self.resource_type.parse()
    }

    /// The resource name from its type's name property.
    pub fn name(&self) -> ReplicationResult<&str> {
        let resource_type = self.parsed_type()?;
        let property = resource_type.name_property();
        self.properties
            .get(property)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ReplicationError::MissingProperty {
                resource_type: resource_type.as_str(),
                property,
            })
    }

    /// Attach captured state to the properties.
    pub fn with_state(mut self, state: StateBlob) -> ReplicationResult<Self> {
        if let Value::Object(entry) = serde_json::to_value(state).map_err(ReplicationError::invalid)? {
            self.properties.extend(entry);
        }
        Ok(self)
    }

    /// Detach the captured state from the properties, if any.
    pub fn take_state(&mut self) -> ReplicationResult<Option<StateBlob>> {
        let Some((key, value)) = StateBlob::KEYS
            .iter()
            .find_map(|key| self.properties.remove_entry(*key))
        else {
            return Ok(None);
        };
        let mut entry = Map::new();
        entry.insert(key, value);
        serde_json::from_value(Value::Object(entry))
            .map(Some)
            .map_err(ReplicationError::invalid)
    }
}

/// State captured from a resource in the source account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateBlob {
    /// Messages of a queue.
    Messages(Vec<QueueMessage>),
    /// Key schema and items of a table.
    Table(TableState),
    /// Objects of a bucket.
    Objects(Vec<StoredObject>),
}

impl StateBlob {
    /// Property names the variants are stored under.
    pub const KEYS: [&str; 3] = ["Messages", "Table", "Objects"];

    /// Number of messages, items, or objects.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Messages(messages) => messages.len(),
            Self::Table(table) => table.items.len(),
            Self::Objects(objects) => objects.len(),
        }
    }

    /// Returns `true` if there is nothing to inject.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueMessage {
    /// Message body.
    pub body: String,
    /// Message attributes with string-typed values.
    #[serde(
        default,
        rename = "MessageAttributes",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attributes: BTreeMap<String, MessageAttribute>,
}

/// A message attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    /// `String`, `Number`, or a custom `String.*` / `Number.*` type.
    pub data_type: String,
    /// The value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

/// Key schema and items of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableState {
    /// Partition and sort key.
    pub key_schema: Vec<KeyElement>,
    /// Types of the key attributes.
    pub attribute_definitions: Vec<KeyAttribute>,
    /// Items in DynamoDB JSON.
    #[serde(default)]
    pub items: Vec<Map<String, Value>>,
}

/// One element of a key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyElement {
    /// Attribute name.
    pub attribute_name: String,
    /// `HASH` or `RANGE`.
    pub key_type: String,
}

/// Type of a key attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyAttribute {
    /// Attribute name.
    pub attribute_name: String,
    /// `S`, `N`, or `B`.
    pub attribute_type: String,
}

/// An object of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredObject {
    /// Object key.
    pub key: String,
    /// `Content-Type` of the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 content.
    pub body: String,
}

impl StoredObject {
    /// Capture an object's content.
    pub fn new(key: impl Into<String>, content_type: Option<String>, content: &[u8]) -> Self {
        Self {
            key: key.into(),
            content_type,
            body: BASE64.encode(content),
        }
    }

    /// The decoded content.
    pub fn content(&self) -> ReplicationResult<Vec<u8>> {
        BASE64.decode(&self.body).map_err(ReplicationError::invalid)
    }
}
