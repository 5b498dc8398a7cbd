//! Extended state replication for the AWS request proxy.
//!
//! Resources are copied from a source account into the local emulator in two
//! halves. The external half runs against AWS and captures the state of a
//! resource as a [`StateBlob`]: queue messages, table items, or bucket
//! objects. The internal half runs against the emulator, creates the
//! resource if needed, and injects that state.
//!
//! Handlers are keyed by CloudFormation resource type in a
//! [`ReplicatorRegistry`] and dispatched through the [`Replicator`] enum.

pub mod attribute;
pub mod dynamodb;
pub mod error;
pub mod model;
pub mod registry;
pub mod s3;
pub mod sqs;
pub mod submit;

pub use dynamodb::DynamoDbTableReplicator;
pub use error::ReplicationError;
pub use model::{
    KeyAttribute, KeyElement, MessageAttribute, QueueMessage, ReplicateStateRequest, ResourceType,
    StateBlob, StoredObject, TableState,
};
pub use registry::{Replicator, ReplicatorRegistry, StateReplicator};
pub use s3::S3BucketReplicator;
pub use sqs::SqsQueueReplicator;
pub use submit::submit_state;
