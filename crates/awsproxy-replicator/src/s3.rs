//! S3 bucket replication: bucket plus its small objects.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::error::{ReplicationError, ReplicationResult};
use crate::model::{ReplicateStateRequest, ResourceType, StateBlob, StoredObject};
use crate::registry::StateReplicator;

/// Objects larger than this many bytes are not copied.
pub const DEFAULT_MAX_OBJECT_SIZE: i64 = 1_000_000;
/// Concurrent object transfers.
const TRANSFER_CONCURRENCY: usize = 15;

/// Replicates S3 buckets and objects up to a size limit.
#[derive(Debug, Clone)]
pub struct S3BucketReplicator {
    client: aws_sdk_s3::Client,
    max_object_size: i64,
}

impl S3BucketReplicator {
    /// Create a replicator using `client` that skips objects larger than
    /// [`DEFAULT_MAX_OBJECT_SIZE`].
    #[must_use]
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self {
            client,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }

    /// Change the object size limit.
    #[must_use]
    pub fn with_max_object_size(mut self, bytes: i64) -> Self {
        self.max_object_size = bytes;
        self
    }

    async fn list_keys(&self, bucket: &str) -> ReplicationResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| ReplicationError::aws("ListObjectsV2", e))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let size = object.size().unwrap_or_default();
                if size > self.max_object_size {
                    debug!(bucket, key, size, "skipping large object");
                    continue;
                }
                keys.push(key.to_owned());
            }
            token = page.next_continuation_token().map(str::to_owned);
            if token.is_none() {
                break;
            }
        }
        Ok(keys)
    }

    async fn fetch(&self, bucket: &str, key: String) -> ReplicationResult<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ReplicationError::aws("GetObject", e))?;
        let content_type = output.content_type().map(str::to_owned);
        let content = output
            .body
            .collect()
            .await
            .map_err(|e| ReplicationError::aws("GetObject", e))?
            .into_bytes();
        Ok(StoredObject::new(key, content_type, &content))
    }

    async fn ensure_bucket(&self, bucket: &str) -> ReplicationResult<()> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }
        let region = self
            .client
            .config()
            .region()
            .map(|r| r.as_ref().to_owned())
            .filter(|r| r != "us-east-1");
        let configuration = region.map(|r| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(r.as_str()))
                .build()
        });
        match self
            .client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(configuration)
            .send()
            .await
        {
            Ok(_) => {
                info!(bucket, "created bucket");
                Ok(())
            }
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                }) =>
            {
                Ok(())
            }
            Err(e) => Err(ReplicationError::aws("CreateBucket", e)),
        }
    }

    async fn store(&self, bucket: &str, object: StoredObject) -> ReplicationResult<()> {
        let content = object.content()?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(object.key)
            .set_content_type(object.content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| ReplicationError::aws("PutObject", e))?;
        Ok(())
    }
}

#[async_trait]
impl StateReplicator for S3BucketReplicator {
    fn resource_type(&self) -> ResourceType {
        ResourceType::S3Bucket
    }

    async fn discover(&self) -> ReplicationResult<Vec<ReplicateStateRequest>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| ReplicationError::aws("ListBuckets", e))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(|name| ReplicateStateRequest::new(ResourceType::S3Bucket, name))
            .collect())
    }

    async fn replicate_external(&self, resource: &ReplicateStateRequest) -> ReplicationResult<StateBlob> {
        let bucket = resource.name()?;
        let keys = self.list_keys(bucket).await?;
        let objects: Vec<StoredObject> = stream::iter(keys)
            .map(|key| self.fetch(bucket, key))
            .buffer_unordered(TRANSFER_CONCURRENCY)
            .try_collect()
            .await?;
        debug!(bucket, count = objects.len(), "captured bucket objects");
        Ok(StateBlob::Objects(objects))
    }

    async fn replicate_internal(
        &self,
        resource: &ReplicateStateRequest,
        state: StateBlob,
    ) -> ReplicationResult<usize> {
        let bucket = resource.name()?;
        let StateBlob::Objects(objects) = state else {
            return Err(ReplicationError::invalid("S3 buckets take objects"));
        };
        self.ensure_bucket(bucket).await?;

        let count = objects.len();
        stream::iter(objects)
            .map(|object| self.store(bucket, object))
            .buffer_unordered(TRANSFER_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        info!(bucket, count, "inserted objects into bucket");
        Ok(count)
    }
}
