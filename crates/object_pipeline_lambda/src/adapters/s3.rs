use std::collections::HashMap;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use object_pipeline_core::contract::{ObjectLocation, JSON_CONTENT_TYPE};
use object_pipeline_core::error::AdapterError;
use tracing::Instrument;

use crate::adapters::object_store::{ObjectMetadata, ObjectStore, StoredObject};
use crate::adapters::{block_on, classify};
use crate::observability::{record_client_outcome, s3_call_span, S3Call};

/// S3 caps `DeleteObjects` at this many keys per request.
pub const MAX_KEYS_PER_DELETE: usize = 1_000;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3ObjectStore {
    fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject, AdapterError> {
        let client = self.client.clone();
        let bucket = location.bucket.clone();
        let key = location.key.clone();
        let span = s3_call_span(S3Call::GetObject, &bucket, Some(&key));

        let request = async move {
            let output = client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| classify("get object from s3", error))?;

            let metadata: ObjectMetadata = output
                .metadata()
                .map(|values| {
                    values
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let body = output
                .body
                .collect()
                .await
                .map_err(|error| AdapterError::other(format!("failed to read s3 body: {error}")))?
                .into_bytes()
                .to_vec();

            Ok::<_, AdapterError>(StoredObject { body, metadata })
        };

        let result = block_on(request.instrument(span.clone()));
        record_client_outcome(&span, &result);
        result
    }

    fn put_object(
        &self,
        location: &ObjectLocation,
        body: &[u8],
        metadata: &ObjectMetadata,
    ) -> Result<(), AdapterError> {
        let client = self.client.clone();
        let bucket = location.bucket.clone();
        let key = location.key.clone();
        let body_bytes = body.to_vec();
        let metadata: HashMap<String, String> = metadata
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let span = s3_call_span(S3Call::PutObject, &bucket, Some(&key));

        let request = async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type(JSON_CONTENT_TYPE)
                .set_metadata((!metadata.is_empty()).then_some(metadata))
                .body(ByteStream::from(body_bytes))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| classify("write object to s3", error))
        };

        let result = block_on(request.instrument(span.clone()));
        record_client_outcome(&span, &result);
        result
    }

    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, AdapterError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let span = s3_call_span(S3Call::ListObjectsV2, &bucket, None);

        let request = async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let output = client
                    .list_objects_v2()
                    .bucket(bucket.clone())
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| classify("list objects in s3", error))?;

                keys.extend(
                    output
                        .contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );

                match output.next_continuation_token() {
                    Some(token) => continuation_token = Some(token.to_string()),
                    None => break,
                }
            }
            Ok::<_, AdapterError>(keys)
        };

        let result = block_on(request.instrument(span.clone()));
        record_client_outcome(&span, &result);
        result
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError> {
        for chunk in keys.chunks(MAX_KEYS_PER_DELETE) {
            self.delete_chunk(bucket, chunk)?;
        }
        Ok(())
    }
}

impl S3ObjectStore {
    fn delete_chunk(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError> {
        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key.clone()).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| AdapterError::other(format!("invalid object identifier: {error}")))?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|error| AdapterError::other(format!("invalid delete request: {error}")))?;

        let client = self.client.clone();
        let bucket = bucket.to_string();
        let span = s3_call_span(S3Call::DeleteObjects, &bucket, None);

        let request = async move {
            let output = client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|error| classify("delete objects from s3", error))?;

            let failures: Vec<String> = output
                .errors()
                .iter()
                .map(|error| {
                    format!(
                        "{}: {} {}",
                        error.key().unwrap_or("<unknown key>"),
                        error.code().unwrap_or("UnknownError"),
                        error.message().unwrap_or_default()
                    )
                })
                .collect();
            if failures.is_empty() {
                Ok::<_, AdapterError>(())
            } else {
                Err(AdapterError::other(format!(
                    "failed to delete {} object(s) from s3: {}",
                    failures.len(),
                    failures.join("; ")
                )))
            }
        };

        let result = block_on(request.instrument(span.clone()));
        record_client_outcome(&span, &result);
        result
    }
}
