//! In-memory adapters for tests and local runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use object_pipeline_core::contract::ObjectLocation;
use object_pipeline_core::error::AdapterError;

use crate::adapters::object_store::{ObjectMetadata, ObjectStore, StoredObject};
use crate::adapters::queue::{MessageQueue, OutboundMessage};

/// Object store holding a fixed set of buckets.
///
/// Calls against a bucket that was not declared fail with `NotFound`, the
/// same way S3 rejects the names substituted by the fault injector.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, StoredObject>>>,
}

impl InMemoryObjectStore {
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            buckets: Mutex::new(
                buckets
                    .into_iter()
                    .map(|name| (name.into(), BTreeMap::new()))
                    .collect(),
            ),
        }
    }

    pub fn seed_object(&self, location: &ObjectLocation, body: &[u8], metadata: ObjectMetadata) {
        self.buckets
            .lock()
            .expect("poisoned mutex")
            .entry(location.bucket.clone())
            .or_default()
            .insert(
                location.key.clone(),
                StoredObject {
                    body: body.to_vec(),
                    metadata,
                },
            );
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.buckets
            .lock()
            .expect("poisoned mutex")
            .get(&location.bucket)
            .and_then(|objects| objects.get(&location.key))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .expect("poisoned mutex")
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn no_such_bucket(bucket: &str) -> AdapterError {
    AdapterError::not_found(format!("NoSuchBucket: the bucket '{bucket}' does not exist"))
}

impl ObjectStore for InMemoryObjectStore {
    fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject, AdapterError> {
        let buckets = self.buckets.lock().expect("poisoned mutex");
        let objects = buckets
            .get(&location.bucket)
            .ok_or_else(|| no_such_bucket(&location.bucket))?;
        objects.get(&location.key).cloned().ok_or_else(|| {
            AdapterError::not_found(format!("NoSuchKey: the key '{}' does not exist", location.key))
        })
    }

    fn put_object(
        &self,
        location: &ObjectLocation,
        body: &[u8],
        metadata: &ObjectMetadata,
    ) -> Result<(), AdapterError> {
        let mut buckets = self.buckets.lock().expect("poisoned mutex");
        let objects = buckets
            .get_mut(&location.bucket)
            .ok_or_else(|| no_such_bucket(&location.bucket))?;
        objects.insert(
            location.key.clone(),
            StoredObject {
                body: body.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, AdapterError> {
        let buckets = self.buckets.lock().expect("poisoned mutex");
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| no_such_bucket(bucket))
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError> {
        let mut buckets = self.buckets.lock().expect("poisoned mutex");
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

/// Queue that records every sent message, or rejects all of them.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    messages: Mutex<Vec<OutboundMessage>>,
    reject: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().expect("poisoned mutex").clone()
    }
}

impl MessageQueue for RecordingQueue {
    fn send_message(&self, message: &OutboundMessage) -> Result<String, AdapterError> {
        if self.reject {
            return Err(AdapterError::other("simulated queue outage"));
        }

        let mut messages = self.messages.lock().expect("poisoned mutex");
        messages.push(message.clone());
        Ok(format!("message-{}", messages.len()))
    }
}
