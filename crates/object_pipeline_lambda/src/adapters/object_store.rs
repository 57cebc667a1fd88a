use std::collections::BTreeMap;

use object_pipeline_core::contract::ObjectLocation;
use object_pipeline_core::error::AdapterError;

pub type ObjectMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
}

pub trait ObjectStore {
    fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject, AdapterError>;

    fn put_object(
        &self,
        location: &ObjectLocation,
        body: &[u8],
        metadata: &ObjectMetadata,
    ) -> Result<(), AdapterError>;

    /// Every key in the bucket, following pagination to the end.
    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, AdapterError>;

    /// Removes `keys` from `bucket`; any per-key failure fails the call.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError>;
}
