use std::collections::BTreeMap;

use object_pipeline_core::contract::Stage;
use object_pipeline_core::envelope::{Envelope, ObservationContext, Observer};
use object_pipeline_core::error::{FailureCause, OperationError};
use object_pipeline_core::fault::{apply_bucket_fault, FaultInjector};

use crate::adapters::object_store::ObjectStore;

pub const DELETE_OPERATION: &str = "Deleting all custom objects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteHandlerConfig {
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Deleted object count per bucket.
    pub deleted: BTreeMap<String, usize>,
}

impl DeleteSummary {
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Empties every configured bucket.
///
/// The first failing listing or deletion aborts the run; buckets already
/// emptied stay empty.
pub fn handle_delete(
    config: &DeleteHandlerConfig,
    request_id: &str,
    store: &dyn ObjectStore,
    injector: &mut dyn FaultInjector,
    observer: &dyn Observer,
) -> Result<DeleteSummary, OperationError> {
    let envelope = Envelope::new(Stage::Delete, observer);
    let context = ObservationContext::new(request_id);

    envelope.run(DELETE_OPERATION, &context, || {
        let mut summary = DeleteSummary::default();
        for bucket in &config.buckets {
            let listed_bucket = apply_bucket_fault(bucket, injector);
            context.set_bucket(&listed_bucket);

            tracing::debug!(bucket.name = %listed_bucket, "Getting all custom objects in the S3...");
            let keys = store
                .list_keys(&listed_bucket)
                .map_err(FailureCause::List)?;

            if !keys.is_empty() {
                tracing::debug!(
                    bucket.name = %bucket,
                    objects = keys.len(),
                    "Deleting all custom objects in the S3..."
                );
                store
                    .delete_objects(bucket, &keys)
                    .map_err(FailureCause::Delete)?;
            }
            summary.deleted.insert(bucket.clone(), keys.len());
        }
        Ok(summary)
    })
}
